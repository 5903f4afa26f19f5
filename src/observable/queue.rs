// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Collection, CollectionStorage, properties};
use crate::{adapters::QueueAdapter, error::Result, notification::CollectionChange};

/// First-in, first-out operations. Index 0 is the head of the queue.
pub trait QueueLike: CollectionStorage {
    /// Appends `item` at the tail.
    fn enqueue(&self, item: Self::Item) -> Result<()>;

    /// Takes the head, posting `Remove` at index 0.
    fn dequeue(&self) -> Result<Option<Self::Item>>;

    fn peek(&self) -> Result<Option<Self::Item>>;
}

impl<C, T> QueueLike for C
where
    C: CollectionStorage<Item = T, Adapter = QueueAdapter<T>> + ?Sized,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn enqueue(&self, item: T) -> Result<()> {
        self.add(item)
    }

    fn dequeue(&self) -> Result<Option<T>> {
        let head = self.write(|adapter| Ok(adapter.dequeue()))?;
        if let Some(item) = &head {
            self.notifier().post(
                CollectionChange::removed(item.clone(), 0),
                properties::<Self>(),
            );
        }
        Ok(head)
    }

    fn peek(&self) -> Result<Option<T>> {
        self.read(|adapter| Ok(adapter.peek().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ObservableQueue,
        observable::tests::{Recorder, queued_options},
    };

    #[test]
    fn head_and_tail_positions() {
        let (queue, options) = queued_options();
        let jobs = ObservableQueue::with_options(options);
        let recorder = Recorder::attach(&jobs);

        jobs.enqueue("first").unwrap();
        jobs.enqueue("second").unwrap();
        assert_eq!(jobs.peek().unwrap(), Some("first"));
        assert_eq!(jobs.dequeue().unwrap(), Some("first"));
        assert_eq!(jobs.dequeue().unwrap(), Some("second"));
        assert_eq!(jobs.dequeue().unwrap(), None);
        queue.run_pending();

        assert_eq!(recorder.take_changes(), vec![
            CollectionChange::added("first", Some(0)),
            CollectionChange::added("second", Some(1)),
            CollectionChange::removed("first", 0),
            CollectionChange::removed("second", 0),
        ]);
    }
}
