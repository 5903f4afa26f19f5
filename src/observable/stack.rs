// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Collection, CollectionStorage, properties};
use crate::{adapters::StackAdapter, error::Result, notification::CollectionChange};

/// Last-in, first-out operations. The top of the stack is index 0.
pub trait StackLike: CollectionStorage {
    fn push(&self, item: Self::Item) -> Result<()>;

    /// Takes the top, posting `Remove` at index 0.
    fn pop(&self) -> Result<Option<Self::Item>>;

    fn peek(&self) -> Result<Option<Self::Item>>;
}

impl<C, T> StackLike for C
where
    C: CollectionStorage<Item = T, Adapter = StackAdapter<T>> + ?Sized,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn push(&self, item: T) -> Result<()> {
        self.add(item)
    }

    fn pop(&self) -> Result<Option<T>> {
        let top = self.write(|adapter| Ok(adapter.pop()))?;
        if let Some(item) = &top {
            self.notifier().post(
                CollectionChange::removed(item.clone(), 0),
                properties::<Self>(),
            );
        }
        Ok(top)
    }

    fn peek(&self) -> Result<Option<T>> {
        self.read(|adapter| Ok(adapter.peek().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ObservableStack,
        observable::tests::{Recorder, queued_options},
    };

    #[test]
    fn top_is_index_zero() {
        let (queue, options) = queued_options();
        let stack = ObservableStack::with_options(options);
        let recorder = Recorder::attach(&stack);

        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.peek().unwrap(), Some(2));
        assert_eq!(stack.to_vec().unwrap(), vec![2, 1]);
        assert_eq!(stack.pop().unwrap(), Some(2));
        queue.run_pending();

        assert_eq!(recorder.take_changes(), vec![
            CollectionChange::added(1, Some(0)),
            CollectionChange::added(2, Some(0)),
            CollectionChange::removed(2, 0),
        ]);
        assert_eq!(stack.count().unwrap(), 1);
    }
}
