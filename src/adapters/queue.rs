// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{AddOutcome, CollectionAdapter, RemoveOutcome, retire_if_nonempty};
use crate::{dispatch::Retired, error::Result};
use std::collections::VecDeque;

/// FIFO adapter over a `VecDeque`. Index 0 is the head, the next item to be dequeued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAdapter<T> {
    items: VecDeque<T>,
}

impl<T> QueueAdapter<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }
}

impl<T> Default for QueueAdapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for QueueAdapter<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> CollectionAdapter for QueueAdapter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Item = T;

    fn len(&self) -> Result<usize> {
        Ok(self.items.len())
    }

    fn contains(&self, item: &T) -> Result<bool> {
        Ok(self.items.contains(item))
    }

    /// Enqueues at the tail.
    fn add(&mut self, item: T) -> Result<AddOutcome> {
        self.items.push_back(item);
        Ok(AddOutcome::At(self.items.len() - 1))
    }

    /// Removes from the middle of the queue, which has no queue-shaped position.
    fn remove(&mut self, item: &T) -> Result<RemoveOutcome> {
        Ok(match self.items.iter().position(|existing| existing == item) {
            Some(index) => {
                self.items.remove(index);
                RemoveOutcome::Unpositioned
            }
            None => RemoveOutcome::NotFound,
        })
    }

    fn clear(&mut self) -> Result<Option<Retired>> {
        let is_empty = self.items.is_empty();
        Ok(retire_if_nonempty(&mut self.items, is_empty, VecDeque::new()))
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.items.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_in_first_out() {
        let mut queue = QueueAdapter::new();
        assert_eq!(queue.add(1).unwrap(), AddOutcome::At(0));
        assert_eq!(queue.add(2).unwrap(), AddOutcome::At(1));
        assert_eq!(queue.peek(), Some(&1));
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.to_vec().unwrap(), vec![2]);
    }

    #[test]
    fn remove_by_value_is_unpositioned() {
        let mut queue: QueueAdapter<_> = [1, 2, 3].into_iter().collect();
        assert_eq!(queue.remove(&2).unwrap(), RemoveOutcome::Unpositioned);
        assert_eq!(queue.remove(&2).unwrap(), RemoveOutcome::NotFound);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    }
}
