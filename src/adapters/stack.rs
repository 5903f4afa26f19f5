// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{AddOutcome, CollectionAdapter, RemoveOutcome, retire_if_nonempty};
use crate::{dispatch::Retired, error::Result};

/// LIFO adapter over a `Vec`.
///
/// Enumeration starts at the top of the stack, so the top is always index 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackAdapter<T> {
    // top of the stack is the end of the vec
    items: Vec<T>,
}

impl<T> StackAdapter<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Iterates from the top of the stack down.
    pub fn iter(&self) -> std::iter::Rev<std::slice::Iter<'_, T>> {
        self.items.iter().rev()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }
}

impl<T> Default for StackAdapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pushes the items in iteration order; the last one ends up on top.
impl<T> FromIterator<T> for StackAdapter<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> CollectionAdapter for StackAdapter<T>
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

    /// Pushes onto the top.
    fn add(&mut self, item: T) -> Result<AddOutcome> {
        self.items.push(item);
        Ok(AddOutcome::At(0))
    }

    fn remove(&mut self, item: &T) -> Result<RemoveOutcome> {
        // search from the top, like enumeration does
        Ok(
            match self.items.iter().rposition(|existing| existing == item) {
                Some(index) => {
                    self.items.remove(index);
                    RemoveOutcome::Unpositioned
                }
                None => RemoveOutcome::NotFound,
            },
        )
    }

    fn clear(&mut self) -> Result<Option<Retired>> {
        let is_empty = self.items.is_empty();
        Ok(retire_if_nonempty(&mut self.items, is_empty, Vec::new()))
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.iter().cloned().collect())
    }
}
