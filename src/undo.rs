// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Undo and redo for positional collections.
//!
//! A collection created with a non-zero
//! [`undo_limit`](crate::CollectionOptions::with_undo_limit) records one [`UndoLevel`] per
//! successful mutation. Undoing a level applies its inverse to the storage and emits the
//! notification that inverse would have produced had it been performed directly; redoing
//! re-applies the original mutation. Recording a new level discards everything that could
//! have been redone.

use crate::{
    adapters::SequenceAdapter, dispatch::Retired, error::Result, notification::CollectionChange,
};
use std::collections::VecDeque;

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum UndoLevel<T> {
    Add { index: usize, item: T },
    Remove { index: usize, item: T },
    Clear { items: Vec<T> },
    ChangeAt { index: usize, old: T, new: T },
}

/// The result of applying a level to storage.
pub(crate) struct Applied<T> {
    pub(crate) change: CollectionChange<T>,
    /// Storage released by a re-applied clear.
    pub(crate) retired: Option<Retired>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Applied<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Applied")
            .field("change", &self.change)
            .field("retired", &self.retired.is_some())
            .finish()
    }
}

impl<T> From<CollectionChange<T>> for Applied<T> {
    fn from(change: CollectionChange<T>) -> Self {
        Self {
            change,
            retired: None,
        }
    }
}

impl<T> UndoLevel<T>
where
    T: Clone,
{
    fn revert<A>(&self, adapter: &mut A) -> Result<Applied<T>>
    where
        A: SequenceAdapter<Item = T>,
    {
        Ok(match self {
            Self::Add { index, .. } => {
                let removed = adapter.remove_at(*index)?;
                CollectionChange::removed(removed, *index).into()
            }
            Self::Remove { index, item } => {
                adapter.insert(*index, item.clone())?;
                CollectionChange::added(item.clone(), Some(*index)).into()
            }
            // the storage is empty again at this point, so appending restores the order
            Self::Clear { items } => {
                let start = adapter.extend(items.clone())?;
                CollectionChange::Add {
                    items: items.iter().cloned().collect(),
                    index: Some(start),
                }
                .into()
            }
            Self::ChangeAt { index, old, .. } => {
                let current = adapter.set(*index, old.clone())?;
                CollectionChange::replaced(current, old.clone(), Some(*index)).into()
            }
        })
    }

    fn reapply<A>(&self, adapter: &mut A) -> Result<Applied<T>>
    where
        A: SequenceAdapter<Item = T>,
    {
        Ok(match self {
            Self::Add { index, item } => {
                adapter.insert(*index, item.clone())?;
                CollectionChange::added(item.clone(), Some(*index)).into()
            }
            Self::Remove { index, .. } => {
                let removed = adapter.remove_at(*index)?;
                CollectionChange::removed(removed, *index).into()
            }
            Self::Clear { .. } => Applied {
                change: CollectionChange::Reset,
                retired: adapter.clear()?,
            },
            Self::ChangeAt { index, new, .. } => {
                let current = adapter.set(*index, new.clone())?;
                CollectionChange::replaced(current, new.clone(), Some(*index)).into()
            }
        })
    }
}

/// Bounded undo and redo stacks.
#[derive(Debug, Clone)]
pub struct UndoHistory<T> {
    undo: VecDeque<UndoLevel<T>>,
    redo: Vec<UndoLevel<T>>,
    limit: usize,
}

impl<T> UndoHistory<T> {
    /// Creates a history that keeps at most `limit` undo levels, discarding the oldest first.
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(limit.min(64)),
            redo: Vec::new(),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_levels(&self) -> impl Iterator<Item = &UndoLevel<T>> {
        self.undo.iter().rev()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub(crate) fn record(&mut self, level: UndoLevel<T>) {
        self.redo.clear();
        self.push_undo(level);
    }

    fn push_undo(&mut self, level: UndoLevel<T>) {
        if self.limit == 0 {
            return;
        }
        if self.undo.len() == self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(level);
    }
}

impl<T> UndoHistory<T>
where
    T: Clone,
{
    /// Reverts the most recent level on `adapter`. The level stays on the undo stack if that
    /// fails.
    pub(crate) fn undo_on<A>(&mut self, adapter: &mut A) -> Result<Option<Applied<T>>>
    where
        A: SequenceAdapter<Item = T>,
    {
        let Some(level) = self.undo.pop_back() else {
            return Ok(None);
        };
        match level.revert(adapter) {
            Ok(applied) => {
                self.redo.push(level);
                Ok(Some(applied))
            }
            Err(error) => {
                self.undo.push_back(level);
                Err(error)
            }
        }
    }

    /// Re-applies the most recently undone level on `adapter`.
    pub(crate) fn redo_on<A>(&mut self, adapter: &mut A) -> Result<Option<Applied<T>>>
    where
        A: SequenceAdapter<Item = T>,
    {
        let Some(level) = self.redo.pop() else {
            return Ok(None);
        };
        match level.reapply(adapter) {
            Ok(applied) => {
                self.push_undo(level);
                Ok(Some(applied))
            }
            Err(error) => {
                self.redo.push(level);
                Err(error)
            }
        }
    }
}
