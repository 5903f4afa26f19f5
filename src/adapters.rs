// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Storage adapters.
//!
//! An adapter owns the actual storage of an observable collection and translates the API of one
//! storage primitive into the uniform [`CollectionAdapter`] contract the notification layer is
//! written against. A [`MasterSlaveAdapter`](crate::master_slave::MasterSlaveAdapter) fulfils
//! the same contract as a plain `Vec`.
//!
//! Adapters are owned exclusively by the collection wrapping them and are only reached through
//! it, under its lock where there is one.

use crate::{
    dispatch::Retired,
    error::{Error, Result},
    notification::PropertyName,
};

mod dictionary;
mod list;
mod queue;
mod stack;

pub use dictionary::DictionaryAdapter;
pub use list::ListAdapter;
pub use queue::QueueAdapter;
pub use stack::StackAdapter;

/// Where an added item ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    At(usize),
    /// The storage has no meaningful position for the item, or several items were added.
    Unpositioned,
}

impl AddOutcome {
    pub fn index(self) -> Option<usize> {
        match self {
            Self::At(index) => Some(index),
            Self::Unpositioned => None,
        }
    }
}

/// What happened to an item asked to be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Removed from the given position.
    At(usize),
    /// Removed, but the position is not meaningful. Observers need a Reset.
    Unpositioned,
    NotFound,
}

/// The uniform storage contract the notification core depends on.
///
/// All operations are fallible so that composite adapters, which read other locked collections,
/// can surface lock timeouts. Plain storage never fails on these.
pub trait CollectionAdapter: Send + 'static {
    type Item: Clone + PartialEq + Send + Sync + 'static;

    /// The properties signalled alongside a count-changing mutation.
    const PROPERTIES: &'static [PropertyName] = &[PropertyName::Count, PropertyName::Items];

    /// Whether mutations are recorded for undo. Only positional storage can replay them.
    const SUPPORTS_UNDO: bool = false;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn contains(&self, item: &Self::Item) -> Result<bool>;

    fn add(&mut self, item: Self::Item) -> Result<AddOutcome>;

    fn remove(&mut self, item: &Self::Item) -> Result<RemoveOutcome>;

    /// Empties the adapter.
    ///
    /// Adapters that own their storage swap in a fresh, empty one and return the old storage so
    /// the caller can drop it later, outside of any lock.
    fn clear(&mut self) -> Result<Option<Retired>>;

    /// Copies the contents out, in enumeration order.
    fn to_vec(&self) -> Result<Vec<Self::Item>>;

    /// The items [`clear`](Self::clear) would remove, in enumeration order.
    fn clearable(&self) -> Result<Vec<Self::Item>> {
        self.to_vec()
    }
}

/// Adapters with positional access.
pub trait SequenceAdapter: CollectionAdapter {
    fn get(&self, index: usize) -> Result<Self::Item>;

    /// Replaces the item at `index`, returning the previous one.
    fn set(&mut self, index: usize, item: Self::Item) -> Result<Self::Item>;

    /// Inserts at `index`, which may equal the length.
    fn insert(&mut self, index: usize, item: Self::Item) -> Result<()>;

    fn remove_at(&mut self, index: usize) -> Result<Self::Item>;

    /// Appends all of `items` in one step and returns the position of the first one.
    ///
    /// Either every item is appended or, on error, none is.
    fn extend(&mut self, items: Vec<Self::Item>) -> Result<usize>;

    fn index_of(&self, item: &Self::Item) -> Result<Option<usize>>;
}

/// Fails with [`Error::IndexOutOfRange`] unless `index < len`.
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange { index, len })
    }
}

/// Fails with [`Error::IndexOutOfRange`] unless `index <= len`.
pub(crate) fn check_insert_index(index: usize, len: usize) -> Result<()> {
    if index <= len {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange { index, len })
    }
}

/// Moves `storage` out for retirement, or returns `None` if there is nothing to retire.
pub(crate) fn retire_if_nonempty<S>(storage: &mut S, is_empty: bool, fresh: S) -> Option<Retired>
where
    S: Send + 'static,
{
    let old = std::mem::replace(storage, fresh);
    if is_empty { None } else { Some(Box::new(old)) }
}
