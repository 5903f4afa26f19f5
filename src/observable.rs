// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The observable collection core.
//!
//! Every mutation follows the same two phases: the structural change is applied to the
//! [adapter](crate::adapters) (under the write lock, for concurrent collections), and only once
//! that has succeeded and any lock has been released is the derived [`CollectionChange`] posted
//! to observers. A mutation that fails, for example with [`Error::DuplicateKey`] or a lock
//! timeout, returns the error and posts nothing.
//!
//! The operations live on capability traits with blanket implementations over
//! [`CollectionStorage`], so that [`ObservableCollection`] and
//! [`ConcurrentObservableCollection`](crate::ConcurrentObservableCollection) share them:
//!
//! - [`Collection`] for every collection,
//! - [`ListLike`] for positional storage,
//! - [`DictionaryLike`], [`QueueLike`] and [`StackLike`] for the respective storage kinds.
//!
//! [`Error::DuplicateKey`]: crate::Error::DuplicateKey

use crate::{
    adapters::{
        AddOutcome, CollectionAdapter, DictionaryAdapter, ListAdapter, QueueAdapter,
        RemoveOutcome, StackAdapter,
    },
    error::Result,
    events::{Notifiable, Notifier},
    notification::{CollectionChange, PropertyName},
    options::CollectionOptions,
    undo::{UndoHistory, UndoLevel},
};
use parking_lot::Mutex;
use std::{cell::RefCell, fmt};

mod dictionary;
mod list;
mod queue;
mod stack;

pub use dictionary::DictionaryLike;
pub use list::ListLike;
pub use queue::QueueLike;
pub use stack::StackLike;

/// Access to the storage of an observable collection.
///
/// This is the seam between the collection cores, which decide how storage is guarded, and
/// the capability traits, which implement the operations once for every core.
pub trait CollectionStorage: Notifiable<Item: Clone + PartialEq + Sync> {
    type Adapter: CollectionAdapter<Item = Self::Item>;

    /// Runs `f` with shared access to the storage.
    fn read<R>(&self, f: impl FnOnce(&Self::Adapter) -> Result<R>) -> Result<R>;

    /// Runs `f` with exclusive access to the storage.
    ///
    /// Implementations release any lock before returning, so callers may post notifications
    /// right after.
    fn write<R>(&self, f: impl FnOnce(&mut Self::Adapter) -> Result<R>) -> Result<R>;

    /// The undo history, if undo is enabled.
    fn history(&self) -> Option<&Mutex<UndoHistory<Self::Item>>>;
}

/// Operations shared by every observable collection.
pub trait Collection: CollectionStorage {
    fn count(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool>;

    fn contains(&self, item: &Self::Item) -> Result<bool>;

    /// Copies the items out, in enumeration order.
    fn to_vec(&self) -> Result<Vec<Self::Item>>;

    /// Iterates over a snapshot of the items.
    ///
    /// The snapshot is taken eagerly, so no lock is held while iterating and later mutations
    /// are not observed.
    fn iter(&self) -> Result<std::vec::IntoIter<Self::Item>>;

    /// Adds `item`, posting `Add` with its position if the storage has one.
    fn add(&self, item: Self::Item) -> Result<()>;

    /// Removes one occurrence of `item`.
    ///
    /// Posts `Remove` with the former position, or `Reset` if the storage cannot tell the
    /// position. Returns `false`, posting nothing, if `item` was not present.
    fn remove(&self, item: &Self::Item) -> Result<bool>;

    /// Removes everything and posts `Reset`.
    ///
    /// The old storage is swapped out and dropped on a background worker.
    fn clear(&self) -> Result<()>;
}

pub(crate) fn properties<C>() -> &'static [PropertyName]
where
    C: CollectionStorage + ?Sized,
{
    <C::Adapter as CollectionAdapter>::PROPERTIES
}

/// Records an undo level if `collection` keeps a history.
///
/// Must be called from within [`CollectionStorage::write`] so that levels are recorded in
/// the same order as the mutations they describe.
pub(crate) fn record<C>(collection: &C, level: impl FnOnce() -> UndoLevel<C::Item>)
where
    C: CollectionStorage + ?Sized,
{
    if let Some(history) = collection.history() {
        history.lock().record(level());
    }
}

impl<C> Collection for C
where
    C: CollectionStorage + ?Sized,
{
    fn count(&self) -> Result<usize> {
        self.read(|adapter| adapter.len())
    }

    fn is_empty(&self) -> Result<bool> {
        self.read(|adapter| adapter.is_empty())
    }

    fn contains(&self, item: &Self::Item) -> Result<bool> {
        self.read(|adapter| adapter.contains(item))
    }

    fn to_vec(&self) -> Result<Vec<Self::Item>> {
        self.read(|adapter| adapter.to_vec())
    }

    fn iter(&self) -> Result<std::vec::IntoIter<Self::Item>> {
        Ok(self.to_vec()?.into_iter())
    }

    fn add(&self, item: Self::Item) -> Result<()> {
        let outcome = self.write(|adapter| {
            let outcome = adapter.add(item.clone())?;
            if let AddOutcome::At(index) = outcome {
                record(self, || UndoLevel::Add {
                    index,
                    item: item.clone(),
                });
            }
            Ok(outcome)
        })?;
        self.notifier().post(
            CollectionChange::added(item, outcome.index()),
            properties::<Self>(),
        );
        Ok(())
    }

    fn remove(&self, item: &Self::Item) -> Result<bool> {
        let outcome = self.write(|adapter| {
            let outcome = adapter.remove(item)?;
            if let RemoveOutcome::At(index) = outcome {
                record(self, || UndoLevel::Remove {
                    index,
                    item: item.clone(),
                });
            }
            Ok(outcome)
        })?;
        match outcome {
            RemoveOutcome::At(index) => self.notifier().post(
                CollectionChange::removed(item.clone(), index),
                properties::<Self>(),
            ),
            RemoveOutcome::Unpositioned => self.notifier().post_reset(properties::<Self>()),
            RemoveOutcome::NotFound => return Ok(false),
        }
        Ok(true)
    }

    fn clear(&self) -> Result<()> {
        let retired = self.write(|adapter| {
            let snapshot = match self.history() {
                Some(_) => Some(adapter.clearable()?),
                None => None,
            };
            let retired = adapter.clear()?;
            if let Some(items) = snapshot.filter(|items| !items.is_empty()) {
                record(self, || UndoLevel::Clear { items });
            }
            Ok(retired)
        })?;
        if let Some(storage) = retired {
            self.notifier().dispatcher().retire(storage);
        }
        self.notifier().post_reset(properties::<Self>());
        Ok(())
    }
}

/// An observable collection for use from one thread at a time.
///
/// The storage lives in a `RefCell`, which makes this type `!Sync`; share a
/// [`ConcurrentObservableCollection`](crate::ConcurrentObservableCollection) instead when
/// several threads need access. Notifications are still delivered asynchronously through the
/// configured [`DispatchContext`](crate::DispatchContext).
pub struct ObservableCollection<A: CollectionAdapter> {
    adapter: RefCell<A>,
    notifier: Notifier<A::Item>,
    history: Option<Mutex<UndoHistory<A::Item>>>,
}

pub type ObservableList<T> = ObservableCollection<ListAdapter<T>>;
pub type ObservableDictionary<K, V, S = crate::CollectionRandomState> =
    ObservableCollection<DictionaryAdapter<K, V, S>>;
pub type ObservableQueue<T> = ObservableCollection<QueueAdapter<T>>;
pub type ObservableStack<T> = ObservableCollection<StackAdapter<T>>;

impl<A> ObservableCollection<A>
where
    A: CollectionAdapter,
{
    pub fn new() -> Self
    where
        A: Default,
    {
        Self::with_options(CollectionOptions::default())
    }

    pub fn with_options(options: CollectionOptions) -> Self
    where
        A: Default,
    {
        Self::from_adapter(A::default(), options)
    }

    /// Wraps existing storage, for example a pre-filled adapter or a dictionary with a custom
    /// hasher.
    pub fn from_adapter(adapter: A, options: CollectionOptions) -> Self {
        Self {
            adapter: RefCell::new(adapter),
            notifier: Notifier::new(options.dispatcher()),
            history: options.history::<A>(),
        }
    }

    /// Unwraps the storage. Observers that were registered are dropped.
    pub fn into_adapter(self) -> A {
        self.adapter.into_inner()
    }
}

impl<A> Default for ObservableCollection<A>
where
    A: CollectionAdapter + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> FromIterator<A::Item> for ObservableCollection<A>
where
    A: CollectionAdapter + FromIterator<A::Item>,
{
    fn from_iter<I: IntoIterator<Item = A::Item>>(iter: I) -> Self {
        Self::from_adapter(iter.into_iter().collect(), CollectionOptions::default())
    }
}

impl<A> Notifiable for ObservableCollection<A>
where
    A: CollectionAdapter,
{
    type Item = A::Item;

    fn notifier(&self) -> &Notifier<A::Item> {
        &self.notifier
    }
}

impl<A> CollectionStorage for ObservableCollection<A>
where
    A: CollectionAdapter,
{
    type Adapter = A;

    fn read<R>(&self, f: impl FnOnce(&A) -> Result<R>) -> Result<R> {
        f(&self.adapter.borrow())
    }

    // storage is only ever borrowed for the duration of one of our own closures, which never
    // call back into the collection
    fn write<R>(&self, f: impl FnOnce(&mut A) -> Result<R>) -> Result<R> {
        f(&mut self.adapter.borrow_mut())
    }

    fn history(&self) -> Option<&Mutex<UndoHistory<A::Item>>> {
        self.history.as_ref()
    }
}

impl<A> fmt::Debug for ObservableCollection<A>
where
    A: CollectionAdapter + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ObservableCollection");
        match self.adapter.try_borrow() {
            Ok(adapter) => s.field("adapter", &*adapter),
            Err(_) => s.field("adapter", &"<borrowed>"),
        };
        s.field("notifier", &self.notifier).finish()
    }
}
