// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Thread-safe observable collections.
//!
//! A [`ConcurrentObservableCollection`] guards its storage with a [`SyncLock`]. Reads hold the
//! shared lock for their synchronous part only; mutations hold the exclusive lock for the
//! structural change only and release it before posting notifications, so observers may read
//! the collection from their callbacks without deadlocking.
//!
//! Enumeration comes in two forms:
//!
//! - [`Collection::iter`](crate::Collection::iter) copies the items under the read lock and
//!   iterates the copy without holding any lock.
//! - [`ConcurrentObservableCollection::read_view`] hands out the storage itself and holds the
//!   read lock until the view is dropped. Writers wait for the view for at most their timeout,
//!   so a view that is kept around makes every write fail with
//!   [`Error::LockTimeout`](crate::Error::LockTimeout).

use crate::{
    adapters::{CollectionAdapter, DictionaryAdapter, ListAdapter, QueueAdapter, StackAdapter},
    error::{Error, Result},
    events::{Notifiable, Notifier},
    locker::SyncLock,
    notification::CollectionChange,
    observable::CollectionStorage,
    options::CollectionOptions,
    undo::UndoHistory,
};
use parking_lot::{MappedRwLockReadGuard, Mutex};
use std::{
    fmt,
    ops::Deref,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

/// Collections that guard their storage with a lock and can be disposed.
pub trait Lockable {
    /// The upper bound on every lock acquisition.
    fn lock_timeout(&self) -> Duration;

    /// Releases the storage and drops every observer.
    ///
    /// Composites and views built on the collection see one final
    /// [`CollectionChange::Reset`](crate::CollectionChange::Reset) before they are dropped;
    /// observers do not. Afterwards every operation fails with [`Error::ObjectDisposed`]. Disposing twice is a
    /// no-op.
    fn dispose(&self) -> Result<()>;

    fn is_disposed(&self) -> bool;
}

/// An observable collection that may be shared between threads.
pub struct ConcurrentObservableCollection<A: CollectionAdapter> {
    // `None` once disposed
    storage: SyncLock<Option<A>>,
    disposed: AtomicBool,
    notifier: Notifier<A::Item>,
    history: Option<Mutex<UndoHistory<A::Item>>>,
}

pub type ConcurrentObservableList<T> = ConcurrentObservableCollection<ListAdapter<T>>;
pub type ConcurrentObservableDictionary<K, V, S = crate::CollectionRandomState> =
    ConcurrentObservableCollection<DictionaryAdapter<K, V, S>>;
pub type ConcurrentObservableQueue<T> = ConcurrentObservableCollection<QueueAdapter<T>>;
pub type ConcurrentObservableStack<T> = ConcurrentObservableCollection<StackAdapter<T>>;

impl<A> ConcurrentObservableCollection<A>
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

    pub fn from_adapter(adapter: A, options: CollectionOptions) -> Self {
        Self {
            storage: SyncLock::with_timeout(Some(adapter), options.lock_timeout),
            disposed: AtomicBool::new(false),
            notifier: Notifier::new(options.dispatcher()),
            history: options.history::<A>(),
        }
    }

    /// Borrows the storage for lock-holding enumeration.
    ///
    /// The read lock is held until the returned view is dropped. Drop it promptly: writers
    /// time out while it is alive.
    pub fn read_view(&self) -> Result<ReadView<'_, A>> {
        let token = self.storage.read()?;
        token
            .try_map(Option::as_ref)
            .map(|guard| ReadView { guard })
            .map_err(|_| Error::ObjectDisposed)
    }
}

impl<A> Default for ConcurrentObservableCollection<A>
where
    A: CollectionAdapter + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> FromIterator<A::Item> for ConcurrentObservableCollection<A>
where
    A: CollectionAdapter + FromIterator<A::Item>,
{
    fn from_iter<I: IntoIterator<Item = A::Item>>(iter: I) -> Self {
        Self::from_adapter(iter.into_iter().collect(), CollectionOptions::default())
    }
}

impl<A> Notifiable for ConcurrentObservableCollection<A>
where
    A: CollectionAdapter,
{
    type Item = A::Item;

    fn notifier(&self) -> &Notifier<A::Item> {
        &self.notifier
    }
}

impl<A> CollectionStorage for ConcurrentObservableCollection<A>
where
    A: CollectionAdapter,
{
    type Adapter = A;

    fn read<R>(&self, f: impl FnOnce(&A) -> Result<R>) -> Result<R> {
        let token = self.storage.read()?;
        let adapter = token.as_ref().ok_or(Error::ObjectDisposed)?;
        f(adapter)
    }

    fn write<R>(&self, f: impl FnOnce(&mut A) -> Result<R>) -> Result<R> {
        let mut token = self.storage.write()?;
        let adapter = token.as_mut().ok_or(Error::ObjectDisposed)?;
        f(adapter)
    }

    fn history(&self) -> Option<&Mutex<UndoHistory<A::Item>>> {
        self.history.as_ref()
    }
}

impl<A> Lockable for ConcurrentObservableCollection<A>
where
    A: CollectionAdapter,
{
    fn lock_timeout(&self) -> Duration {
        self.storage.timeout()
    }

    fn dispose(&self) -> Result<()> {
        let mut token = self.storage.write()?;
        let Some(adapter) = token.take() else {
            return Ok(());
        };
        self.disposed.store(true, Ordering::Release);
        token.release();

        tracing::debug!("disposing concurrent collection");
        self.notifier.dispatcher().retire(Box::new(adapter));
        self.notifier.run_hooks(&CollectionChange::Reset);
        self.notifier.clear_subscriptions();
        if let Some(history) = &self.history {
            history.lock().clear();
        }
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<A> fmt::Debug for ConcurrentObservableCollection<A>
where
    A: CollectionAdapter,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentObservableCollection")
            .field("lock_timeout", &self.storage.timeout())
            .field("disposed", &self.is_disposed())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

/// Shared access to the storage of a concurrent collection, holding its read lock.
pub struct ReadView<'a, A> {
    guard: MappedRwLockReadGuard<'a, A>,
}

impl<A> Deref for ReadView<'_, A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.guard
    }
}
