// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! One writable list followed by any number of read-only lists, presented as one sequence.
//!
//! The composite index `i` resolves to the master while `i` is below the master's length.
//! Beyond that the slaves are walked in registration order, subtracting each slave's length
//! from the remaining offset until the offset falls within one of them.
//!
//! All mutation is routed to the master; slaves are never mutated through the composite.
//! The composite hooks into the master and every slave, and reports a
//! [`CollectionChange::Reset`](crate::CollectionChange::Reset) whenever any of them changes. A
//! change inside a slave is not translated into an indexed notification, since its composite
//! index would require re-walking all slaves.
//!
//! A mutation made through the composite produces only its own indexed notification, posted
//! after the composite's lock is released. The master's change is not relayed in that case.
//!
//! A registered list that is disposed by its owner reads as empty from then on. Writes routed
//! to a disposed master fail with [`Error::ObjectDisposed`].

use crate::{
    adapters::{AddOutcome, CollectionAdapter, RemoveOutcome, SequenceAdapter},
    concurrent::ConcurrentObservableCollection,
    dispatch::Retired,
    error::{Error, Result},
    events::{Notifiable, Notifier, SubscriptionId},
    observable::{Collection, CollectionStorage, ListLike, properties},
};
use parking_lot::Mutex;
use std::{
    fmt,
    sync::Arc,
    thread::{self, ThreadId},
};

/// A list that can take part in a master/slave composite.
pub type SharedList<T> = Arc<crate::ConcurrentObservableList<T>>;

/// The master/slave composite list.
pub type MasterSlaveList<T> = ConcurrentObservableCollection<MasterSlaveAdapter<T>>;

/// A list the composite is subscribed to. Unsubscribes when dropped.
struct Registration<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    list: SharedList<T>,
    subscription: SubscriptionId,
}

impl<T> Registration<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Hooks into `list`, relaying every change as a `Reset` of the composite.
    ///
    /// The relay runs on the thread that changed `list`, so anything hooked into the
    /// composite learns about the change before that call returns. Changes the composite
    /// forwards itself are skipped; it posts those once its lock is released.
    fn relay(list: SharedList<T>, composite: &Notifier<T>, forwarding: &Forwarding) -> Self {
        let composite = composite.clone();
        let forwarding = forwarding.clone();
        let subscription = list.notifier().hook(move |_| {
            if !forwarding.is_current() {
                composite.post_reset(MasterSlaveAdapter::<T>::PROPERTIES);
            }
        });
        Self { list, subscription }
    }
}

impl<T> Drop for Registration<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if !self.list.unsubscribe(self.subscription) {
            // the list was disposed, which drops its observers
            tracing::debug!(subscription = ?self.subscription, "list was no longer subscribed");
        }
    }
}

/// The thread that is currently mutating the master on behalf of the composite.
///
/// Only one thread at a time can hold the composite's write lock, so one slot suffices.
#[derive(Clone, Default)]
struct Forwarding(Arc<Mutex<Option<ThreadId>>>);

impl Forwarding {
    fn is_current(&self) -> bool {
        *self.0.lock() == Some(thread::current().id())
    }

    fn begin(&self) -> ForwardingGuard<'_> {
        *self.0.lock() = Some(thread::current().id());
        ForwardingGuard(self)
    }
}

struct ForwardingGuard<'a>(&'a Forwarding);

impl Drop for ForwardingGuard<'_> {
    fn drop(&mut self) {
        *self.0.0.lock() = None;
    }
}

/// Reads from a registered list, treating one its owner disposed as empty.
fn unless_disposed<R: Default>(read: Result<R>) -> Result<R> {
    match read {
        Err(Error::ObjectDisposed) => Ok(R::default()),
        read => read,
    }
}

enum Location<'a, T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Master(usize),
    Slave(&'a SharedList<T>, usize),
}

/// Storage of a [`MasterSlaveList`].
///
/// Reads take the read locks of the master and of the slaves one after the other, so a read
/// racing with mutations of those lists sees each of them at a possibly different moment.
pub struct MasterSlaveAdapter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    master: Option<Registration<T>>,
    slaves: Vec<Registration<T>>,
    forwarding: Forwarding,
}

impl<T> MasterSlaveAdapter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            master: None,
            slaves: Vec::new(),
            forwarding: Forwarding::default(),
        }
    }

    pub fn master(&self) -> Option<&SharedList<T>> {
        self.master.as_ref().map(|registration| &registration.list)
    }

    pub fn slaves(&self) -> impl Iterator<Item = &SharedList<T>> {
        self.slaves.iter().map(|registration| &registration.list)
    }

    fn require_master(&self) -> Result<&SharedList<T>> {
        self.master().ok_or(Error::InvalidArgument("no master list set"))
    }

    /// Runs `mutate` on the master with the relay from the master muted.
    fn forward<R>(&self, mutate: impl FnOnce(&SharedList<T>) -> Result<R>) -> Result<R> {
        let master = self.require_master()?;
        let _forwarding = self.forwarding.begin();
        mutate(master)
    }

    fn is_registered(&self, list: &SharedList<T>) -> bool {
        self.master().is_some_and(|master| Arc::ptr_eq(master, list))
            || self.slaves().any(|slave| Arc::ptr_eq(slave, list))
    }

    fn master_len(&self) -> Result<usize> {
        self.master()
            .map_or(Ok(0), |master| unless_disposed(master.count()))
    }

    fn locate(&self, index: usize) -> Result<Location<'_, T>> {
        let mut offset = index;
        let master_len = self.master_len()?;
        if offset < master_len {
            return Ok(Location::Master(offset));
        }
        offset -= master_len;
        for slave in self.slaves() {
            let len = unless_disposed(slave.count())?;
            if offset < len {
                return Ok(Location::Slave(slave, offset));
            }
            offset -= len;
        }
        Err(Error::IndexOutOfRange {
            index,
            len: index - offset,
        })
    }
}

impl<T> Default for MasterSlaveAdapter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MasterSlaveAdapter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterSlaveAdapter")
            .field("has_master", &self.master.is_some())
            .field("slaves", &self.slaves.len())
            .finish()
    }
}

impl<T> CollectionAdapter for MasterSlaveAdapter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Item = T;

    const SUPPORTS_UNDO: bool = true;

    fn len(&self) -> Result<usize> {
        let mut len = self.master_len()?;
        for slave in self.slaves() {
            len += unless_disposed(slave.count())?;
        }
        Ok(len)
    }

    fn contains(&self, item: &T) -> Result<bool> {
        for list in self.master().into_iter().chain(self.slaves()) {
            if unless_disposed(list.contains(item))? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn add(&mut self, item: T) -> Result<AddOutcome> {
        Ok(AddOutcome::At(self.forward(|master| master.push(item))?))
    }

    /// Removes from the master only. Items of slaves are reported as not found.
    fn remove(&mut self, item: &T) -> Result<RemoveOutcome> {
        Ok(match self.forward(|master| master.remove_item(item))? {
            Some(index) => RemoveOutcome::At(index),
            None => RemoveOutcome::NotFound,
        })
    }

    /// Clears the master, which retires its own storage.
    fn clear(&mut self) -> Result<Option<Retired>> {
        self.forward(|master| master.clear())?;
        Ok(None)
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for list in self.master().into_iter().chain(self.slaves()) {
            items.extend(unless_disposed(list.to_vec())?);
        }
        Ok(items)
    }

    /// Only the master's items; slaves are left alone by a clear.
    fn clearable(&self) -> Result<Vec<T>> {
        self.master()
            .map_or(Ok(Vec::new()), |master| unless_disposed(master.to_vec()))
    }
}

impl<T> SequenceAdapter for MasterSlaveAdapter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self, index: usize) -> Result<T> {
        match self.locate(index)? {
            Location::Master(index) => self.require_master()?.get(index),
            Location::Slave(slave, offset) => slave.get(offset),
        }
    }

    fn set(&mut self, index: usize, item: T) -> Result<T> {
        match self.locate(index)? {
            Location::Master(index) => self.forward(|master| master.set(index, item)),
            Location::Slave(..) => Err(Error::InvalidArgument("slave lists are read-only")),
        }
    }

    /// Inserts into the master; `index` may be at most the master's length.
    fn insert(&mut self, index: usize, item: T) -> Result<()> {
        self.forward(|master| master.insert(index, item))
    }

    fn remove_at(&mut self, index: usize) -> Result<T> {
        match self.locate(index)? {
            Location::Master(index) => self.forward(|master| master.remove_at(index)),
            Location::Slave(..) => Err(Error::InvalidArgument("slave lists are read-only")),
        }
    }

    /// Appends to the master under a single acquisition of its lock.
    fn extend(&mut self, items: Vec<T>) -> Result<usize> {
        self.forward(|master| master.extend_from(items))
    }

    fn index_of(&self, item: &T) -> Result<Option<usize>> {
        let mut offset = 0;
        for list in self.master().into_iter().chain(self.slaves()) {
            if let Some(index) = unless_disposed(list.index_of(item))? {
                return Ok(Some(offset + index));
            }
            offset += unless_disposed(list.count())?;
        }
        Ok(None)
    }
}

impl<T> MasterSlaveList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Makes `list` the master, replacing (and unsubscribing from) the previous one.
    ///
    /// Fails with [`Error::InvalidArgument`] if `list` is registered as a slave.
    pub fn set_master(&self, list: SharedList<T>) -> Result<()> {
        self.write(|adapter| {
            if adapter.master().is_some_and(|master| Arc::ptr_eq(master, &list)) {
                return Ok(());
            }
            if adapter.slaves().any(|slave| Arc::ptr_eq(slave, &list)) {
                return Err(Error::InvalidArgument("list is already a slave"));
            }
            adapter.master = Some(Registration::relay(
                list,
                self.notifier(),
                &adapter.forwarding,
            ));
            Ok(())
        })?;
        tracing::debug!("master list replaced");
        self.notifier().post_reset(properties::<Self>());
        Ok(())
    }

    /// Appends `list` to the slaves.
    ///
    /// Fails with [`Error::InvalidArgument`] if `list` is already the master or a slave.
    pub fn set_slave(&self, list: SharedList<T>) -> Result<()> {
        let slaves = self.write(|adapter| {
            if adapter.is_registered(&list) {
                return Err(Error::InvalidArgument("list is already registered"));
            }
            let registration = Registration::relay(list, self.notifier(), &adapter.forwarding);
            adapter.slaves.push(registration);
            Ok(adapter.slaves.len())
        })?;
        tracing::debug!(slaves, "slave list added");
        self.notifier().post_reset(properties::<Self>());
        Ok(())
    }

    /// Removes `list` from the slaves and unsubscribes from it. Returns `false` if it was not a
    /// slave.
    pub fn remove_slave(&self, list: &SharedList<T>) -> Result<bool> {
        let removed = self.write(|adapter| {
            let position = adapter
                .slaves
                .iter()
                .position(|registration| Arc::ptr_eq(&registration.list, list));
            Ok(position.map(|position| adapter.slaves.remove(position)))
        })?;
        let Some(registration) = removed else {
            return Ok(false);
        };
        // unsubscribe outside of the composite's lock
        drop(registration);
        tracing::debug!("slave list removed");
        self.notifier().post_reset(properties::<Self>());
        Ok(true)
    }

    pub fn master(&self) -> Result<Option<SharedList<T>>> {
        self.read(|adapter| Ok(adapter.master().cloned()))
    }

    pub fn slaves(&self) -> Result<Vec<SharedList<T>>> {
        self.read(|adapter| Ok(adapter.slaves().cloned().collect()))
    }
}
