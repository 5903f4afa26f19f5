// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Observable collections with change notifications
//!
//! This crate provides list, dictionary, queue and stack collections that tell observers about
//! every change to their contents, plus two composites built on top: a master/slave list that
//! presents one writable list and any number of read-only lists as a single sequence, and a
//! filterable view with a lazily rebuilt cache of the filtered projection.
//!
//! ## Notifications
//!
//! Every mutation produces a [`CollectionChange`] (`Add`, `Remove`, `Replace` or `Reset`)
//! together with [`PropertyName`] signals such as `Count` and `Item[]`. Observers register on
//! the three channels of the [`Notifiable`] trait:
//!
//! - *collection changed* for structural changes,
//! - *property changed* for the named properties,
//! - *delivery failed* for observers that panicked while being notified.
//!
//! Delivery is always asynchronous. A mutating call performs its structural change, releases
//! any lock it holds, and only then hands the notification to a [`Dispatcher`]. The dispatcher
//! runs callbacks on a caller-supplied [`DispatchContext`] (for example a [`QueueContext`]
//! pumped by a UI thread) or on a shared background worker. Callers must never assume that a
//! notification has been delivered by the time a mutating call returns.
//!
//! ## Single-threaded and concurrent collections
//!
//! Collections come in two flavours that share all of their operations:
//!
//! - [`ObservableCollection`] keeps its storage in a `RefCell`. It is `Send` but not `Sync`: it
//!   must be used from one thread at a time, which the compiler enforces.
//! - [`ConcurrentObservableCollection`] guards its storage with a reader/writer lock. Reads take
//!   a shared lock, mutations take an exclusive lock for the structural change only. Every lock
//!   acquisition is bounded by a timeout (100ms unless configured otherwise) and fails with
//!   [`Error::LockTimeout`] rather than blocking indefinitely. A concurrent collection can be
//!   [disposed](Lockable::dispose), after which every operation fails with
//!   [`Error::ObjectDisposed`].
//!
//! Operations are grouped into capability traits, implemented for every collection whose
//! storage supports them: [`Collection`] for everything, [`ListLike`], [`DictionaryLike`],
//! [`QueueLike`] and [`StackLike`] for the respective storage kinds. Import them all at once
//! through the [`prelude`].
//!
//! ```rust
//! use observable_collections::{CollectionOptions, ObservableList, QueueContext, prelude::*};
//! use std::sync::{Arc, Mutex};
//!
//! let ui = QueueContext::new();
//! let list = ObservableList::with_options(CollectionOptions::default().with_context(ui.clone()));
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let log = Arc::clone(&seen);
//! list.on_collection_changed(move |change| log.lock().unwrap().push(change.kind()));
//!
//! list.add("apples")?;
//! list.add("bananas")?;
//! assert!(list.remove(&"apples")?);
//! assert!(!list.remove(&"cherries")?);
//!
//! // nothing is delivered until the context runs its queue
//! assert!(seen.lock().unwrap().is_empty());
//! ui.run_pending();
//! assert_eq!(seen.lock().unwrap().len(), 3);
//! # Ok::<_, observable_collections::Error>(())
//! ```
//!
//! ## Master/slave lists
//!
//! A [`MasterSlaveList`] concatenates one master list with any number of slave lists. Index `i`
//! resolves to the master while `i` is below the master's length, and to the slaves, in
//! registration order, after that. All mutation is routed to the master. Whenever the master or
//! a slave reports a change, the composite reports a `Reset`.
//!
//! ## Filterable collections
//!
//! A [`FilterableCollection`] wraps a concurrent collection and exposes the items matching a
//! predicate against a filter value. The filtered projection is cached, invalidated on every
//! change, and rebuilt on the next read.
//!
//! ## Features
//!
//! - `serde`: derives `Serialize` and `Deserialize` for [`CollectionChange`], [`PropertyName`]
//!   and [`UndoLevel`].
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::{
    hash::BuildHasher,
    sync::atomic::{AtomicBool, Ordering},
};

// Use a constant seed for hashing so that dictionary enumeration order is stable in tests.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

pub mod adapters;
pub use adapters::{
    AddOutcome, CollectionAdapter, DictionaryAdapter, ListAdapter, QueueAdapter, RemoveOutcome,
    SequenceAdapter, StackAdapter,
};
pub mod concurrent;
pub use concurrent::{
    ConcurrentObservableCollection, ConcurrentObservableDictionary, ConcurrentObservableList,
    ConcurrentObservableQueue, ConcurrentObservableStack, Lockable, ReadView,
};
pub mod dispatch;
pub use dispatch::{BackgroundContext, DispatchContext, Dispatcher, QueueContext};
pub mod error;
pub use error::{Error, LockMode, Result};
pub mod events;
pub use events::{DeliveryFailure, Notifiable, Notifier, SubscriptionId};
pub mod filterable;
pub use filterable::FilterableCollection;
pub mod locker;
pub use locker::{DEFAULT_LOCK_TIMEOUT, SyncLock};
pub mod master_slave;
pub use master_slave::{MasterSlaveAdapter, MasterSlaveList, SharedList};
pub mod notification;
pub use notification::{ChangeKind, CollectionChange, PropertyName};
pub mod observable;
pub use observable::{
    Collection, CollectionStorage, DictionaryLike, ListLike, ObservableCollection,
    ObservableDictionary, ObservableList, ObservableQueue, ObservableStack, QueueLike, StackLike,
};
mod options;
pub use options::CollectionOptions;
pub mod undo;
pub use undo::{UndoHistory, UndoLevel};

/// The capability traits, for glob import.
pub mod prelude {
    pub use crate::{
        Collection, DictionaryLike, ListLike, Lockable, Notifiable, QueueLike, StackLike,
    };
}

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes dictionary hashing deterministic.
///
/// This should only be enabled for testing, as it increases the odds of DoS
/// scenarios.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
///
/// Should be used internally and for testing.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

/// Create a random state for a hashmap.
/// If `enable_determinism` has been used, this will return a deterministic
/// decidedly non-random RandomState, useful in tests.
#[inline]
fn make_random_state() -> RandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        RandomState::new()
    }
}

fn create_map<K, V>() -> std::collections::HashMap<K, V, CollectionRandomState> {
    std::collections::HashMap::with_hasher(CollectionRandomState::default())
}

/// The default hasher of dictionary collections.
///
/// This is a small wrapper around [`ahash::RandomState`] which switches to a fixed seed once
/// [`enable_determinism`] has been called.
#[derive(Clone)]
pub struct CollectionRandomState {
    inner: RandomState,
}

impl Default for CollectionRandomState {
    #[inline]
    fn default() -> Self {
        Self {
            inner: make_random_state(),
        }
    }
}

// all we do is delegate to the wrapped RandomState
impl BuildHasher for CollectionRandomState {
    type Hasher = <RandomState as BuildHasher>::Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_hasher_is_stable() {
        enable_determinism();
        let a = CollectionRandomState::default().hash_one("key");
        let b = CollectionRandomState::default().hash_one("key");
        assert_eq!(a, b);
    }
}
