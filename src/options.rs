// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crate::{
    adapters::CollectionAdapter,
    dispatch::{DispatchContext, Dispatcher},
    locker::DEFAULT_LOCK_TIMEOUT,
    undo::UndoHistory,
};
use parking_lot::Mutex;
use std::{fmt, sync::Arc, time::Duration};

/// Construction options shared by all collections.
///
/// ```rust
/// # use observable_collections::{CollectionOptions, QueueContext};
/// # use std::time::Duration;
/// let options = CollectionOptions::default()
///     .with_lock_timeout(Duration::from_millis(250))
///     .with_context(QueueContext::new())
///     .with_undo_limit(32);
/// assert_eq!(options.lock_timeout, Duration::from_millis(250));
/// ```
#[derive(Clone)]
pub struct CollectionOptions {
    /// Upper bound on every lock acquisition of a concurrent collection.
    pub lock_timeout: Duration,
    /// Where notifications are delivered. `None` selects the shared background worker.
    pub context: Option<Arc<dyn DispatchContext>>,
    /// Number of undo levels to keep. Zero disables undo. Only positional storage records
    /// undo levels; other storage ignores this.
    pub undo_limit: usize,
}

impl CollectionOptions {
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_context(mut self, context: Arc<dyn DispatchContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_undo_limit(mut self, limit: usize) -> Self {
        self.undo_limit = limit;
        self
    }

    pub(crate) fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.context.clone())
    }

    /// The undo history for storage `A`, if undo is enabled and `A` supports it.
    pub(crate) fn history<A: CollectionAdapter>(&self) -> Option<Mutex<UndoHistory<A::Item>>> {
        (A::SUPPORTS_UNDO && self.undo_limit > 0)
            .then(|| Mutex::new(UndoHistory::new(self.undo_limit)))
    }
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            context: None,
            undo_limit: 0,
        }
    }
}

impl fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("lock_timeout", &self.lock_timeout)
            .field("context", &self.context.as_ref().map(|_| ".."))
            .field("undo_limit", &self.undo_limit)
            .finish()
    }
}
