// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Scoped, timeout-bounded access to a reader/writer lock.
//!
//! [`SyncLock`] wraps a [`parking_lot::RwLock`] together with the timeout every acquisition on
//! it is bounded by. Acquiring returns a token which releases the lock when it goes out of
//! scope, on every exit path, panics included. Tokens can also be released explicitly with
//! `release`, which consumes them, so a token can never be released twice.
//!
//! Three kinds of tokens exist:
//!
//! - [`ReadToken`]: shared access. Any number may be held while no writer holds the lock.
//! - [`WriteToken`]: exclusive access. At most one is held at any time.
//! - [`UpgradeableReadToken`]: shared access that may be promoted to exclusive access exactly
//!   once via [`UpgradeableReadToken::upgrade`]. Only one upgradeable reader exists at a time,
//!   but it coexists with plain readers.
//!
//! No acquisition ever blocks longer than the configured timeout. When the timeout elapses the
//! acquisition fails with [`Error::LockTimeout`] and nothing is retried.

use crate::error::{Error, LockMode, Result};
use parking_lot::{
    MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard,
};
use std::{
    fmt,
    ops::{Deref, DerefMut},
    time::Duration,
};

/// The timeout applied to lock acquisitions unless configured otherwise.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// A reader/writer lock whose acquisitions are bounded by a fixed timeout.
pub struct SyncLock<T> {
    inner: RwLock<T>,
    timeout: Duration,
}

impl<T> SyncLock<T> {
    /// Creates a lock around `value` using [`DEFAULT_LOCK_TIMEOUT`].
    pub fn new(value: T) -> Self {
        Self::with_timeout(value, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_timeout(value: T, timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(value),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquires shared access.
    pub fn read(&self) -> Result<ReadToken<'_, T>> {
        self.inner
            .try_read_for(self.timeout)
            .map(ReadToken)
            .ok_or_else(|| timed_out(LockMode::Read, self.timeout))
    }

    /// Acquires exclusive access.
    pub fn write(&self) -> Result<WriteToken<'_, T>> {
        self.inner
            .try_write_for(self.timeout)
            .map(WriteToken)
            .ok_or_else(|| timed_out(LockMode::Write, self.timeout))
    }

    /// Acquires shared access that can later be promoted to exclusive access.
    pub fn upgradeable_read(&self) -> Result<UpgradeableReadToken<'_, T>> {
        self.inner
            .try_upgradable_read_for(self.timeout)
            .map(|guard| UpgradeableReadToken {
                guard,
                timeout: self.timeout,
            })
            .ok_or_else(|| timed_out(LockMode::UpgradeableRead, self.timeout))
    }

    /// Direct access through a unique borrow; no locking is needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for SyncLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for SyncLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncLock")
            .field("timeout", &self.timeout)
            .field("locked", &self.inner.is_locked())
            .finish()
    }
}

fn timed_out(mode: LockMode, timeout: Duration) -> Error {
    tracing::warn!(?mode, ?timeout, "lock acquisition timed out");
    Error::LockTimeout { mode, timeout }
}

/// A held shared lock.
pub struct ReadToken<'a, T>(RwLockReadGuard<'a, T>);

impl<'a, T> ReadToken<'a, T> {
    /// Releases the lock now rather than at the end of the scope.
    pub fn release(self) {}

    /// Narrows the token to a part of the protected value, keeping the lock held.
    ///
    /// If `f` returns `None` the original token is handed back unchanged.
    pub fn try_map<U: ?Sized>(
        self,
        f: impl FnOnce(&T) -> Option<&U>,
    ) -> Result<MappedRwLockReadGuard<'a, U>, Self> {
        RwLockReadGuard::try_map(self.0, f).map_err(ReadToken)
    }
}

impl<T> Deref for ReadToken<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// A held exclusive lock.
pub struct WriteToken<'a, T>(RwLockWriteGuard<'a, T>);

impl<T> WriteToken<'_, T> {
    /// Releases the lock now rather than at the end of the scope.
    pub fn release(self) {}
}

impl<T> Deref for WriteToken<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for WriteToken<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

/// A held upgradeable shared lock.
pub struct UpgradeableReadToken<'a, T> {
    guard: RwLockUpgradableReadGuard<'a, T>,
    timeout: Duration,
}

impl<'a, T> UpgradeableReadToken<'a, T> {
    /// Releases the lock now rather than at the end of the scope.
    pub fn release(self) {}

    /// Promotes this token to exclusive access.
    ///
    /// Waits for plain readers to drain, for at most the lock's timeout. On failure the
    /// upgradeable read is released as well; the caller holds nothing afterwards.
    pub fn upgrade(self) -> Result<WriteToken<'a, T>> {
        let timeout = self.timeout;
        RwLockUpgradableReadGuard::try_upgrade_for(self.guard, timeout)
            .map(WriteToken)
            .map_err(|_still_upgradeable| timed_out(LockMode::Upgrade, timeout))
    }
}

impl<T> Deref for UpgradeableReadToken<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}
