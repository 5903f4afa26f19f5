// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Errors surfaced synchronously by collection operations.
//!
//! Failures while *delivering* a notification are never returned from a collection method.
//! They are reported on the delivery-failed channel instead, see
//! [`DeliveryFailure`](crate::events::DeliveryFailure).

use std::time::Duration;

/// The kind of lock an operation was waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Read,
    Write,
    UpgradeableRead,
    /// Promotion of a held upgradeable read to a write lock.
    Upgrade,
}

/// Errors returned by collection operations.
///
/// Every failing operation leaves the collection in the state it had before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("could not acquire {mode:?} lock within {timeout:?}")]
    LockTimeout { mode: LockMode, timeout: Duration },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("an item with the same key has already been added")]
    DuplicateKey,

    #[error("index {index} is out of range for a collection of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("the collection has been disposed")]
    ObjectDisposed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Returns `true` if retrying the same operation later may succeed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::LockTimeout { .. })
    }
}
