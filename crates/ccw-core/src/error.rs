//! Error types for the WAN IPv6 check
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for check operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the WAN IPv6 check
#[derive(Error, Debug)]
pub enum Error {
    /// Address source errors (listing command failed, timed out, ...)
    #[error("Address source error: {0}")]
    AddressSource(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Lock marker could not be inspected, created or removed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Another invocation holds the lock marker
    #[error("Lock held: {0}")]
    LockHeld(String),

    /// The LAN apply procedure failed
    #[error("Apply procedure failed: {0}")]
    Apply(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an address source error
    pub fn address_source(msg: impl Into<String>) -> Self {
        Self::AddressSource(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a lock error
    pub fn lock(msg: impl Into<String>) -> Self {
        Self::Lock(msg.into())
    }

    /// Create a "lock held" error
    pub fn lock_held(msg: impl Into<String>) -> Self {
        Self::LockHeld(msg.into())
    }

    /// Create an apply procedure error
    pub fn apply(msg: impl Into<String>) -> Self {
        Self::Apply(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means another run owns the lock
    pub fn is_lock_held(&self) -> bool {
        matches!(self, Self::LockHeld(_))
    }
}
