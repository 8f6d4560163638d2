//! Check-and-apply engine
//!
//! The CheckEngine runs one complete check:
//! - Takes the lock marker (or backs off if another run holds it)
//! - Reads the WAN interface addresses via AddressSource
//! - Compares the current address with the StateStore
//! - Runs the ApplyProcedure and persists the address when it changed
//! - Releases the lock and reports a CheckOutcome
//!
//! ## State Machine
//!
//! ```text
//! UNLOCKED ──active?──▶ ABORT_LOCKED            (lock left alone)
//!    │
//!    ▼
//!  LOCKED ──▶ CHECK_FAILED | NO_CHANGE | CHANGE_APPLIED ──▶ UNLOCKED
//! ```
//!
//! Retrying is the scheduler's business: every failure ends the run and the
//! next invocation starts from scratch.

mod outcome;

pub use outcome::CheckOutcome;

use crate::config::CheckConfig;
use crate::error::Result;
use crate::lock::LockGuard;
use crate::parser;
use crate::traits::{AddressSource, ApplyProcedure, StateStore};
use tracing::{debug, info, warn};

/// One-shot WAN IPv6 check
///
/// ## Lifecycle
///
/// 1. Create with [`CheckEngine::new()`]
/// 2. Call [`CheckEngine::run()`] once per invocation
/// 3. Map the returned [`CheckOutcome`] to the process exit code
pub struct CheckEngine {
    /// WAN interface status provider
    source: Box<dyn AddressSource>,

    /// LAN reconfiguration step
    apply: Box<dyn ApplyProcedure>,

    /// Last applied address
    state_store: Box<dyn StateStore>,

    /// Cross-invocation mutex
    lock: LockGuard,

    /// Interface name, for messages
    interface: String,
}

impl CheckEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `source`: Address source for the WAN interface
    /// - `apply`: LAN apply procedure
    /// - `state_store`: Store for the last applied address
    /// - `config`: Check configuration (interface, lock path, threshold)
    pub fn new(
        source: Box<dyn AddressSource>,
        apply: Box<dyn ApplyProcedure>,
        state_store: Box<dyn StateStore>,
        config: &CheckConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            source,
            apply,
            state_store,
            lock: LockGuard::new(&config.lock_file, config.stale_lock_after()),
            interface: config.wan_interface.clone(),
        })
    }

    /// Lock guard used by this engine
    pub fn lock(&self) -> &LockGuard {
        &self.lock
    }

    /// Run one check and log its outcome
    pub async fn run(&self) -> CheckOutcome {
        let outcome = self.run_locked().await;
        outcome.log();
        outcome
    }

    async fn run_locked(&self) -> CheckOutcome {
        match self.lock.is_active().await {
            Ok(true) => return CheckOutcome::Locked,
            Ok(false) => {}
            Err(e) => {
                return CheckOutcome::LockFailed {
                    error: e.to_string(),
                };
            }
        }

        debug!("Not locked, setting lock");
        if let Err(e) = self.lock.acquire().await {
            // Lost the race against a concurrent run
            if e.is_lock_held() {
                return CheckOutcome::Locked;
            }
            return CheckOutcome::LockFailed {
                error: e.to_string(),
            };
        }

        let outcome = self.check().await;

        if let Err(e) = self.lock.release().await {
            warn!("Failed to release lock: {}", e);
        }

        outcome
    }

    /// The part of the workflow that runs while holding the lock
    async fn check(&self) -> CheckOutcome {
        let addresses = parser::list_addresses(self.source.as_ref()).await;
        if addresses.is_empty() {
            return CheckOutcome::NoAddressFound {
                interface: self.interface.clone(),
            };
        }

        let Some(candidate) = parser::select_current(addresses.as_slice()) else {
            return CheckOutcome::NoCurrentAddress {
                interface: self.interface.clone(),
            };
        };

        let current = parser::normalize(&candidate);
        if current.is_empty() {
            return CheckOutcome::UnrecognizedAddress { candidate };
        }
        debug!(address = %current, "Current WAN address");

        let previous = match self.state_store.read().await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(
                    state = %self.state_store.location(),
                    "Could not read previous address, treating as first run: {}", e
                );
                None
            }
        };

        if previous.as_deref() == Some(current.as_str()) {
            return CheckOutcome::Unchanged { address: current };
        }

        match &previous {
            Some(previous) => info!(
                previous = %previous,
                current = %current,
                "Current address differs from stored address"
            ),
            None => info!(current = %current, "No previous address stored"),
        }

        if let Err(e) = self.apply.apply().await {
            return CheckOutcome::ApplyFailed {
                address: current,
                error: e.to_string(),
            };
        }

        if let Err(e) = self.state_store.write(&current).await {
            return CheckOutcome::WriteFailed {
                address: current,
                first_run: previous.is_none(),
                error: e.to_string(),
            };
        }

        CheckOutcome::Applied {
            address: current,
            previous,
        }
    }
}
