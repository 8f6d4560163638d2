// # ccw-core
//
// Core library for the Check Current WAN IPv6 tool.
//
// ## Architecture Overview
//
// A single invocation checks whether the WAN interface picked up a new
// global IPv6 address and, if so, re-applies the LAN interface
// configuration so the new prefix is announced via DHCPv6/RA:
//
// - **AddressSource**: Trait for reading the raw status text of the WAN interface
// - **parser**: Extracts, classifies and normalizes IPv6 addresses
// - **StateStore**: Trait for persisting the last applied address
// - **LockGuard**: Filesystem mutex with staleness recovery
// - **ApplyProcedure**: Trait for the external LAN reconfiguration step
// - **CheckEngine**: Sequences the above and maps outcomes to exit codes
//
// ## Design Principles
//
// 1. **One-shot**: Every run is self-contained; retries are left to the scheduler
// 2. **Idempotency**: The state file only changes after a successful apply
// 3. **Injected collaborators**: Commands are behind traits so tests use fakes
// 4. **Library-First**: The binary is a thin layer over this crate

/// Prefix of every log entry that reports a terminal outcome or a lock timeout
pub const LOG_PREFIX: &str = "CCW_IPv6: ";

pub mod traits;
pub mod parser;
pub mod lock;
pub mod engine;
pub mod config;
pub mod error;
pub mod state;

// Re-export core types for convenience
pub use traits::{AddressSource, ApplyProcedure, StateStore};
pub use engine::{CheckEngine, CheckOutcome};
pub use lock::{LockGuard, LockState};
pub use config::{ApplyConfig, CheckConfig, ListingConfig, ListingTool};
pub use error::{Error, Result};
pub use state::{FileStateStore, MemoryStateStore};
