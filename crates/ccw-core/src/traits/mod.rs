//! Collaborator traits for the WAN IPv6 check
//!
//! These are the seams between the check workflow and the outside world.
//!
//! - [`AddressSource`]: Read the raw status text of the WAN interface
//! - [`ApplyProcedure`]: Re-apply the LAN interface configuration
//! - [`StateStore`]: Persist the last applied address

pub mod address_source;
pub mod apply_procedure;
pub mod state_store;

pub use address_source::AddressSource;
pub use apply_procedure::ApplyProcedure;
pub use state_store::StateStore;
