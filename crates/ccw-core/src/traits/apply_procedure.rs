// # Apply Procedure Trait
//
// Defines the interface for the privileged LAN reconfiguration step.
//
// On pfSense this brings the LAN interface down and up again, restarts
// dhcp6c and reloads the filter, which makes the new delegated prefix
// visible to local clients. The check workflow treats it as a black box.

use async_trait::async_trait;

/// Trait for LAN apply implementations
///
/// A failed apply must be reported as an error. The engine then leaves the
/// state file untouched so the next scheduled run tries again with the same
/// address.
#[async_trait]
pub trait ApplyProcedure: Send + Sync {
    /// Run the reconfiguration
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The procedure completed successfully
    /// - `Err(Error)`: Non-zero exit, signal, timeout or spawn failure
    async fn apply(&self) -> Result<(), crate::Error>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}
