// # Address Source Trait
//
// Defines the interface for reading the status of the WAN interface.
//
// ## Implementations
//
// - Command-based (`ifconfig` / `ip`): `ccw-source-command` crate
// - Test doubles returning canned text
//
// The source only produces text. Extracting and classifying the `inet6`
// lines is the job of [`crate::parser`], so the matching rules stay testable
// without a live interface.

use async_trait::async_trait;

/// Trait for interface status providers
///
/// # Ordering
///
/// The parser picks the first qualifying address, so implementations must
/// return lines in the order the operating system lists them. Router tooling
/// lists the preferred address first; nothing else breaks ties.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Get the raw status text of the configured interface
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: Line-oriented status output
    /// - `Err(Error)`: If the status could not be obtained (spawn failure,
    ///   non-zero exit, timeout)
    async fn interface_status(&self) -> Result<String, crate::Error>;

    /// Name of the interface this source reports on
    fn interface(&self) -> &str;
}
