// # State Store Trait
//
// Defines the interface for persisting the last applied WAN address.
//
// ## Purpose
//
// The state store makes repeated runs idempotent: the LAN apply only runs
// when the current address differs from the stored one.
//
// ## Implementations
//
// - File-based: single address, atomic replace (`FileStateStore`)
// - In-memory: tests and dry runs (`MemoryStateStore`)
//
// ## Usage
//
// ```rust,no_run
// use ccw_core::{FileStateStore, StateStore};
//
// #[tokio::main]
// async fn main() -> ccw_core::Result<()> {
//     let store = FileStateStore::new("/tmp/_current_wan_ipv6.txt");
//
//     if store.read().await?.as_deref() != Some("2001:db8::5") {
//         store.write("2001:db8::5").await?;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for state store implementations
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the persisted address
    ///
    /// # Returns
    ///
    /// - `Ok(Some(String))`: The stored address, exactly as written
    /// - `Ok(None)`: Nothing stored yet
    /// - `Err(Error)`: Storage exists but could not be read
    async fn read(&self) -> Result<Option<String>, crate::Error>;

    /// Replace the persisted address
    ///
    /// A failed write must leave the previous contents intact.
    async fn write(&self, address: &str) -> Result<(), crate::Error>;

    /// Where the state lives, for log messages
    fn location(&self) -> String;
}
