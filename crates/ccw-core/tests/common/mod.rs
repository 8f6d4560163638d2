//! Test doubles and common utilities for workflow contract tests
//!
//! The doubles only record what the engine asked of them; none of them
//! touches the network or runs a command.

#![allow(dead_code)]

use ccw_core::error::{Error, Result};
use ccw_core::traits::{AddressSource, ApplyProcedure};
use ccw_core::CheckConfig;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// An AddressSource that returns canned `ifconfig`-style text
pub struct FixedAddressSource {
    /// Text to return, or the error message to fail with
    status: std::result::Result<String, String>,
    /// Call counter for interface_status()
    call_count: Arc<AtomicUsize>,
}

impl FixedAddressSource {
    /// Source reporting one `inet6` line per entry
    pub fn with_entries(entries: &[&str]) -> Self {
        let mut text = String::from("igb0: flags=8843<UP,BROADCAST,RUNNING> metric 0 mtu 1500\n");
        for entry in entries {
            text.push_str("\tinet6 ");
            text.push_str(entry);
            text.push('\n');
        }
        text.push_str("\tstatus: active\n");
        Self::with_text(text)
    }

    /// Source returning `text` verbatim
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            status: Ok(text.into()),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Source whose listing command fails
    pub fn failing(message: &str) -> Self {
        Self {
            status: Err(message.to_string()),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle to the call counter
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.call_count)
    }
}

#[async_trait::async_trait]
impl AddressSource for FixedAddressSource {
    async fn interface_status(&self) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.status.clone().map_err(Error::address_source)
    }

    fn interface(&self) -> &str {
        "igb0"
    }
}

/// An ApplyProcedure that counts calls and can be told to fail
#[derive(Clone)]
pub struct RecordingApply {
    call_count: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl RecordingApply {
    pub fn new() -> Self {
        Self {
            call_count: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing() -> Self {
        let apply = Self::new();
        apply.set_failing(true);
        apply
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Get the number of times apply() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ApplyProcedure for RecordingApply {
    async fn apply(&self) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::apply("exit status 1"));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "recording apply".to_string()
    }
}

/// Helper to create a config whose files live in `dir`
pub fn config_in(dir: &Path) -> CheckConfig {
    CheckConfig::new()
        .with_interface("igb0")
        .with_paths(dir.join("current_wan_ipv6.txt"), dir.join("current_wan_ipv6.lock"))
}

/// Set the modification time of `path` to `age` in the past
pub fn age_file(path: &Path, age: std::time::Duration) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(std::time::SystemTime::now() - age).unwrap();
}
