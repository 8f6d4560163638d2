//! Configuration types for the WAN IPv6 check
//!
//! All settings have compiled-in defaults matching a stock pfSense
//! installation; the binary overrides them from the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main check configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// WAN interface system identifier (e.g. "igb0", "em0", "re0")
    #[serde(default = "default_wan_interface")]
    pub wan_interface: String,

    /// File holding the last applied address
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Lock marker path
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    /// Age after which a lock marker is considered abandoned
    #[serde(default = "default_stale_lock_secs")]
    pub stale_lock_secs: u64,

    /// Address listing command settings
    #[serde(default)]
    pub listing: ListingConfig,

    /// LAN apply procedure settings
    #[serde(default)]
    pub apply: ApplyConfig,
}

impl CheckConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            wan_interface: default_wan_interface(),
            state_file: default_state_file(),
            lock_file: default_lock_file(),
            stale_lock_secs: default_stale_lock_secs(),
            listing: ListingConfig::default(),
            apply: ApplyConfig::default(),
        }
    }

    /// Set the WAN interface
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.wan_interface = interface.into();
        self
    }

    /// Set the state file and lock marker paths
    pub fn with_paths(mut self, state_file: impl Into<PathBuf>, lock_file: impl Into<PathBuf>) -> Self {
        self.state_file = state_file.into();
        self.lock_file = lock_file.into();
        self
    }

    /// Staleness threshold as a duration
    pub fn stale_lock_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_interface_name(&self.wan_interface)?;

        if self.state_file.as_os_str().is_empty() {
            return Err(crate::Error::config("State file path cannot be empty"));
        }
        if self.lock_file.as_os_str().is_empty() {
            return Err(crate::Error::config("Lock file path cannot be empty"));
        }
        if self.state_file == self.lock_file {
            return Err(crate::Error::config(format!(
                "State file and lock file must differ, both are {}",
                self.state_file.display()
            )));
        }
        if self.stale_lock_secs == 0 {
            return Err(crate::Error::config("Stale lock threshold must be > 0"));
        }

        self.listing.validate()?;
        self.apply.validate()?;

        // A run still inside its timeouts must never look abandoned
        let worst_case = self.listing.timeout_secs + self.apply.timeout_secs;
        if worst_case >= self.stale_lock_secs {
            return Err(crate::Error::config(format!(
                "Listing and apply timeouts ({}s + {}s) must stay below the stale lock threshold ({}s)",
                self.listing.timeout_secs, self.apply.timeout_secs, self.stale_lock_secs
            )));
        }

        Ok(())
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Interface names end up as a command argument, so keep them boring.
fn validate_interface_name(name: &str) -> Result<(), crate::Error> {
    if name.is_empty() {
        return Err(crate::Error::config("WAN interface cannot be empty"));
    }
    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(crate::Error::config(format!(
            "WAN interface name too long: {} chars (max {}). Got: {}",
            name.len(),
            MAX_INTERFACE_NAME_LEN,
            name
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(crate::Error::config(format!(
            "WAN interface '{}' contains invalid characters. \
            Valid: alphanumeric, '.', '_' and '-'.",
            name
        )));
    }
    if name.starts_with('-') {
        return Err(crate::Error::config(format!(
            "WAN interface '{}' cannot start with '-'",
            name
        )));
    }
    Ok(())
}

const MAX_INTERFACE_NAME_LEN: usize = 15;

fn validate_timeout(what: &str, secs: u64) -> Result<(), crate::Error> {
    if !(1..=3600).contains(&secs) {
        return Err(crate::Error::config(format!(
            "{} timeout must be between 1 and 3600 seconds. Got: {}",
            what, secs
        )));
    }
    Ok(())
}

/// Tool used to list the interface addresses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingTool {
    /// `ifconfig <iface>` (FreeBSD / pfSense)
    #[default]
    Ifconfig,
    /// `ip -6 addr show dev <iface>` (Linux iproute2)
    Ip,
}

impl ListingTool {
    /// Tool name as used in configuration
    pub fn name(&self) -> &'static str {
        match self {
            ListingTool::Ifconfig => "ifconfig",
            ListingTool::Ip => "ip",
        }
    }
}

impl std::str::FromStr for ListingTool {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ifconfig" => Ok(ListingTool::Ifconfig),
            "ip" => Ok(ListingTool::Ip),
            other => Err(crate::Error::config(format!(
                "Listing tool '{}' is not supported. Supported tools: ifconfig, ip",
                other
            ))),
        }
    }
}

/// Address listing command configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Which tool to run
    #[serde(default)]
    pub tool: ListingTool,

    /// Kill the command after this many seconds
    #[serde(default = "default_listing_timeout_secs")]
    pub timeout_secs: u64,
}

impl ListingConfig {
    /// Validate the listing configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_timeout("Listing", self.timeout_secs)
    }

    /// Timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            tool: ListingTool::default(),
            timeout_secs: default_listing_timeout_secs(),
        }
    }
}

/// LAN apply procedure configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyConfig {
    /// Program to execute
    #[serde(default = "default_apply_program")]
    pub program: String,

    /// Fixed arguments passed to the program
    #[serde(default = "default_apply_args")]
    pub args: Vec<String>,

    /// Kill the procedure after this many seconds
    #[serde(default = "default_apply_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApplyConfig {
    /// Build from a whitespace separated command line
    ///
    /// There is no quoting: an argument that contains spaces cannot be
    /// expressed this way and has to be listed in `args` directly.
    pub fn from_command_line(line: &str) -> Result<Self, crate::Error> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| crate::Error::config("Apply command cannot be empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout_secs: default_apply_timeout_secs(),
        })
    }

    /// Validate the apply configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.program.trim().is_empty() {
            return Err(crate::Error::config("Apply program cannot be empty"));
        }
        validate_timeout("Apply", self.timeout_secs)
    }

    /// Timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            program: default_apply_program(),
            args: default_apply_args(),
            timeout_secs: default_apply_timeout_secs(),
        }
    }
}

fn default_wan_interface() -> String {
    "igb0".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("/tmp/_current_wan_ipv6.txt")
}

fn default_lock_file() -> PathBuf {
    PathBuf::from("/tmp/_current_wan_ipv6.lock")
}

fn default_stale_lock_secs() -> u64 {
    600
}

fn default_listing_timeout_secs() -> u64 {
    30
}

fn default_apply_program() -> String {
    "php".to_string()
}

fn default_apply_args() -> Vec<String> {
    vec!["/usr/local/sbin/ccw_apply_pfsense.php".to_string()]
}

fn default_apply_timeout_secs() -> u64 {
    300
}
