// # Command Address Source
//
// This crate provides the production AddressSource for the WAN IPv6 check.
//
// ## Supported Tools
//
// - `ifconfig <iface>`: FreeBSD / pfSense (default)
// - `ip -6 addr show dev <iface>`: Linux iproute2
//
// The interface name is passed as its own argv element. No shell is
// involved, so the name cannot smuggle in extra commands.
//
// The command is killed if it does not finish within the configured
// timeout.

use ccw_core::config::{CheckConfig, ListingTool};
use ccw_core::traits::AddressSource;
use ccw_core::{Error, Result};

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// Address source that runs a listing command
#[derive(Debug, Clone)]
pub struct CommandAddressSource {
    /// Program to run
    program: String,

    /// Arguments placed before the interface name
    leading_args: Vec<String>,

    /// Interface to query
    interface: String,

    /// Kill the command after this long
    timeout: Duration,
}

impl CommandAddressSource {
    /// Create a source for one of the supported tools
    pub fn new(tool: ListingTool, interface: impl Into<String>, timeout: Duration) -> Self {
        let (program, leading_args) = match tool {
            ListingTool::Ifconfig => ("ifconfig", Vec::new()),
            ListingTool::Ip => (
                "ip",
                vec!["-6".to_string(), "addr".to_string(), "show".to_string(), "dev".to_string()],
            ),
        };

        Self::with_program(program, leading_args, interface, timeout)
    }

    /// Create a source running an arbitrary program
    ///
    /// The program is invoked as `program <leading_args...> <interface>`.
    pub fn with_program(
        program: impl Into<String>,
        leading_args: Vec<String>,
        interface: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args,
            interface: interface.into(),
            timeout,
        }
    }

    /// Create a source from the check configuration
    pub fn from_config(config: &CheckConfig) -> Self {
        Self::new(
            config.listing.tool,
            config.wan_interface.clone(),
            config.listing.timeout(),
        )
    }

    /// Command line, for log messages
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.as_str()];
        parts.extend(self.leading_args.iter().map(String::as_str));
        parts.push(&self.interface);
        parts.join(" ")
    }
}

#[async_trait::async_trait]
impl AddressSource for CommandAddressSource {
    async fn interface_status(&self) -> Result<String> {
        debug!(command = %self.command_line(), "Listing interface addresses");

        let child = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(&self.interface)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::address_source(format!("Failed to run '{}': {}", self.command_line(), e))
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::address_source(format!(
                    "'{}' did not finish within {:?}",
                    self.command_line(),
                    self.timeout
                ))
            })?
            .map_err(|e| {
                Error::address_source(format!("Failed to run '{}': {}", self.command_line(), e))
            })?;

        if !output.status.success() {
            return Err(Error::address_source(format!(
                "'{}' failed with {}: {}",
                self.command_line(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn interface(&self) -> &str {
        &self.interface
    }
}
