// # Command Apply Procedure
//
// Runs the LAN apply step as a subprocess.
//
// On pfSense the default program is a PHP script that performs the same
// steps as pressing "Apply" on the LAN interface page: bring the interface
// down and up, reconfigure track6, restart interface services and reload
// the filter. Exit status 0 means success; anything else, including a
// signal or a timeout, is a failure.

use ccw_core::config::{ApplyConfig, CheckConfig};
use ccw_core::traits::ApplyProcedure;
use ccw_core::{Error, Result};

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

/// Apply procedure backed by an external program
#[derive(Debug, Clone)]
pub struct CommandApplyProcedure {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandApplyProcedure {
    /// Create a new apply procedure
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Create from the apply section of the configuration
    pub fn from_apply_config(config: &ApplyConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone(), config.timeout())
    }

    /// Create from the check configuration
    pub fn from_config(config: &CheckConfig) -> Self {
        Self::from_apply_config(&config.apply)
    }
}

#[async_trait::async_trait]
impl ApplyProcedure for CommandApplyProcedure {
    async fn apply(&self) -> Result<()> {
        info!(command = %self.describe(), "Applying LAN interface configuration");

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::apply(format!("Failed to run '{}': {}", self.describe(), e)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result
                .map_err(|e| Error::apply(format!("Failed to run '{}': {}", self.describe(), e)))?,
            Err(_) => {
                return Err(Error::apply(format!(
                    "'{}' did not finish within {:?}",
                    self.describe(),
                    self.timeout
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!(stdout = %stdout.trim(), "Apply procedure output");
        }
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "Apply procedure error output");
        }

        if !output.status.success() {
            return Err(Error::apply(format!(
                "'{}' failed with {}",
                self.describe(),
                output.status
            )));
        }

        Ok(())
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
