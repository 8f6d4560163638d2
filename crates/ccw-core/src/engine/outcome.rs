//! Terminal outcomes of a check and their exit codes

use tracing::{info, warn};

use crate::LOG_PREFIX;

/// How a check ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Address changed (or first run) and the LAN configuration was applied
    Applied {
        address: String,
        previous: Option<String>,
    },

    /// Stored address is still current
    Unchanged { address: String },

    /// The interface reported no IPv6 addresses at all
    NoAddressFound { interface: String },

    /// Only link-local, unique-local or deprecated addresses
    NoCurrentAddress { interface: String },

    /// The selected entry did not normalize to an address
    UnrecognizedAddress { candidate: String },

    /// Persisting the new address failed
    WriteFailed {
        address: String,
        /// No previous address was stored
        first_run: bool,
        error: String,
    },

    /// The LAN apply procedure failed; state left untouched
    ApplyFailed { address: String, error: String },

    /// Another run holds an active lock
    Locked,

    /// The lock marker could not be inspected or created
    LockFailed { error: String },
}

impl CheckOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            CheckOutcome::Applied { .. } | CheckOutcome::Unchanged { .. } => 0,
            CheckOutcome::NoAddressFound { .. } => 1,
            CheckOutcome::NoCurrentAddress { .. } => 2,
            CheckOutcome::UnrecognizedAddress { .. } => 3,
            CheckOutcome::WriteFailed { first_run: true, .. } => 4,
            CheckOutcome::WriteFailed { first_run: false, .. } => 5,
            CheckOutcome::ApplyFailed { .. } => 6,
            CheckOutcome::Locked => 10,
            CheckOutcome::LockFailed { .. } => 11,
        }
    }

    /// Whether the run ended without a problem
    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }

    /// Whether this run performed the LAN apply
    pub fn applied(&self) -> bool {
        matches!(self, CheckOutcome::Applied { .. })
    }

    /// Human-readable message, without the log prefix
    pub fn message(&self) -> String {
        match self {
            CheckOutcome::Applied { address, .. } => {
                format!("Current IP settings applied successfully: {}", address)
            }
            CheckOutcome::Unchanged { address } => format!(
                "Current WAN IP is identical to IP found in file, so still valid: {}",
                address
            ),
            CheckOutcome::NoAddressFound { interface } => {
                format!("Could not get IP from interface {}", interface)
            }
            CheckOutcome::NoCurrentAddress { .. } => {
                "Could not find current IP of WAN interface".to_string()
            }
            CheckOutcome::UnrecognizedAddress { candidate } => {
                format!("Current IP found, but failed to recognize: {}", candidate)
            }
            CheckOutcome::WriteFailed { error, .. } => {
                format!("Could not write current IP into file: {}", error)
            }
            CheckOutcome::ApplyFailed { error, .. } => {
                format!("Could not apply LAN interface settings: {}", error)
            }
            CheckOutcome::Locked => {
                "Could not get lock, maybe another process is still running?".to_string()
            }
            CheckOutcome::LockFailed { error } => format!("Could not set lock: {}", error),
        }
    }

    /// Emit the single log entry for this outcome
    pub fn log(&self) {
        let exit_code = self.exit_code();
        if self.is_success() {
            info!(exit_code, "{}{}", LOG_PREFIX, self.message());
        } else {
            warn!(exit_code, "{}{}", LOG_PREFIX, self.message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let applied = CheckOutcome::Applied {
            address: "2001:db8::5".to_string(),
            previous: None,
        };
        assert_eq!(applied.exit_code(), 0);
        assert!(applied.is_success());
        assert!(applied.applied());

        let unchanged = CheckOutcome::Unchanged {
            address: "2001:db8::5".to_string(),
        };
        assert_eq!(unchanged.exit_code(), 0);
        assert!(!unchanged.applied());

        let cases = [
            (CheckOutcome::NoAddressFound { interface: "igb0".into() }, 1),
            (CheckOutcome::NoCurrentAddress { interface: "igb0".into() }, 2),
            (CheckOutcome::UnrecognizedAddress { candidate: "x".into() }, 3),
            (
                CheckOutcome::WriteFailed {
                    address: "2001:db8::5".into(),
                    first_run: true,
                    error: "disk full".into(),
                },
                4,
            ),
            (
                CheckOutcome::WriteFailed {
                    address: "2001:db8::5".into(),
                    first_run: false,
                    error: "disk full".into(),
                },
                5,
            ),
            (
                CheckOutcome::ApplyFailed {
                    address: "2001:db8::5".into(),
                    error: "exit status 1".into(),
                },
                6,
            ),
            (CheckOutcome::Locked, 10),
            (CheckOutcome::LockFailed { error: "denied".into() }, 11),
        ];
        for (outcome, code) in cases {
            assert_eq!(outcome.exit_code(), code, "{:?}", outcome);
            assert!(!outcome.is_success());
        }
    }

    #[test]
    fn test_messages() {
        let outcome = CheckOutcome::NoAddressFound {
            interface: "igb0".to_string(),
        };
        assert_eq!(outcome.message(), "Could not get IP from interface igb0");

        let outcome = CheckOutcome::Applied {
            address: "2001:db8::9".to_string(),
            previous: Some("2001:db8::5".to_string()),
        };
        assert!(outcome.message().ends_with("2001:db8::9"));
    }
}
