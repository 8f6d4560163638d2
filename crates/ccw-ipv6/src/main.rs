// # ccw-ipv6 - Check Current WAN IPv6
//
// Thin integration layer over ccw-core, meant to be run from cron every
// few minutes. It takes no command-line arguments:
// 1. Reads configuration from environment variables (or a JSON file)
// 2. Initializes logging and the runtime
// 3. Wires the command-based collaborators into the CheckEngine
// 4. Runs one check and exits with its code
//
// ## Configuration
//
// Every setting has a built-in default suitable for pfSense.
//
// - `CCW_CONFIG_FILE`: JSON file with a full or partial configuration
// - `CCW_WAN_INTERFACE`: WAN interface (default: igb0)
// - `CCW_STATE_FILE`: Last applied address (default: /tmp/_current_wan_ipv6.txt)
// - `CCW_LOCK_FILE`: Lock marker (default: /tmp/_current_wan_ipv6.lock)
// - `CCW_STALE_LOCK_SECS`: Lock staleness threshold (default: 600)
// - `CCW_LISTING_TOOL`: ifconfig or ip (default: ifconfig)
// - `CCW_LISTING_TIMEOUT_SECS`: Listing command timeout (default: 30)
// - `CCW_APPLY_COMMAND`: LAN apply command line
//   (default: php /usr/local/sbin/ccw_apply_pfsense.php). Split on
//   whitespace with no quoting, so an argument containing spaces has to
//   go in the `apply.args` list of `CCW_CONFIG_FILE` instead.
// - `CCW_APPLY_TIMEOUT_SECS`: Apply timeout (default: 300)
// - `CCW_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// Environment variables override values from the JSON file.
//
// ## Example
//
// ```bash
// */5 * * * * CCW_WAN_INTERFACE=igb3 /usr/local/bin/ccw-ipv6
// ```
//
// ## Exit Codes
//
// 0 applied or unchanged, 1 no address, 2 no current address, 3 address
// not recognized, 4/5 state write failed, 6 apply failed, 10 locked,
// 11 lock error, 70 runtime error, 78 configuration error.

use anyhow::{Context, Result};
use ccw_apply_command::CommandApplyProcedure;
use ccw_core::{ApplyConfig, CheckConfig, CheckEngine, FileStateStore};
use ccw_source_command::CommandAddressSource;
use std::env;
use std::process::ExitCode;
use tracing::{Level, debug, error};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for failures outside the check itself
///
/// These follow sysexits(3) so they cannot collide with check outcomes.
#[derive(Debug, Clone, Copy)]
enum StartupExitCode {
    /// Runtime could not be created
    RuntimeError = 70,
    /// Configuration error
    ConfigError = 78,
}

impl From<StartupExitCode> for ExitCode {
    fn from(code: StartupExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    check: CheckConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut check = match lookup("CCW_CONFIG_FILE") {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read CCW_CONFIG_FILE {}", path))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse CCW_CONFIG_FILE {}", path))?
            }
            None => CheckConfig::default(),
        };

        if let Some(interface) = lookup("CCW_WAN_INTERFACE") {
            check.wan_interface = interface;
        }
        if let Some(path) = lookup("CCW_STATE_FILE") {
            check.state_file = path.into();
        }
        if let Some(path) = lookup("CCW_LOCK_FILE") {
            check.lock_file = path.into();
        }
        if let Some(secs) = lookup("CCW_STALE_LOCK_SECS") {
            check.stale_lock_secs = parse_secs("CCW_STALE_LOCK_SECS", &secs)?;
        }
        if let Some(tool) = lookup("CCW_LISTING_TOOL") {
            check.listing.tool = tool.parse()?;
        }
        if let Some(secs) = lookup("CCW_LISTING_TIMEOUT_SECS") {
            check.listing.timeout_secs = parse_secs("CCW_LISTING_TIMEOUT_SECS", &secs)?;
        }
        if let Some(line) = lookup("CCW_APPLY_COMMAND") {
            let timeout_secs = check.apply.timeout_secs;
            check.apply = ApplyConfig {
                timeout_secs,
                ..ApplyConfig::from_command_line(&line)?
            };
        }
        if let Some(secs) = lookup("CCW_APPLY_TIMEOUT_SECS") {
            check.apply.timeout_secs = parse_secs("CCW_APPLY_TIMEOUT_SECS", &secs)?;
        }

        Ok(Self {
            check,
            log_level: lookup("CCW_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.check.validate()?;

        if parse_log_level(&self.log_level).is_none() {
            anyhow::bail!(
                "CCW_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number of seconds. Got: {}", name, value))
}

fn parse_log_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return StartupExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return StartupExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return StartupExitCode::ConfigError.into();
    }

    debug!(?config, "Configuration loaded");

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return StartupExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_check(config.check).await {
            Ok(code) => ExitCode::from(code),
            Err(e) => {
                error!("Check engine rejected the configuration: {:#}", e);
                StartupExitCode::ConfigError.into()
            }
        }
    })
}

/// Build the engine from configuration and run one check
async fn run_check(check: CheckConfig) -> Result<u8> {
    let engine = CheckEngine::new(
        Box::new(CommandAddressSource::from_config(&check)),
        Box::new(CommandApplyProcedure::from_config(&check)),
        Box::new(FileStateStore::new(&check.state_file)),
        &check,
    )?;

    Ok(engine.run().await.exit_code())
}
