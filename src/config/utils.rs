/// Configuration utilities - loading and validation
///
/// Configuration is loaded once and handed to constructors by value. Nothing
/// here is stored globally and there is no environment-variable fallback:
/// the contract address the ledger talks to comes from this file (or a CLI
/// override) and nowhere else.
use std::path::Path;

use super::schemas::Config;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Parse configuration from TOML text
pub fn parse_config(contents: &str, origin: &str) -> Result<Config, ConfigError> {
    toml::from_str::<Config>(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })
}

/// Load configuration from a specific file path.
///
/// A missing file yields defaults (with a warning); an unreadable or
/// malformed file is an error.
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    let display = path.display().to_string();
    if !path.exists() {
        logger::warning(
            LogTag::Config,
            &format!("⚠️  Config file '{}' not found, using default values", display),
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    let config = parse_config(&contents, &display)?;
    logger::debug(LogTag::Config, &format!("Loaded configuration from {}", display));
    Ok(config)
}

impl Config {
    /// Check values that would only fail later, deep inside a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.withdrawal.max_slippage_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "withdrawal.max_slippage_bps = {} exceeds 10000",
                self.withdrawal.max_slippage_bps
            )));
        }
        if self.reader.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reader.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.ledger.confirmation_timeout_secs == 0 || self.ledger.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "ledger timeouts must be positive".to_string(),
            ));
        }
        if self.logging.min_level.parse::<logger::LogLevel>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.min_level '{}' is not a log level",
                self.logging.min_level
            )));
        }
        Ok(())
    }

    /// Extra checks when talking to a real gateway
    pub fn validate_for_rpc(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.ledger.contract_address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "ledger.contract_address is required for the RPC ledger".to_string(),
            ));
        }
        if self.ledger.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid("ledger.rpc_url is empty".to_string()));
        }
        Ok(())
    }
}
