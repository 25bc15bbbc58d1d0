//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use fancy_regex::Regex;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // OneBot endpoint
    if config.onebot.url.is_empty() {
        errors.push("onebot.url is required".to_string());
    } else if !config.onebot.url.starts_with("ws://") && !config.onebot.url.starts_with("wss://") {
        errors.push(format!(
            "onebot.url must be a ws:// or wss:// URL (got '{}')",
            config.onebot.url
        ));
    }

    // RCON endpoint
    if config.rcon.host.is_empty() {
        errors.push("rcon.host is required".to_string());
    }
    if config.rcon.port == 0 {
        errors.push("rcon.port must be non-zero".to_string());
    }
    if config.rcon.password.is_empty() {
        errors.push("rcon.password is required".to_string());
    }

    // Bridge settings
    if config.bridge.enable_groups.is_empty() {
        errors.push("bridge.enable_groups is empty - no group will be relayed".to_string());
    }
    if config.bridge.cmd_prefix.is_empty() {
        errors.push("bridge.cmd_prefix must not be empty".to_string());
    }
    for (i, pattern) in config.bridge.allow_cmd.iter().enumerate() {
        if Regex::new(pattern).is_err() {
            errors.push(format!(
                "bridge.allow_cmd[{}] is not a valid regex: '{}'",
                i, pattern
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
