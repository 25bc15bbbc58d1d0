//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `ONEBOT_BRIDGE_ONEBOT_URL` - OneBot websocket URL
//! - `ONEBOT_BRIDGE_ACCESS_TOKEN` - OneBot access token
//! - `ONEBOT_BRIDGE_RCON_HOST` - RCON host
//! - `ONEBOT_BRIDGE_RCON_PORT` - RCON port
//! - `ONEBOT_BRIDGE_RCON_PASSWORD` - RCON password

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "ONEBOT_BRIDGE";

/// Apply environment variable overrides to a config.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(url) = env::var(format!("{}_ONEBOT_URL", ENV_PREFIX)) {
        config.onebot.url = url;
    }
    if let Ok(token) = env::var(format!("{}_ACCESS_TOKEN", ENV_PREFIX)) {
        config.onebot.access_token = Some(token);
    }

    if let Ok(host) = env::var(format!("{}_RCON_HOST", ENV_PREFIX)) {
        config.rcon.host = host;
    }
    if let Ok(port) = env::var(format!("{}_RCON_PORT", ENV_PREFIX)) {
        if let Ok(port) = port.parse() {
            config.rcon.port = port;
        }
    }
    if let Ok(password) = env::var(format!("{}_RCON_PASSWORD", ENV_PREFIX)) {
        config.rcon.password = password;
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `ONEBOT_BRIDGE_CONFIG`, otherwise returns "onebot-bridge.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX))
        .unwrap_or_else(|_| "onebot-bridge.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::load_config_str;

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "ONEBOT_BRIDGE");
    }

    #[test]
    fn test_apply_env_overrides_no_vars() {
        let config = load_config_str(
            r#"
            onebot { url = "ws://original" }
            rcon { host = "localhost", password = "original" }
            "#,
        )
        .unwrap();

        // Only assert on fields whose variables are not set in the test environment.
        let has_url = env::var("ONEBOT_BRIDGE_ONEBOT_URL").is_ok();
        let has_pw = env::var("ONEBOT_BRIDGE_RCON_PASSWORD").is_ok();
        let result = apply_env_overrides(config);

        if !has_url {
            assert_eq!(result.onebot.url, "ws://original");
        }
        if !has_pw {
            assert_eq!(result.rcon.password, "original");
        }
    }
}
