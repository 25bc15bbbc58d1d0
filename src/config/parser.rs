//! Configuration file parsing (HOCON format).

use std::path::Path;

use crate::common::error::ConfigError;
use crate::config::types::Config;
use hocon::HoconLoader;

/// Load configuration from a HOCON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    HoconLoader::new()
        .load_file(path)
        .map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Load configuration from a HOCON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        onebot { url = "ws://127.0.0.1:6700" }
        rcon { host = "127.0.0.1", password = "secret" }
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_str(MINIMAL).unwrap();

        assert_eq!(config.onebot.url, "ws://127.0.0.1:6700");
        assert_eq!(config.rcon.port, 25575);
        assert_eq!(config.bridge.cmd_prefix, "/");
        assert_eq!(config.bridge.cmd_status, "查询");
        assert!(config.bridge.poke_status);
        assert!(config.bridge.allow_cmd.is_empty());
        assert_eq!(config.server.log_path, "logs/latest.log");
        assert!(config.templates.player_die.is_none());
    }

    #[test]
    fn test_full_config() {
        let content = r##"
            onebot {
                url = "ws://10.0.0.2:6700"
                access_token = "token"
            }
            rcon {
                host = "10.0.0.3"
                port = 25580
                password = "pw"
            }
            bridge {
                superusers = [10001, 10002]
                enable_groups = [123456]
                cmd_prefix = "#"
                allow_cmd = ["^list$", "^tps"]
                special_attr_prefix = "["
                special_attr_suffix = "]"
            }
            templates {
                player_die = "{{player}} died to {{source}}"
                group_chat = "<{{name}}> {{{message}}}"
            }
        "##;
        let config = load_config_str(content).unwrap();

        assert_eq!(config.onebot.access_token.as_deref(), Some("token"));
        assert_eq!(config.rcon.port, 25580);
        assert_eq!(config.bridge.superusers, vec![10001, 10002]);
        assert_eq!(config.bridge.enable_groups, vec![123456]);
        assert_eq!(config.bridge.cmd_prefix, "#");
        assert_eq!(config.bridge.allow_cmd.len(), 2);
        assert_eq!(
            config.templates.player_die.as_deref(),
            Some("{{player}} died to {{source}}")
        );
    }

    #[test]
    fn test_missing_section_fails() {
        let result = load_config_str(r#"onebot { url = "ws://x" }"#);
        assert!(result.is_err());
    }
}
