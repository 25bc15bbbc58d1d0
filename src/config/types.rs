//! Configuration type definitions.

use serde::Deserialize;

use crate::common::types::Uin;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub onebot: OneBotConfig,
    pub rcon: RconConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// OneBot v11 forward websocket endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OneBotConfig {
    /// e.g. `ws://127.0.0.1:6700`
    pub url: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Minecraft RCON endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RconConfig {
    pub host: String,
    #[serde(default = "default_rcon_port")]
    pub port: u16,
    pub password: String,
    /// Per-request timeout.
    #[serde(default = "default_rcon_timeout")]
    pub timeout_secs: u64,
}

/// Game server log source.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Relay behaviour, access control and markers.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Users allowed to run any command.
    #[serde(default)]
    pub superusers: Vec<Uin>,
    /// Groups the bridge listens to and broadcasts into.
    #[serde(default)]
    pub enable_groups: Vec<Uin>,
    #[serde(default = "default_cmd_prefix")]
    pub cmd_prefix: String,
    /// Keyword that triggers a server status reply.
    #[serde(default = "default_cmd_status")]
    pub cmd_status: String,
    /// Reply with server status when the bot is poked.
    #[serde(default = "default_true")]
    pub poke_status: bool,
    /// Regexes of commands anyone may run.
    #[serde(default)]
    pub allow_cmd: Vec<String>,
    #[serde(default)]
    pub special_attr_prefix: String,
    #[serde(default)]
    pub special_attr_suffix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            superusers: Vec::new(),
            enable_groups: Vec::new(),
            cmd_prefix: default_cmd_prefix(),
            cmd_status: default_cmd_status(),
            poke_status: true,
            allow_cmd: Vec::new(),
            special_attr_prefix: String::new(),
            special_attr_suffix: String::new(),
        }
    }
}

/// Event templates. A missing or empty template disables that relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatesConfig {
    /// Game chat -> group.
    pub player_chat: Option<String>,
    /// Group message -> game.
    pub group_chat: Option<String>,
    pub player_pre_join: Option<String>,
    pub player_join: Option<String>,
    pub player_left: Option<String>,
    pub player_die: Option<String>,
}

fn default_rcon_port() -> u16 {
    25575
}

fn default_rcon_timeout() -> u64 {
    10
}

fn default_log_path() -> String {
    "logs/latest.log".to_string()
}

fn default_poll_interval() -> u64 {
    500
}

fn default_cmd_prefix() -> String {
    "/".to_string()
}

fn default_cmd_status() -> String {
    "查询".to_string()
}

fn default_true() -> bool {
    true
}
