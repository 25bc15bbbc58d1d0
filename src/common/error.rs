//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// RCON protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid packet: {message}")]
    InvalidPacket { message: String },

    #[error("Packet too short: need {needed} bytes, got {got}")]
    PacketTooShort { needed: usize, got: usize },

    #[error("Packet too large: {size} bytes")]
    PacketTooLarge { size: usize },

    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Connection timeout")]
    Timeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// OneBot action errors.
#[derive(Debug, Error)]
pub enum OneBotError {
    #[error("Not connected to OneBot endpoint")]
    NotConnected,

    #[error("Action '{action}' timed out")]
    Timeout { action: String },

    #[error("Action '{action}' failed with retcode {retcode}")]
    ActionFailed { action: String, retcode: i64 },

    #[error("Action '{action}' returned no data")]
    EmptyResponse { action: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for OneBot actions.
pub type OneBotResult<T> = std::result::Result<T, OneBotError>;

/// Result type alias for RCON connection operations.
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;
