//! Minecraft RCON client.
//!
//! The connection is opened lazily on the first command and dropped on any
//! error; the next command reconnects. Commands are serialized over the one
//! connection. Broadcasts go through a queue drained by a background task,
//! so [`GameServer::broadcast`] never blocks the caller.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::bridge::ports::GameServer;
use crate::common::error::{ConnectionError, ConnectionResult, ProtocolError};
use crate::common::types::CommandOutcome;
use crate::config::types::RconConfig;
use crate::protocol::rcon::{
    new_rcon_connection, RconConnection, RconPacket, AUTH_FAILED_ID, MAX_REQUEST_BODY,
    SERVERDATA_AUTH_RESPONSE,
};

/// Output prefixes the server uses for a command it could not run.
const ERROR_PREFIXES: &[&str] = &[
    "Unknown or incomplete command",
    "Unknown command",
    "Incorrect argument for command",
    "Expected ",
    "Invalid ",
    "No player was found",
];

/// Marker the server puts under the offending token of a bad command.
const ERROR_MARKER: &str = "<--[HERE]";

/// Whether command output reports a failure.
pub fn is_error_output(output: &str) -> bool {
    let trimmed = output.trim_start();
    ERROR_PREFIXES.iter().any(|p| trimmed.starts_with(p)) || output.contains(ERROR_MARKER)
}

/// `tellraw` command that shows `text` to every player.
pub fn tellraw_command(text: &str) -> String {
    format!("tellraw @a {}", json!({ "text": text }))
}

/// `tellraw` commands showing `text`, split on char boundaries so that each
/// one fits in a single RCON request.
pub fn tellraw_commands(text: &str) -> Vec<String> {
    let budget = MAX_REQUEST_BODY - tellraw_command("").len();

    let mut chunks = Vec::new();
    let mut chunk = String::new();
    let mut chunk_len = 0;
    for c in text.chars() {
        // Escaped size inside the JSON string.
        let len = json!(c.to_string()).to_string().len() - 2;
        if chunk_len + len > budget && !chunk.is_empty() {
            chunks.push(std::mem::take(&mut chunk));
            chunk_len = 0;
        }
        chunk.push(c);
        chunk_len += len;
    }
    if !chunk.is_empty() || chunks.is_empty() {
        chunks.push(chunk);
    }

    chunks.iter().map(|c| tellraw_command(c)).collect()
}

/// One authenticated RCON session.
struct RconSession {
    config: RconConfig,
    connection: Mutex<Option<RconConnection<TcpStream>>>,
    next_id: AtomicI32,
}

impl RconSession {
    fn new(config: RconConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
            next_id: AtomicI32::new(1),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.max(1))
    }

    /// Request ids stay positive; -1 is reserved for auth failure.
    fn next_id(&self) -> i32 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if id <= 0 || id == i32::MAX {
            self.next_id.store(2, Ordering::Relaxed);
            return 1;
        }
        id
    }

    /// Run a command and return its complete output.
    async fn execute(&self, command: &str) -> ConnectionResult<String> {
        // Oversized commands never reach the connection.
        if command.len() > MAX_REQUEST_BODY {
            return Err(ProtocolError::PacketTooLarge {
                size: command.len(),
            }
            .into());
        }

        let mut guard = self.connection.lock().await;

        if guard.is_none() {
            let connection = tokio::time::timeout(self.timeout(), self.connect())
                .await
                .map_err(|_| ConnectionError::Timeout)??;
            *guard = Some(connection);
        }
        let Some(connection) = guard.as_mut() else {
            return Err(ConnectionError::ConnectionClosed);
        };

        let id = self.next_id();
        let marker = self.next_id();
        let result = tokio::time::timeout(self.timeout(), exchange(connection, id, marker, command))
            .await
            .unwrap_or(Err(ConnectionError::Timeout));

        if result.is_err() {
            // Stale responses would be read as the answer to the next command.
            *guard = None;
        }
        result
    }

    async fn connect(&self) -> ConnectionResult<RconConnection<TcpStream>> {
        let host = self.config.host.as_str();
        let port = self.config.port;

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| ConnectionError::ConnectFailed {
                host: host.to_string(),
                port,
                source: e,
            })?;
        let mut connection = new_rcon_connection(stream);

        let id = self.next_id();
        connection
            .send(RconPacket::login(id, &self.config.password))
            .await?;

        loop {
            let packet = connection
                .next()
                .await
                .ok_or(ConnectionError::ConnectionClosed)??;

            // Some servers send an empty response value before the auth reply.
            if packet.kind != SERVERDATA_AUTH_RESPONSE {
                continue;
            }
            if packet.id == AUTH_FAILED_ID {
                return Err(ProtocolError::AuthFailed {
                    reason: "wrong RCON password".to_string(),
                }
                .into());
            }
            if packet.id == id {
                break;
            }
        }

        info!("RCON connected to {}:{}", host, port);
        Ok(connection)
    }
}

/// Send `command` followed by an end marker and collect the response
/// fragments that arrive before the marker's reply.
async fn exchange(
    connection: &mut RconConnection<TcpStream>,
    id: i32,
    marker: i32,
    command: &str,
) -> ConnectionResult<String> {
    connection.send(RconPacket::exec(id, command)).await?;
    connection.send(RconPacket::end_marker(marker)).await?;

    let mut output = String::new();
    loop {
        let packet = connection
            .next()
            .await
            .ok_or(ConnectionError::ConnectionClosed)??;

        if packet.id == marker {
            return Ok(output);
        }
        if packet.id == id {
            output.push_str(&packet.body);
        } else {
            debug!("Discarding RCON packet with unexpected id {}", packet.id);
        }
    }
}

/// Game server adapter over RCON.
pub struct RconClient {
    session: Arc<RconSession>,
    broadcast_tx: mpsc::UnboundedSender<String>,
}

impl RconClient {
    /// Create the client and start its broadcast task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: RconConfig) -> Self {
        let session = Arc::new(RconSession::new(config));
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();
        tokio::spawn(broadcast_loop(session.clone(), broadcast_rx));

        Self {
            session,
            broadcast_tx,
        }
    }
}

async fn broadcast_loop(session: Arc<RconSession>, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        for command in tellraw_commands(&text) {
            if let Err(e) = session.execute(&command).await {
                warn!("Failed to broadcast to game: {}", e);
                break;
            }
        }
    }
    debug!("Broadcast queue closed");
}

#[async_trait]
impl GameServer for RconClient {
    fn broadcast(&self, text: &str) {
        if self.broadcast_tx.send(text.to_string()).is_err() {
            warn!("Broadcast task stopped, dropping message");
        }
    }

    async fn run_command(&self, command: &str) -> CommandOutcome {
        match self.session.execute(command).await {
            Ok(output) if is_error_output(&output) => CommandOutcome::failed(output),
            Ok(output) => CommandOutcome::succeeded(output),
            Err(e) => {
                warn!("RCON command '{}' failed: {}", command, e);
                CommandOutcome::failed(e.to_string())
            }
        }
    }
}
