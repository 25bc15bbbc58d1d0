//! OneBot v11 forward websocket client.
//!
//! [`OneBotClient`] is the handle the bridge talks to; [`OneBotConnection`]
//! owns the socket and is driven by a reconnect loop. Both share the
//! outbound queue and the table of in-flight actions, so queued messages
//! survive a reconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::bridge::ports::ChatPlatform;
use crate::chat::events::to_chat_event;
use crate::common::error::{OneBotError, OneBotResult};
use crate::common::messages::{ChatEvent, Quote};
use crate::common::types::{MemberInfo, Uin};
use crate::config::types::OneBotConfig;
use crate::protocol::onebot::{parse_frame, ActionRequest, ActionResponse, Frame, MessageData};

/// How long to wait for an action response.
const ACTION_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// State shared between the client handle and the connection.
#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    pending: Mutex<HashMap<String, oneshot::Sender<ActionResponse>>>,
}

impl Shared {
    /// Drop every in-flight action; their callers see `NotConnected`.
    async fn fail_pending(&self) {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            debug!("Dropping {} in-flight actions", pending.len());
        }
        pending.clear();
    }
}

/// Handle for sending actions to the OneBot implementation.
pub struct OneBotClient {
    shared: Arc<Shared>,
    outbound_tx: mpsc::UnboundedSender<String>,
    echo_seq: AtomicU64,
}

/// The websocket side of a [`OneBotClient`].
pub struct OneBotConnection {
    config: OneBotConfig,
    shared: Arc<Shared>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    events_tx: mpsc::UnboundedSender<ChatEvent>,
}

impl OneBotClient {
    /// Create a client and the connection that serves it.
    ///
    /// Decoded events are delivered to `events_tx`.
    pub fn new(
        config: OneBotConfig,
        events_tx: mpsc::UnboundedSender<ChatEvent>,
    ) -> (Self, OneBotConnection) {
        let shared = Arc::new(Shared::default());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let client = Self {
            shared: shared.clone(),
            outbound_tx,
            echo_seq: AtomicU64::new(1),
        };
        let connection = OneBotConnection {
            config,
            shared,
            outbound_rx,
            events_tx,
        };
        (client, connection)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn next_echo(&self) -> String {
        self.echo_seq.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn encode(&self, action: &str, params: Value) -> OneBotResult<(String, String)> {
        let echo = self.next_echo();
        let frame = serde_json::to_string(&ActionRequest {
            action,
            params,
            echo: echo.clone(),
        })?;
        Ok((echo, frame))
    }

    /// Send an action and wait for its `data`.
    pub async fn call(&self, action: &str, params: Value) -> OneBotResult<Value> {
        if !self.is_connected() {
            return Err(OneBotError::NotConnected);
        }

        let (echo, frame) = self.encode(action, params)?;
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(echo.clone(), tx);

        if self.outbound_tx.send(frame).is_err() {
            self.shared.pending.lock().await.remove(&echo);
            return Err(OneBotError::NotConnected);
        }

        let response = match tokio::time::timeout(ACTION_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(OneBotError::NotConnected),
            Err(_) => {
                self.shared.pending.lock().await.remove(&echo);
                return Err(OneBotError::Timeout {
                    action: action.to_string(),
                });
            }
        };

        if !response.is_ok() {
            return Err(OneBotError::ActionFailed {
                action: action.to_string(),
                retcode: response.retcode,
            });
        }
        if response.data.is_null() {
            return Err(OneBotError::EmptyResponse {
                action: action.to_string(),
            });
        }
        Ok(response.data)
    }

    /// Queue an action without waiting for the response.
    pub fn enqueue(&self, action: &str, params: Value) -> OneBotResult<()> {
        let (_, frame) = self.encode(action, params)?;
        self.outbound_tx
            .send(frame)
            .map_err(|_| OneBotError::NotConnected)
    }
}

#[async_trait]
impl ChatPlatform for OneBotClient {
    async fn member_info(&self, group_id: Uin, user_id: &str) -> Option<MemberInfo> {
        let user_id: Uin = user_id.parse().ok()?;
        let params = json!({ "group_id": group_id, "user_id": user_id, "no_cache": false });

        match self.call("get_group_member_info", params).await {
            Ok(data) => serde_json::from_value(data)
                .map_err(|e| warn!("Malformed member info for {}: {}", user_id, e))
                .ok(),
            Err(e) => {
                debug!("Member lookup for {} in {} failed: {}", user_id, group_id, e);
                None
            }
        }
    }

    async fn quoted_message(&self, message_id: &str) -> Option<Quote> {
        let message_id: i64 = message_id.parse().ok()?;

        let data = match self.call("get_msg", json!({ "message_id": message_id })).await {
            Ok(data) => data,
            Err(e) => {
                debug!("Fetching quoted message {} failed: {}", message_id, e);
                return None;
            }
        };

        let data: MessageData = serde_json::from_value(data)
            .map_err(|e| warn!("Malformed message {}: {}", message_id, e))
            .ok()?;
        let author_id = Some(data.sender.user_id).filter(|id| *id != 0);

        Some(Quote {
            author_id,
            segments: data.message.into_segments(),
        })
    }

    fn send_group(&self, group_id: Uin, text: &str) {
        let params = json!({ "group_id": group_id, "message": text, "auto_escape": true });
        if let Err(e) = self.enqueue("send_group_msg", params) {
            warn!("Failed to queue message for group {}: {}", group_id, e);
        }
    }
}

impl OneBotConnection {
    /// Open the websocket, authenticating with the access token if set.
    pub async fn connect(&self) -> anyhow::Result<WsStream> {
        let mut request = self.config.url.as_str().into_client_request()?;

        if let Some(token) = self.config.access_token.as_deref().filter(|t| !t.is_empty()) {
            request
                .headers_mut()
                .insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
        }

        let (ws, _) = connect_async(request).await?;
        info!("Connected to OneBot at {}", self.config.url);
        Ok(ws)
    }

    /// Serve one connection until it closes.
    pub async fn run(&mut self, ws: WsStream) -> anyhow::Result<()> {
        let (mut write, mut read) = ws.split();
        self.shared.connected.store(true, Ordering::Release);

        let result = loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text).await,
                    Some(Ok(Message::Close(frame))) => {
                        debug!("OneBot closed the connection: {:?}", frame);
                        break Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(e.into()),
                    None => break Ok(()),
                },

                Some(outgoing) = self.outbound_rx.recv() => {
                    if let Err(e) = write.send(Message::Text(outgoing)).await {
                        break Err(e.into());
                    }
                }
            }
        };

        self.shared.connected.store(false, Ordering::Release);
        self.shared.fail_pending().await;
        result
    }

    async fn handle_frame(&self, text: &str) {
        match parse_frame(text) {
            Ok(Frame::Response(response)) => self.complete(response).await,
            Ok(Frame::Event(event)) => {
                if let Some(event) = to_chat_event(*event) {
                    if self.events_tx.send(event).is_err() {
                        warn!("Chat event receiver dropped");
                    }
                }
            }
            Ok(Frame::Other) => {}
            Err(e) => warn!("Undecodable OneBot frame: {}", e),
        }
    }

    async fn complete(&self, response: ActionResponse) {
        let Some(echo) = response.echo_key() else {
            return;
        };

        match self.shared.pending.lock().await.remove(&echo) {
            Some(waiter) => {
                // The caller may have timed out already.
                let _ = waiter.send(response);
            }
            None if !response.is_ok() => {
                warn!("Action {} failed with retcode {}", echo, response.retcode)
            }
            None => {}
        }
    }
}
