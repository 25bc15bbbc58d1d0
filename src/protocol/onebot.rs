//! OneBot v11 websocket frames.
//!
//! The forward websocket carries both event pushes and responses to the
//! actions we send. Responses are told apart by their `echo` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::segment::MessageContent;
use crate::common::types::Uin;

/// An action request sent to the OneBot implementation.
#[derive(Debug, Serialize)]
pub struct ActionRequest<'a> {
    pub action: &'a str,
    pub params: Value,
    pub echo: String,
}

/// Response to an action, matched to its request by `echo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub retcode: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub echo: Value,
}

impl ActionResponse {
    /// `echo` as a string key; implementations may return it as a number.
    pub fn echo_key(&self) -> Option<String> {
        match &self.echo {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.retcode == 0 && self.status != "failed"
    }
}

/// Sender block of a message event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SenderFrame {
    #[serde(default)]
    pub user_id: Uin,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: String,
}

/// An event push. Only the fields the bridge reads are declared.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFrame {
    pub post_type: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub notice_type: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub self_id: Uin,
    #[serde(default)]
    pub group_id: Option<Uin>,
    #[serde(default)]
    pub user_id: Option<Uin>,
    #[serde(default)]
    pub target_id: Option<Uin>,
    #[serde(default)]
    pub message_id: Option<i64>,
    #[serde(default)]
    pub message: MessageContent,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default)]
    pub sender: SenderFrame,
}

/// `data` of a `get_msg` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageData {
    #[serde(default)]
    pub sender: SenderFrame,
    #[serde(default)]
    pub message: MessageContent,
}

/// A decoded inbound frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Response(ActionResponse),
    Event(Box<EventFrame>),
    /// Valid JSON the bridge has no use for.
    Other,
}

/// Decode one websocket text frame.
pub fn parse_frame(text: &str) -> serde_json::Result<Frame> {
    let value: Value = serde_json::from_str(text)?;

    if value.get("post_type").is_some() {
        return Ok(Frame::Event(Box::new(serde_json::from_value(value)?)));
    }
    if value.get("echo").is_some() && value.get("retcode").is_some() {
        return Ok(Frame::Response(serde_json::from_value(value)?));
    }

    Ok(Frame::Other)
}
