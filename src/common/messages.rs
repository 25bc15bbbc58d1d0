//! Canonical message types for bridge communication.
//!
//! Adapters translate their wire formats into these types; the bridge only
//! ever sees these.

use crate::common::segment::Segment;
use crate::common::types::Uin;

/// Sender profile attached to a group message.
#[derive(Debug, Clone, Default)]
pub struct Sender {
    pub user_id: Uin,
    pub nickname: String,
    /// Group card name.
    pub card: String,
}

/// A message received in a chat group.
#[derive(Debug, Clone)]
pub struct GroupMessage {
    pub message_id: i64,
    pub group_id: Uin,
    pub self_id: Uin,
    pub sender: Sender,
    /// Message body, in order.
    pub segments: Vec<Segment>,
    /// Raw CQ-code form of the body.
    pub raw: String,
}

impl GroupMessage {
    /// Id of the quoted message, if this message replies to one.
    pub fn reply_id(&self) -> Option<String> {
        self.segments
            .iter()
            .find(|s| s.kind == "reply")
            .and_then(|s| s.attr("id"))
    }

    /// Body without its `reply` segments.
    pub fn body_without_reply(&self) -> Vec<Segment> {
        self.segments
            .iter()
            .filter(|s| s.kind != "reply")
            .cloned()
            .collect()
    }
}

/// A quoted message resolved from a reply reference.
#[derive(Debug, Clone, Default)]
pub struct Quote {
    /// Author of the quoted message, when known.
    pub author_id: Option<Uin>,
    pub segments: Vec<Segment>,
}

/// A poke ("nudge") inside a group.
#[derive(Debug, Clone)]
pub struct PokeNotice {
    pub group_id: Uin,
    pub user_id: Uin,
    pub target_id: Uin,
    pub self_id: Uin,
}

/// Events delivered by the chat platform adapter.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    GroupMessage(GroupMessage),
    Poke(PokeNotice),
}

/// Lifecycle events delivered by the game server adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A player said something in game chat.
    Chat { player: String, message: String },
    /// A player is authenticating, before the join completes.
    PreJoin { player: String },
    Join { player: String },
    Leave { player: String },
    /// A player died. `source` is the killer when the death line names one.
    Death {
        player: String,
        source: Option<String>,
        message: String,
    },
}

impl GameEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::Chat { .. } => "chat",
            GameEvent::PreJoin { .. } => "pre_join",
            GameEvent::Join { .. } => "join",
            GameEvent::Leave { .. } => "leave",
            GameEvent::Death { .. } => "death",
        }
    }
}
