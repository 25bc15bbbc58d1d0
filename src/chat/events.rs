//! Translation of OneBot event pushes into bridge events.

use tracing::trace;

use crate::common::messages::{ChatEvent, GroupMessage, PokeNotice, Sender};
use crate::common::segment::MessageContent;
use crate::protocol::onebot::EventFrame;

/// Convert an event frame into a [`ChatEvent`].
///
/// Returns `None` for everything the bridge does not handle: private
/// messages, heartbeats and other notices.
pub fn to_chat_event(frame: EventFrame) -> Option<ChatEvent> {
    match frame.post_type.as_str() {
        "message" => group_message(frame).map(ChatEvent::GroupMessage),
        "notice" => poke_notice(&frame).map(ChatEvent::Poke),
        other => {
            trace!(post_type = other, "Skipping event");
            None
        }
    }
}

fn group_message(frame: EventFrame) -> Option<GroupMessage> {
    if frame.message_type.as_deref() != Some("group") {
        return None;
    }
    let group_id = frame.group_id?;

    let raw = match (&frame.message, frame.raw_message.is_empty()) {
        (MessageContent::CqString(cq), true) => cq.clone(),
        _ => frame.raw_message,
    };

    let mut sender = Sender {
        user_id: frame.sender.user_id,
        nickname: frame.sender.nickname,
        card: frame.sender.card,
    };
    if sender.user_id == 0 {
        sender.user_id = frame.user_id.unwrap_or_default();
    }

    Some(GroupMessage {
        message_id: frame.message_id.unwrap_or_default(),
        group_id,
        self_id: frame.self_id,
        sender,
        segments: frame.message.into_segments(),
        raw,
    })
}

fn poke_notice(frame: &EventFrame) -> Option<PokeNotice> {
    if frame.notice_type.as_deref() != Some("notify") || frame.sub_type.as_deref() != Some("poke") {
        return None;
    }

    Some(PokeNotice {
        group_id: frame.group_id?,
        user_id: frame.user_id?,
        target_id: frame.target_id?,
        self_id: frame.self_id,
    })
}
