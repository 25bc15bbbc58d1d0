//! Interfaces the bridge needs from its two hosts.
//!
//! Outbound text delivery is fire-and-forget: implementations queue the
//! message and report failures through their own logging.

use async_trait::async_trait;

use crate::common::messages::Quote;
use crate::common::types::{CommandOutcome, MemberInfo, Uin};

/// Group chat platform (OneBot).
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Look up a member's profile in a group. `None` when unavailable.
    async fn member_info(&self, group_id: Uin, user_id: &str) -> Option<MemberInfo>;

    /// Fetch a previously sent message by id.
    async fn quoted_message(&self, message_id: &str) -> Option<Quote>;

    /// Queue a text message to one group.
    fn send_group(&self, group_id: Uin, text: &str);

    /// Queue a text message to several groups.
    fn broadcast(&self, group_ids: &[Uin], text: &str) {
        for group_id in group_ids {
            self.send_group(*group_id, text);
        }
    }
}

/// Game server host (Minecraft over RCON).
#[async_trait]
pub trait GameServer: Send + Sync {
    /// Queue a text broadcast to every online player.
    fn broadcast(&self, text: &str);

    /// Run a console command and capture its output.
    async fn run_command(&self, command: &str) -> CommandOutcome;
}
