//! In-memory port implementations for bridge tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::ports::{ChatPlatform, GameServer};
use crate::common::messages::Quote;
use crate::common::types::{CommandOutcome, MemberInfo, Uin};

#[derive(Default)]
pub struct FakeChat {
    pub members: HashMap<String, MemberInfo>,
    /// Artificial lookup latency per user id.
    pub delays: HashMap<String, Duration>,
    pub quotes: HashMap<String, Quote>,
    pub sent: Mutex<Vec<(Uin, String)>>,
}

impl FakeChat {
    pub fn with_member(mut self, id: &str, card: &str, nickname: &str) -> Self {
        self.members
            .insert(id.to_string(), MemberInfo::new(card, nickname));
        self
    }

    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn with_quote(mut self, message_id: &str, quote: Quote) -> Self {
        self.quotes.insert(message_id.to_string(), quote);
        self
    }

    pub fn sent(&self) -> Vec<(Uin, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakeChat {
    async fn member_info(&self, _group_id: Uin, user_id: &str) -> Option<MemberInfo> {
        if let Some(delay) = self.delays.get(user_id) {
            tokio::time::sleep(*delay).await;
        }
        self.members.get(user_id).cloned()
    }

    async fn quoted_message(&self, message_id: &str) -> Option<Quote> {
        self.quotes.get(message_id).cloned()
    }

    fn send_group(&self, group_id: Uin, text: &str) {
        self.sent.lock().unwrap().push((group_id, text.to_string()));
    }
}

pub struct FakeGame {
    pub outcome: CommandOutcome,
    pub commands: Mutex<Vec<String>>,
    pub broadcasts: Mutex<Vec<String>>,
}

impl FakeGame {
    pub fn new(outcome: CommandOutcome) -> Self {
        Self {
            outcome,
            commands: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().unwrap().clone()
    }
}

impl Default for FakeGame {
    fn default() -> Self {
        Self::new(CommandOutcome::succeeded(""))
    }
}

#[async_trait]
impl GameServer for FakeGame {
    fn broadcast(&self, text: &str) {
        self.broadcasts.lock().unwrap().push(text.to_string());
    }

    async fn run_command(&self, command: &str) -> CommandOutcome {
        self.commands.lock().unwrap().push(command.to_string());
        self.outcome.clone()
    }
}
