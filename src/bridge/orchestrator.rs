//! Bridge orchestrator that ties the chat group and the game server together.
//!
//! Manages the bidirectional message flow: command gating, message
//! transformation and template rendering. Delivery goes through the ports
//! and is never retried here.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::bridge::formatter::{FormatContext, MessageFormatter};
use crate::bridge::gate::{format_outcome, strip_color_codes, CommandGate, GateDecision, PERMISSION_DENIED};
use crate::bridge::ports::{ChatPlatform, GameServer};
use crate::bridge::transform::{RenderContext, Transformer};
use crate::common::messages::{ChatEvent, GameEvent, GroupMessage, PokeNotice};
use crate::common::segment::plain_text;
use crate::common::types::Uin;
use crate::config::types::{Config, TemplatesConfig};

/// Command used to answer status queries.
const STATUS_COMMAND: &str = "list";

/// Formatters for each relayed event. `None` disables that relay.
#[derive(Debug, Clone, Default)]
pub struct EventTemplates {
    pub player_chat: Option<MessageFormatter>,
    pub group_chat: Option<MessageFormatter>,
    pub player_pre_join: Option<MessageFormatter>,
    pub player_join: Option<MessageFormatter>,
    pub player_left: Option<MessageFormatter>,
    pub player_die: Option<MessageFormatter>,
}

impl EventTemplates {
    pub fn from_config(templates: &TemplatesConfig) -> Self {
        Self {
            player_chat: MessageFormatter::from_template(templates.player_chat.as_deref()),
            group_chat: MessageFormatter::from_template(templates.group_chat.as_deref()),
            player_pre_join: MessageFormatter::from_template(templates.player_pre_join.as_deref()),
            player_join: MessageFormatter::from_template(templates.player_join.as_deref()),
            player_left: MessageFormatter::from_template(templates.player_left.as_deref()),
            player_die: MessageFormatter::from_template(templates.player_die.as_deref()),
        }
    }
}

/// The main bridge that orchestrates message flow.
pub struct Bridge {
    transformer: Transformer,
    gate: CommandGate,
    templates: EventTemplates,
    enable_groups: Vec<Uin>,
    cmd_status: String,
    poke_status: bool,
    chat: Arc<dyn ChatPlatform>,
    game: Arc<dyn GameServer>,
}

impl Bridge {
    /// Create a new bridge from configuration and host adapters.
    pub fn new(config: &Config, chat: Arc<dyn ChatPlatform>, game: Arc<dyn GameServer>) -> Self {
        let bridge = &config.bridge;

        Self {
            transformer: Transformer::new(
                bridge.special_attr_prefix.clone(),
                bridge.special_attr_suffix.clone(),
            ),
            gate: CommandGate::new(
                bridge.cmd_prefix.clone(),
                bridge.superusers.clone(),
                &bridge.allow_cmd,
            ),
            templates: EventTemplates::from_config(&config.templates),
            enable_groups: bridge.enable_groups.clone(),
            cmd_status: bridge.cmd_status.clone(),
            poke_status: bridge.poke_status,
            chat,
            game,
        }
    }

    /// Whether the bridge handles traffic from this group.
    pub fn is_enabled_group(&self, group_id: Uin) -> bool {
        self.enable_groups.contains(&group_id)
    }

    /// Dispatch an event from the chat platform.
    pub async fn handle_chat_event(&self, event: ChatEvent) {
        match event {
            ChatEvent::GroupMessage(msg) => self.handle_group_message(&msg).await,
            ChatEvent::Poke(poke) => self.handle_poke(&poke).await,
        }
    }

    /// Handle a group message: command gate first, then relay to the game.
    pub async fn handle_group_message(&self, msg: &GroupMessage) {
        if !self.is_enabled_group(msg.group_id) {
            debug!(group_id = msg.group_id, "Ignoring message from disabled group");
            return;
        }

        let text = plain_text(&msg.segments);

        match self.gate.check(&text, msg.sender.user_id) {
            GateDecision::Execute(command) => self.execute_command(msg.group_id, &command).await,
            GateDecision::Deny(command) => {
                info!(
                    user_id = msg.sender.user_id,
                    group_id = msg.group_id,
                    "Denied command: {}",
                    command
                );
                self.chat.send_group(msg.group_id, PERMISSION_DENIED);
            }
            GateDecision::Ignore => {
                if !self.cmd_status.is_empty() && text.trim() == self.cmd_status {
                    self.reply_status(msg.group_id).await;
                }
            }
        }

        if let Some(rendered) = self.render_group_message(msg).await {
            info!(group_id = msg.group_id, "Group -> Game: {}", rendered);
            self.game.broadcast(&rendered);
        }
    }

    /// Handle a poke: answer with server status when the bot itself is poked.
    pub async fn handle_poke(&self, poke: &PokeNotice) {
        if !self.poke_status || !self.is_enabled_group(poke.group_id) {
            return;
        }
        if poke.target_id != poke.self_id {
            return;
        }

        debug!(user_id = poke.user_id, group_id = poke.group_id, "Poked, replying with status");
        self.reply_status(poke.group_id).await;
    }

    /// Render a group message with the group chat template.
    ///
    /// Returns `None` when the relay is disabled.
    pub async fn render_group_message(&self, msg: &GroupMessage) -> Option<String> {
        let formatter = self.templates.group_chat.as_ref()?;

        let quote = match msg.reply_id() {
            Some(id) => self.chat.quoted_message(&id).await,
            None => None,
        };
        let body = msg.body_without_reply();

        let ctx = RenderContext::new(msg.group_id, self.chat.as_ref()).with_quote(quote.as_ref());
        let mut message = self.transformer.transform(&body, &ctx).await;
        if quote.is_some() {
            let reply = self.transformer.reply_text(&ctx).await;
            message = format!("{} {}", self.transformer.wrap(&reply), message);
        }

        let sender = &msg.sender;
        let name = [&sender.nickname, &sender.card]
            .into_iter()
            .find(|n| !n.is_empty())
            .cloned()
            .unwrap_or_else(|| "未知".to_string());

        let session = json!({
            "platform": "onebot",
            "user_id": sender.user_id.to_string(),
            "channel_id": msg.group_id.to_string(),
            "guild_id": msg.group_id.to_string(),
            "message_id": msg.message_id.to_string(),
            "self_id": msg.self_id.to_string(),
            "content": msg.raw,
            "author": {
                "user_id": sender.user_id.to_string(),
                "username": sender.nickname,
                "nickname": sender.card,
            },
        });

        let ctx = FormatContext::new()
            .with("session", session)
            .with("message", message)
            .with("name", name);
        Some(formatter.format(&ctx))
    }

    /// Handle a game event: render and broadcast to every enabled group.
    pub fn handle_game_event(&self, event: &GameEvent) {
        match self.render_game_event(event) {
            Some(rendered) => {
                info!(event = event.kind(), "Game -> Group: {}", rendered);
                self.chat.broadcast(&self.enable_groups, &rendered);
            }
            None => debug!(event = event.kind(), "No template for game event"),
        }
    }

    /// Render a game event with its template, `None` when disabled.
    pub fn render_game_event(&self, event: &GameEvent) -> Option<String> {
        let (formatter, ctx) = match event {
            GameEvent::Chat { player, message } => (
                self.templates.player_chat.as_ref()?,
                FormatContext::new()
                    .with("player", player.as_str())
                    .with("message", message.as_str()),
            ),
            GameEvent::PreJoin { player } => (
                self.templates.player_pre_join.as_ref()?,
                FormatContext::new().with("player", player.as_str()),
            ),
            GameEvent::Join { player } => (
                self.templates.player_join.as_ref()?,
                FormatContext::new().with("player", player.as_str()),
            ),
            GameEvent::Leave { player } => (
                self.templates.player_left.as_ref()?,
                FormatContext::new().with("player", player.as_str()),
            ),
            GameEvent::Death {
                player,
                source,
                message,
            } => (
                self.templates.player_die.as_ref()?,
                FormatContext::new()
                    .with("player", player.as_str())
                    .with("source", source.clone().unwrap_or_default())
                    .with("message", message.as_str()),
            ),
        };

        Some(formatter.format(&ctx))
    }

    async fn execute_command(&self, group_id: Uin, command: &str) {
        let outcome = self.game.run_command(command).await;
        let output = strip_color_codes(&outcome.output);

        if outcome.success {
            info!(group_id, command, "Command succeeded\n{}", output);
        } else {
            warn!(group_id, command, "Command failed\n{}", output);
        }

        self.chat.send_group(group_id, &format_outcome(&outcome));
    }

    async fn reply_status(&self, group_id: Uin) {
        let outcome = self.game.run_command(STATUS_COMMAND).await;
        let output = strip_color_codes(&outcome.output);
        if !outcome.success {
            warn!(group_id, "Status query failed: {}", output);
        }
        self.chat.send_group(group_id, &output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::fakes::{FakeChat, FakeGame};
    use crate::common::messages::{Quote, Sender};
    use crate::common::segment::Segment;
    use crate::common::types::CommandOutcome;
    use crate::config::parser::load_config_str;

    const GROUP: Uin = 123456;

    fn make_test_config(templates: &str) -> Config {
        load_config_str(&format!(
            r#"
            onebot {{ url = "ws://127.0.0.1:6700" }}
            rcon {{ host = "127.0.0.1", password = "pw" }}
            bridge {{
                superusers = [10001]
                enable_groups = [{GROUP}]
                allow_cmd = ["^list$"]
                special_attr_prefix = "["
                special_attr_suffix = "]"
            }}
            templates {{ {templates} }}
            "#
        ))
        .unwrap()
    }

    fn make_bridge(templates: &str, chat: Arc<FakeChat>, game: Arc<FakeGame>) -> Bridge {
        Bridge::new(&make_test_config(templates), chat, game)
    }

    fn message(user_id: Uin, segments: Vec<Segment>) -> GroupMessage {
        GroupMessage {
            message_id: 1,
            group_id: GROUP,
            self_id: 999,
            sender: Sender {
                user_id,
                nickname: "Nick".to_string(),
                card: "Card".to_string(),
            },
            segments,
            raw: String::new(),
        }
    }

    #[tokio::test]
    async fn test_superuser_command_runs() {
        let chat = Arc::new(FakeChat::default());
        let game = Arc::new(FakeGame::new(CommandOutcome::succeeded("§aStopping§r")));
        let bridge = make_bridge("", chat.clone(), game.clone());

        bridge
            .handle_group_message(&message(10001, vec![Segment::text("/stop")]))
            .await;

        assert_eq!(game.commands(), vec!["stop"]);
        assert_eq!(chat.sent(), vec![(GROUP, "执行成功\nStopping".to_string())]);
    }

    #[tokio::test]
    async fn test_unauthorized_command_denied() {
        let chat = Arc::new(FakeChat::default());
        let game = Arc::new(FakeGame::default());
        let bridge = make_bridge("", chat.clone(), game.clone());

        bridge
            .handle_group_message(&message(2, vec![Segment::text("/stop")]))
            .await;

        assert!(game.commands().is_empty());
        assert_eq!(chat.sent(), vec![(GROUP, PERMISSION_DENIED.to_string())]);
    }

    #[tokio::test]
    async fn test_allowed_command_failure_reported() {
        let chat = Arc::new(FakeChat::default());
        let game = Arc::new(FakeGame::new(CommandOutcome::failed("Unknown command")));
        let bridge = make_bridge("", chat.clone(), game.clone());

        bridge
            .handle_group_message(&message(2, vec![Segment::text("/list")]))
            .await;

        assert_eq!(game.commands(), vec!["list"]);
        assert_eq!(chat.sent(), vec![(GROUP, "执行失败\nUnknown command".to_string())]);
    }

    #[tokio::test]
    async fn test_command_and_relay_both_fire() {
        let chat = Arc::new(FakeChat::default());
        let game = Arc::new(FakeGame::default());
        let bridge = make_bridge(r#"group_chat = "<{{name}}> {{{message}}}""#, chat.clone(), game.clone());

        bridge
            .handle_group_message(&message(10001, vec![Segment::text("/list")]))
            .await;

        assert_eq!(game.commands(), vec!["list"]);
        assert_eq!(game.broadcasts(), vec!["<Nick> /list"]);
    }

    #[tokio::test]
    async fn test_disabled_group_ignored() {
        let chat = Arc::new(FakeChat::default());
        let game = Arc::new(FakeGame::default());
        let bridge = make_bridge(r#"group_chat = "{{{message}}}""#, chat.clone(), game.clone());

        let mut msg = message(10001, vec![Segment::text("/stop")]);
        msg.group_id = 42;
        bridge.handle_group_message(&msg).await;

        assert!(game.commands().is_empty());
        assert!(game.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_group_relay_transforms_segments() {
        let chat = Arc::new(FakeChat::default().with_member("20", "", "Bob"));
        let game = Arc::new(FakeGame::default());
        let bridge = make_bridge(r#"group_chat = "[{{name}}] {{{message}}}""#, chat.clone(), game.clone());

        let msg = message(
            5,
            vec![
                Segment::text("look"),
                Segment::with_attrs("image", &[("subType", "0")]),
                Segment::with_attrs("at", &[("qq", "20")]),
            ],
        );
        bridge.handle_group_message(&msg).await;

        assert_eq!(game.broadcasts(), vec!["[Nick] look[图片][ @Bob]"]);
    }

    #[tokio::test]
    async fn test_group_relay_with_quote() {
        let quote = Quote {
            author_id: Some(30),
            segments: vec![Segment::text("old "), Segment::with_attrs("at", &[("qq", "20")])],
        };
        let chat = Arc::new(
            FakeChat::default()
                .with_member("20", "", "Bob")
                .with_member("30", "Q", "")
                .with_quote("77", quote),
        );
        let game = Arc::new(FakeGame::default());
        let bridge = make_bridge(r#"group_chat = "{{{message}}}""#, chat.clone(), game.clone());

        let msg = message(
            5,
            vec![
                Segment::with_attrs("reply", &[("id", "77")]),
                Segment::text("agreed"),
            ],
        );
        let rendered = bridge.render_group_message(&msg).await.unwrap();

        assert_eq!(rendered, "[回复 @Q： §rold [ @Bob]] agreed");
    }

    #[tokio::test]
    async fn test_group_relay_name_fallbacks() {
        let chat = Arc::new(FakeChat::default());
        let game = Arc::new(FakeGame::default());
        let bridge = make_bridge(r#"group_chat = "{{name}}|{{session.user_id}}""#, chat, game);

        let mut msg = message(5, vec![Segment::text("hi")]);
        msg.sender.nickname.clear();
        assert_eq!(bridge.render_group_message(&msg).await.unwrap(), "Card|5");

        msg.sender.card.clear();
        assert_eq!(bridge.render_group_message(&msg).await.unwrap(), "未知|5");
    }

    #[tokio::test]
    async fn test_status_keyword() {
        let chat = Arc::new(FakeChat::default());
        let game = Arc::new(FakeGame::new(CommandOutcome::succeeded("There are §c2§r players")));
        let bridge = make_bridge("", chat.clone(), game.clone());

        bridge
            .handle_group_message(&message(5, vec![Segment::text("查询")]))
            .await;

        assert_eq!(game.commands(), vec![STATUS_COMMAND]);
        assert_eq!(chat.sent(), vec![(GROUP, "There are 2 players".to_string())]);
    }

    #[tokio::test]
    async fn test_poke_status_only_when_bot_poked() {
        let chat = Arc::new(FakeChat::default());
        let game = Arc::new(FakeGame::new(CommandOutcome::succeeded("0 online")));
        let bridge = make_bridge("", chat.clone(), game.clone());

        let mut poke = PokeNotice {
            group_id: GROUP,
            user_id: 5,
            target_id: 6,
            self_id: 999,
        };
        bridge.handle_poke(&poke).await;
        assert!(chat.sent().is_empty());

        poke.target_id = 999;
        bridge.handle_poke(&poke).await;
        assert_eq!(chat.sent(), vec![(GROUP, "0 online".to_string())]);
    }

    #[test]
    fn test_death_event_rendering() {
        let bridge = make_bridge(
            r#"player_die = "{{player}} died to {{source}}""#,
            Arc::new(FakeChat::default()),
            Arc::new(FakeGame::default()),
        );
        let event = GameEvent::Death {
            player: "Alice".to_string(),
            source: Some("Creeper".to_string()),
            message: "Alice was blown up by Creeper".to_string(),
        };

        assert_eq!(
            bridge.render_game_event(&event).as_deref(),
            Some("Alice died to Creeper")
        );
    }

    #[test]
    fn test_game_event_without_template_is_silent() {
        let chat = Arc::new(FakeChat::default());
        let bridge = make_bridge(
            r#"player_join = "{{player}} joined""#,
            chat.clone(),
            Arc::new(FakeGame::default()),
        );

        bridge.handle_game_event(&GameEvent::Leave {
            player: "Alice".to_string(),
        });
        assert!(chat.sent().is_empty());

        bridge.handle_game_event(&GameEvent::Join {
            player: "Alice".to_string(),
        });
        assert_eq!(chat.sent(), vec![(GROUP, "Alice joined".to_string())]);
    }

    #[test]
    fn test_all_game_event_templates() {
        let bridge = make_bridge(
            r#"
            player_chat = "<{{player}}> {{message}}"
            player_pre_join = "{{player}} connecting"
            player_left = "{{player}} left"
            "#,
            Arc::new(FakeChat::default()),
            Arc::new(FakeGame::default()),
        );

        let chat = GameEvent::Chat {
            player: "Steve".to_string(),
            message: "hi".to_string(),
        };
        let pre_join = GameEvent::PreJoin {
            player: "Steve".to_string(),
        };
        let leave = GameEvent::Leave {
            player: "Steve".to_string(),
        };

        assert_eq!(bridge.render_game_event(&chat).as_deref(), Some("<Steve> hi"));
        assert_eq!(bridge.render_game_event(&pre_join).as_deref(), Some("Steve connecting"));
        assert_eq!(bridge.render_game_event(&leave).as_deref(), Some("Steve left"));
    }

    #[test]
    fn test_empty_template_disables_relay() {
        let bridge = make_bridge(
            r#"player_join = """#,
            Arc::new(FakeChat::default()),
            Arc::new(FakeGame::default()),
        );
        let event = GameEvent::Join {
            player: "Alice".to_string(),
        };
        assert!(bridge.render_game_event(&event).is_none());
    }
}
