//! Minecraft server log line parsing.
//!
//! Handles the vanilla layout (`[12:00:00] [Server thread/INFO]: ...`), the
//! Paper/Spigot layout (`[12:00:00 INFO]: ...`) and Forge's extra logger tag
//! (`[Server thread/INFO] [minecraft/DedicatedServer]: ...`).

use fancy_regex::Regex;

use crate::common::messages::GameEvent;

/// Message starts that mark a vanilla death message, after the player name.
const DEATH_PHRASES: &[&str] = &[
    "was slain by",
    "was shot by",
    "was fireballed by",
    "was pummeled by",
    "was killed",
    "was blown up by",
    "was squashed by",
    "was squished",
    "was impaled",
    "was stung to death",
    "was skewered by",
    "was obliterated by",
    "was frozen to death",
    "was struck by lightning",
    "was pricked to death",
    "was poked to death",
    "was doomed to fall",
    "was burnt to a crisp",
    "was roasted in dragon",
    "was blown from a high place",
    "was sniped by",
    "was spitballed by",
    "was speared by",
    "was smashed by",
    "was too soft for this world",
    "walked into",
    "drowned",
    "died",
    "blew up",
    "hit the ground too hard",
    "fell ",
    "went up in flames",
    "went off with a bang",
    "burned to death",
    "tried to swim in lava",
    "suffocated in a wall",
    "was squeezed too much",
    "starved to death",
    "experienced kinetic energy",
    "withered away",
    "froze to death",
    "discovered the floor was lava",
    "didn't want to live in the same world as",
    "left the confines of this world",
];

/// Killers that are not entities.
const NON_ENTITY_SOURCES: &[&str] = &["lightning", "magic", "even more magic"];

/// Parser for server log lines.
pub struct LogParser {
    /// Strips the timestamp/thread prefix of an INFO line.
    line_pattern: Regex,
    chat_pattern: Regex,
    pre_join_pattern: Regex,
    join_pattern: Regex,
    leave_pattern: Regex,
    /// Picks the last "by X" / "fighting X" / "escape X" of a death message.
    source_pattern: Regex,
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser {
    pub fn new() -> Self {
        Self {
            line_pattern: Regex::new(r"^(?:\[[^\]]*\] )?\[[^\]]*INFO\](?: \[[^\]]*\])?: (.*)$")
                .unwrap(),
            chat_pattern: Regex::new(r"^(?:\[Not Secure\] )?<([^>\s]+)> (.*)$").unwrap(),
            pre_join_pattern: Regex::new(r"^UUID of player (\S+) is ").unwrap(),
            join_pattern: Regex::new(r"^(\S+) joined the game$").unwrap(),
            leave_pattern: Regex::new(r"^(\S+) left the game$").unwrap(),
            source_pattern: Regex::new(r"^.*\b(?:by|fighting|escape) (.+?)(?: using .+)?$")
                .unwrap(),
        }
    }

    /// Parse one log line. Lines that are not game events yield `None`.
    pub fn parse(&self, line: &str) -> Option<GameEvent> {
        let message = self.capture(&self.line_pattern, line)?.remove(0);
        self.parse_message(&message)
    }

    /// Parse the message part of a line, without its log prefix.
    pub fn parse_message(&self, message: &str) -> Option<GameEvent> {
        if let Some(mut caps) = self.capture(&self.chat_pattern, message) {
            let text = caps.pop()?;
            let player = caps.pop()?;
            return Some(GameEvent::Chat {
                player,
                message: text,
            });
        }
        if let Some(mut caps) = self.capture(&self.pre_join_pattern, message) {
            return Some(GameEvent::PreJoin {
                player: caps.remove(0),
            });
        }
        if let Some(mut caps) = self.capture(&self.join_pattern, message) {
            return Some(GameEvent::Join {
                player: caps.remove(0),
            });
        }
        if let Some(mut caps) = self.capture(&self.leave_pattern, message) {
            return Some(GameEvent::Leave {
                player: caps.remove(0),
            });
        }

        self.parse_death(message)
    }

    fn parse_death(&self, message: &str) -> Option<GameEvent> {
        let (player, rest) = message.split_once(' ')?;
        if player.is_empty() || !DEATH_PHRASES.iter().any(|p| rest.starts_with(p)) {
            return None;
        }

        let source = self
            .capture(&self.source_pattern, rest)
            .and_then(|mut caps| caps.pop())
            .filter(|s| !NON_ENTITY_SOURCES.contains(&s.as_str()));

        Some(GameEvent::Death {
            player: player.to_string(),
            source,
            message: message.to_string(),
        })
    }

    /// Capture groups 1.. of the first match, as owned strings.
    fn capture(&self, pattern: &Regex, text: &str) -> Option<Vec<String>> {
        let caps = pattern.captures(text).ok()??;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }
}
