//! Command gate for server commands sent from chat.
//!
//! A group message whose plain text starts with the command prefix is a
//! command request. Superusers may run anything; everyone else only
//! commands matching one of the allow-list regexes.

use std::sync::LazyLock;

use fancy_regex::Regex;
use tracing::warn;

use crate::common::types::{CommandOutcome, Uin};

/// Reply sent when a sender may not run the requested command.
pub const PERMISSION_DENIED: &str = "权限不足";

/// Minecraft formatting codes: `§` followed by a colour or style letter.
static COLOR_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("§[0123456789abcdefglonmkr]").expect("color code pattern is valid")
});

/// Outcome of checking a message against the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Not a command.
    Ignore,
    /// Run this command.
    Execute(String),
    /// A command the sender may not run.
    Deny(String),
}

/// Command gate built from config.
#[derive(Debug, Clone)]
pub struct CommandGate {
    prefix: String,
    superusers: Vec<Uin>,
    allow_patterns: Vec<CompiledPattern>,
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl CommandGate {
    /// Create a gate. Invalid allow-list patterns are logged and skipped.
    pub fn new(prefix: impl Into<String>, superusers: Vec<Uin>, allow_cmd: &[String]) -> Self {
        Self {
            prefix: prefix.into(),
            superusers,
            allow_patterns: compile_patterns(allow_cmd),
        }
    }

    /// Decide what to do with a message's plain text.
    ///
    /// The prefix is removed once, from the front only.
    pub fn check(&self, text: &str, sender: Uin) -> GateDecision {
        if self.prefix.is_empty() {
            return GateDecision::Ignore;
        }
        let Some(command) = text.strip_prefix(self.prefix.as_str()) else {
            return GateDecision::Ignore;
        };

        if self.superusers.contains(&sender) || self.is_allowed(command) {
            GateDecision::Execute(command.to_string())
        } else {
            GateDecision::Deny(command.to_string())
        }
    }

    /// True if any allow-list pattern matches somewhere in `command`.
    pub fn is_allowed(&self, command: &str) -> bool {
        self.allow_patterns.iter().any(|p| {
            p.regex.is_match(command).unwrap_or_else(|e| {
                warn!("Regex match error for pattern '{}': {}", p.original, e);
                false
            })
        })
    }
}

/// Compile a list of regex pattern strings, skipping invalid ones.
fn compile_patterns(patterns: &[String]) -> Vec<CompiledPattern> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern.clone(),
                regex,
            }),
            Err(e) => {
                warn!("Invalid allow_cmd regex pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

/// Remove Minecraft formatting codes from text.
pub fn strip_color_codes(text: &str) -> String {
    COLOR_CODE.replace_all(text, "").to_string()
}

/// Chat reply describing a command result.
pub fn format_outcome(outcome: &CommandOutcome) -> String {
    let status = if outcome.success { "成功" } else { "失败" };
    format!("执行{}\n{}", status, strip_color_codes(&outcome.output))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> CommandGate {
        CommandGate::new("/", vec![10001], &["^list$".to_string(), "tps".to_string()])
    }

    #[test]
    fn test_non_command_ignored() {
        assert_eq!(gate().check("hello /list", 1), GateDecision::Ignore);
    }

    #[test]
    fn test_superuser_bypasses_allow_list() {
        assert_eq!(
            gate().check("/stop", 10001),
            GateDecision::Execute("stop".to_string())
        );
    }

    #[test]
    fn test_allow_list_match() {
        assert_eq!(gate().check("/list", 2), GateDecision::Execute("list".to_string()));
        // Unanchored patterns match anywhere.
        assert_eq!(
            gate().check("/forge tps", 2),
            GateDecision::Execute("forge tps".to_string())
        );
    }

    #[test]
    fn test_denied_when_nothing_matches() {
        assert_eq!(gate().check("/stop", 2), GateDecision::Deny("stop".to_string()));
        // Anchored pattern does not match a longer command.
        assert_eq!(gate().check("/list uuids", 2), GateDecision::Deny("list uuids".to_string()));
    }

    #[test]
    fn test_prefix_stripped_once() {
        let gate = CommandGate::new("/", vec![1], &[]);
        assert_eq!(
            gate.check("//say a/b", 1),
            GateDecision::Execute("/say a/b".to_string())
        );
    }

    #[test]
    fn test_multichar_prefix() {
        let gate = CommandGate::new("mc ", vec![1], &[]);
        assert_eq!(gate.check("mc list", 1), GateDecision::Execute("list".to_string()));
        assert_eq!(gate.check("mclist", 1), GateDecision::Ignore);
    }

    #[test]
    fn test_invalid_pattern_skipped() {
        let gate = CommandGate::new("/", vec![], &["[invalid".to_string(), "^say ".to_string()]);
        assert!(gate.is_allowed("say hi"));
        assert!(!gate.is_allowed("op me"));
    }

    #[test]
    fn test_strip_color_codes() {
        assert_eq!(strip_color_codes("§1Hello§r"), "Hello");
        assert_eq!(strip_color_codes("§l§aBold green§r and §z"), "Bold green and §z");
    }

    #[test]
    fn test_format_outcome() {
        assert_eq!(
            format_outcome(&CommandOutcome::succeeded("§6There are 0 players§r")),
            "执行成功\nThere are 0 players"
        );
        assert_eq!(
            format_outcome(&CommandOutcome::failed("Unknown command")),
            "执行失败\nUnknown command"
        );
    }
}
