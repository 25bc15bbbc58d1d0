//! Shared types used across the application.

use serde::Deserialize;

/// QQ user / group id.
pub type Uin = i64;

/// Group member profile as returned by the chat platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberInfo {
    /// Group-specific card name.
    #[serde(default)]
    pub card: String,
    #[serde(default)]
    pub nickname: String,
}

impl MemberInfo {
    pub fn new(card: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            card: card.into(),
            nickname: nickname.into(),
        }
    }
}

/// Resolve the name shown for a member: card, then nickname, then the raw id.
pub fn display_name(info: Option<&MemberInfo>, id: &str) -> String {
    info.and_then(|m| {
        if !m.card.is_empty() {
            Some(m.card.clone())
        } else if !m.nickname.is_empty() {
            Some(m.nickname.clone())
        } else {
            None
        }
    })
    .unwrap_or_else(|| id.to_string())
}

/// Result of running a command on the game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: String,
}

impl CommandOutcome {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nickname_when_card_empty() {
        let info = MemberInfo::new("", "Bob");
        assert_eq!(display_name(Some(&info), "1"), "Bob");
    }

    #[test]
    fn test_card_preferred() {
        let info = MemberInfo::new("Ace", "Bob");
        assert_eq!(display_name(Some(&info), "1"), "Ace");
    }

    #[test]
    fn test_raw_id_without_info() {
        assert_eq!(display_name(None, "10001"), "10001");
        let blank = MemberInfo::default();
        assert_eq!(display_name(Some(&blank), "10001"), "10001");
    }
}
