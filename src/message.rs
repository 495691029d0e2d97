use chrono::{DateTime, Local};

/// A single raw chat message, as delivered by a message source or authored
/// by the agent itself.
///
/// `id` is the sole ordering key when present; the ledger assigns a synthetic
/// one otherwise. `timestamp` is advisory only.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Option<i64>,
    pub sender: String,
    pub text: String,
    pub timestamp: Option<DateTime<Local>>,
    pub is_from_me: bool,
    /// Tapback/reaction events. Rendered distinctly but still ordered in the
    /// ledger; dropping them would lose context the summarizer needs.
    pub is_reaction: bool,
}

impl Message {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: None,
            sender: sender.into(),
            text: text.into(),
            timestamp: None,
            is_from_me: false,
            is_reaction: false,
        }
    }

    /// A message authored by the agent under its configured name.
    pub fn from_agent(bot_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            is_from_me: true,
            ..Self::new(bot_name, text)
        }
    }

    /// Whether this message counts as the agent's own turn, either by the
    /// explicit flag or because the sender matches the agent identity.
    pub fn is_assistant(&self, bot_name: &str) -> bool {
        self.is_from_me || self.sender.trim().eq_ignore_ascii_case(bot_name.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_detection_matches_flag_or_name() {
        let flagged = Message {
            is_from_me: true,
            ..Message::new("someone", "hi")
        };
        assert!(flagged.is_assistant("Meg"));

        let by_name = Message::new("  meg ", "hi");
        assert!(by_name.is_assistant("Meg"));

        let other = Message::new("mom@example.com", "hi");
        assert!(!other.is_assistant("Meg"));
    }
}
