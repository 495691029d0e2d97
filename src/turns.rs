use crate::message::Message;
use crate::roles::ContactDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// A maximal run of consecutive same-role messages, the atomic unit exchanged
/// with the completion provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

/// Synthetic opener inserted when a truncated history would otherwise start
/// with an assistant turn. Completion APIs require alternation starting with
/// a user turn.
pub const CONVERSATION_START_MARKER: &str = "[context] Conversation started";

/// Fold an ordered message sequence into strictly alternating
/// user/assistant turns, starting with user.
///
/// Consecutive non-assistant messages collapse into one user turn, each line
/// decorated with the sender's relationship tag. Assistant messages form
/// undecorated assistant turns; adjacent ones merge so alternation holds.
/// Reactions and empty texts are kept; arrival order is preserved within a
/// merged turn.
pub fn merge_turns(messages: &[Message], contacts: &ContactDirectory, bot_name: &str) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();
    let mut pending_user: Vec<String> = Vec::new();

    for msg in messages {
        if msg.is_assistant(bot_name) {
            if !pending_user.is_empty() {
                turns.push(Turn {
                    role: TurnRole::User,
                    content: pending_user.join("\n"),
                });
                pending_user.clear();
            }
            match turns.last_mut() {
                Some(last) if last.role == TurnRole::Assistant => {
                    last.content.push('\n');
                    last.content.push_str(&msg.text);
                }
                _ => turns.push(Turn {
                    role: TurnRole::Assistant,
                    content: msg.text.clone(),
                }),
            }
        } else {
            let (relationship, _) = contacts.resolve(&msg.sender);
            pending_user.push(format!("[{relationship}] {}", msg.text));
        }
    }

    if !pending_user.is_empty() {
        turns.push(Turn {
            role: TurnRole::User,
            content: pending_user.join("\n"),
        });
    }

    if turns.first().map(|t| t.role) == Some(TurnRole::Assistant) {
        turns.insert(
            0,
            Turn {
                role: TurnRole::User,
                content: CONVERSATION_START_MARKER.to_string(),
            },
        );
    }

    turns
}

/// Aliased one-line-per-message transcript for summary prompts. Reactions are
/// rendered as "<alias> reacted <annotation>" so the summarizer sees them.
pub fn summary_transcript(
    messages: &[Message],
    contacts: &ContactDirectory,
    bot_name: &str,
) -> String {
    let mut lines = Vec::with_capacity(messages.len());
    for msg in messages {
        let alias = if msg.is_assistant(bot_name) {
            bot_name.to_string()
        } else {
            contacts.resolve(&msg.sender).1
        };
        if msg.is_reaction {
            let shown = if msg.text.is_empty() {
                "[Reaction]"
            } else {
                msg.text.as_str()
            };
            lines.push(format!("{alias} reacted {shown}"));
        } else {
            lines.push(format!("{alias}: {}", msg.text));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "Meg";

    fn contacts() -> ContactDirectory {
        let mut dir = ContactDirectory::default();
        dir.mom.email = Some("mom@example.com".to_string());
        dir.dad.phone = Some("+15550002222".to_string());
        dir
    }

    fn mom(text: &str) -> Message {
        Message::new("mom@example.com", text)
    }

    fn dad(text: &str) -> Message {
        Message::new("+15550002222", text)
    }

    fn agent(text: &str) -> Message {
        Message::from_agent(BOT, text)
    }

    fn assert_alternating_from_user(turns: &[Turn]) {
        assert_eq!(turns.first().map(|t| t.role), Some(TurnRole::User));
        for pair in turns.windows(2) {
            assert_ne!(pair[0].role, pair[1].role);
        }
    }

    #[test]
    fn consecutive_non_assistant_messages_merge_into_one_user_turn() {
        let messages = vec![dad("在吗?"), mom("对啊"), agent("在")];
        let turns = merge_turns(&messages, &contacts(), BOT);

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[0].content, "[dad] 在吗?\n[mom] 对啊");
        assert_eq!(turns[1].role, TurnRole::Assistant);
        assert_eq!(turns[1].content, "在");
    }

    #[test]
    fn leading_assistant_turn_gets_synthetic_user_opener() {
        let messages = vec![agent("here first"), mom("oh hi")];
        let turns = merge_turns(&messages, &contacts(), BOT);

        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].content, CONVERSATION_START_MARKER);
        assert_alternating_from_user(&turns);
    }

    #[test]
    fn output_always_alternates_starting_with_user() {
        let messages = vec![
            mom("a"),
            agent("b"),
            dad("c"),
            mom("d"),
            agent("e"),
            agent("f"),
            dad("g"),
        ];
        let turns = merge_turns(&messages, &contacts(), BOT);
        assert_alternating_from_user(&turns);
        // e and f are adjacent assistant messages and share one turn.
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[3].content, "e\nf");
    }

    #[test]
    fn flattening_turns_reproduces_original_texts_in_order() {
        let messages = vec![
            agent("opener"),
            mom("one"),
            dad("two"),
            agent("three"),
            mom(""),
            mom("[Reacted ❤️]"),
        ];
        let turns = merge_turns(&messages, &contacts(), BOT);

        let mut flattened = Vec::new();
        for turn in &turns {
            match turn.role {
                TurnRole::Assistant => {
                    flattened.extend(turn.content.split('\n').map(str::to_string))
                }
                TurnRole::User => {
                    if turn.content == CONVERSATION_START_MARKER {
                        continue;
                    }
                    for line in turn.content.split('\n') {
                        // Strip the "[role] " decoration.
                        let stripped = line
                            .split_once("] ")
                            .map(|(_, rest)| rest)
                            .unwrap_or(line)
                            .to_string();
                        flattened.push(stripped);
                    }
                }
            }
        }

        let originals: Vec<String> = messages.iter().map(|m| m.text.clone()).collect();
        assert_eq!(flattened, originals);
    }

    #[test]
    fn empty_texts_and_reactions_are_kept() {
        let mut reaction = mom("[Reacted 👍]");
        reaction.is_reaction = true;
        let messages = vec![mom(""), reaction];
        let turns = merge_turns(&messages, &contacts(), BOT);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "[mom] \n[mom] [Reacted 👍]");
    }

    #[test]
    fn summary_transcript_renders_reactions_distinctly() {
        let mut reaction = dad("[Reacted ❤️]");
        reaction.is_reaction = true;
        let messages = vec![mom("看看这个"), reaction, agent("收到")];
        let transcript = summary_transcript(&messages, &contacts(), BOT);
        assert_eq!(
            transcript,
            "mom: 看看这个\ndad reacted [Reacted ❤️]\nMeg: 收到"
        );
    }
}
