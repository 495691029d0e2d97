use crate::message::Message;

/// The unanswered backlog: the maximal trailing run of non-assistant entries
/// after the most recent assistant entry. An assistant message marks
/// everything before it as already addressed, so the suffix starts right
/// after it (or at the front of the ledger if the agent never spoke).
///
/// An empty result is a normal signal that there is nothing to catch up on.
pub fn pending_backlog<'a>(entries: &'a [Message], bot_name: &str) -> &'a [Message] {
    let start = entries
        .iter()
        .rposition(|m| m.is_assistant(bot_name))
        .map(|i| i + 1)
        .unwrap_or(0);
    &entries[start..]
}
