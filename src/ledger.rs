use chrono::Local;

use crate::message::Message;

/// Bounded, id-ordered working memory of the conversation.
///
/// Single-writer: the orchestration loop is the only mutator; everything else
/// reads point-in-time views. The synthetic id counter is monotonic for the
/// ledger's lifetime and never rewinds, even after front-truncation.
pub struct Ledger {
    entries: Vec<Message>,
    max_len: usize,
    next_id: i64,
    bot_name: String,
}

impl Ledger {
    pub fn new(max_len: usize, bot_name: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            max_len,
            next_id: 0,
            bot_name: bot_name.into(),
        }
    }

    /// Append one entry and return its id.
    ///
    /// Entries without an id receive a synthetic one strictly greater than
    /// every id seen so far; entries with one raise the counter instead, and
    /// an id already present in the buffer is a duplicate and is dropped.
    /// A missing timestamp defaults to ingestion time, and the assistant flag
    /// is normalized when the sender matches the agent identity.
    pub fn append(&mut self, mut entry: Message) -> i64 {
        let id = match entry.id {
            Some(id) => {
                if self.entries.iter().any(|m| m.id == Some(id)) {
                    return id;
                }
                self.next_id = self.next_id.max(id);
                id
            }
            None => {
                self.next_id += 1;
                entry.id = Some(self.next_id);
                self.next_id
            }
        };

        if entry.timestamp.is_none() {
            entry.timestamp = Some(Local::now());
        }
        if entry.sender.trim().eq_ignore_ascii_case(self.bot_name.trim()) {
            entry.is_from_me = true;
        }

        self.entries.push(entry);
        if self.entries.len() > self.max_len {
            let overflow = self.entries.len() - self.max_len;
            self.entries.drain(..overflow);
        }
        id
    }

    /// Ordered read-only snapshot for downstream consumers.
    pub fn view(&self) -> &[Message] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(max_len: usize) -> Ledger {
        Ledger::new(max_len, "Meg")
    }

    #[test]
    fn synthetic_ids_are_strictly_increasing() {
        let mut ledger = ledger(10);
        let first = ledger.append(Message::new("mom@example.com", "hi"));
        let second = ledger.append(Message::new("dad@example.com", "hello"));
        assert!(second > first);
        assert_eq!(ledger.view()[0].id, Some(first));
        assert_eq!(ledger.view()[1].id, Some(second));
    }

    #[test]
    fn numeric_ids_raise_the_counter() {
        let mut ledger = ledger(10);
        let mut seeded = Message::new("mom@example.com", "hi");
        seeded.id = Some(40);
        assert_eq!(ledger.append(seeded), 40);

        let synthetic = ledger.append(Message::new("dad@example.com", "hello"));
        assert_eq!(synthetic, 41);
    }

    #[test]
    fn duplicate_numeric_ids_are_dropped() {
        let mut ledger = ledger(10);
        let mut seeded = Message::new("mom@example.com", "hi");
        seeded.id = Some(7);
        ledger.append(seeded.clone());
        ledger.append(seeded);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn counter_survives_truncation() {
        let mut ledger = ledger(2);
        for i in 0..5 {
            ledger.append(Message::new("mom@example.com", format!("msg {i}")));
        }
        assert_eq!(ledger.len(), 2);
        // Oldest evicted, most recent kept in order.
        assert_eq!(ledger.view()[0].text, "msg 3");
        assert_eq!(ledger.view()[1].text, "msg 4");
        // Ids keep climbing past evicted entries.
        assert_eq!(ledger.append(Message::new("mom@example.com", "next")), 6);
    }

    #[test]
    fn bounded_after_many_appends() {
        let mut ledger = ledger(40);
        for i in 0..100 {
            ledger.append(Message::new("mom@example.com", format!("msg {i}")));
        }
        assert_eq!(ledger.len(), 40);
        assert_eq!(ledger.view()[0].text, "msg 60");
        assert_eq!(ledger.last().unwrap().text, "msg 99");
    }

    #[test]
    fn normalizes_assistant_flag_and_timestamp() {
        let mut ledger = ledger(10);
        ledger.append(Message::new("meg", "it's me"));
        let entry = ledger.last().unwrap();
        assert!(entry.is_from_me);
        assert!(entry.timestamp.is_some());
    }
}
