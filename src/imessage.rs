//! Message transport collaborators: reading the macOS Messages database and
//! sending through AppleScript. Reactions are decoded into bracketed
//! annotations so they survive into the ledger.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::message::Message;

/// Where new thread messages come from. The new-message cursor is owned by
/// the source, not the orchestrator.
pub trait MessageSource {
    /// The most recent `count` messages in chronological order.
    fn recent(&mut self, count: usize) -> Result<Vec<Message>>;

    /// Messages that arrived since the previous call. The first call only
    /// primes the cursor and returns nothing.
    fn new_since_last(&mut self) -> Result<Vec<Message>>;
}

/// Outgoing transport. Best-effort: the boolean is the only delivery signal.
pub trait MessageSink {
    fn send(&mut self, text: &str) -> bool;
}

/// How far back each new-message poll scans. New arrivals beyond this depth
/// within one poll interval would be missed; at family-chat volume that does
/// not happen.
const NEW_MESSAGE_SCAN_DEPTH: usize = 20;

const RECENT_MESSAGES_SQL: &str = "\
    SELECT
        message.ROWID,
        handle.id,
        message.text,
        datetime(
            message.date / 1000000000 + strftime('%s', '2001-01-01'),
            'unixepoch',
            'localtime'
        ),
        message.is_from_me,
        message.associated_message_type
    FROM message
    JOIN chat_message_join ON message.ROWID = chat_message_join.message_id
    LEFT JOIN handle ON message.handle_id = handle.ROWID
    WHERE chat_message_join.chat_id = ?1
    ORDER BY message.date DESC
    LIMIT ?2";

/// Read-only view of one chat in the Messages database
/// (`~/Library/Messages/chat.db`; the terminal needs Full Disk Access).
pub struct ChatDbSource {
    db_path: PathBuf,
    chat_name: String,
    display_name: String,
    last_message_id: Option<i64>,
}

struct RawRow {
    id: i64,
    sender: Option<String>,
    text: Option<String>,
    time: Option<String>,
    is_from_me: bool,
    associated_type: Option<i64>,
}

impl ChatDbSource {
    pub fn new(
        db_path: impl Into<PathBuf>,
        chat_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            chat_name: chat_name.into(),
            display_name: display_name.into(),
            last_message_id: None,
        }
    }

    fn open(&self) -> Result<Connection> {
        Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| {
                format!(
                    "failed to open Messages database at {}",
                    self.db_path.display()
                )
            })
    }

    fn chat_rowid(&self, conn: &Connection) -> Result<i64> {
        conn.query_row(
            "SELECT ROWID FROM chat WHERE display_name = ?1 OR chat_identifier = ?1 LIMIT 1",
            params![self.chat_name],
            |row| row.get(0),
        )
        .optional()?
        .with_context(|| {
            format!(
                "chat '{}' not found in {}",
                self.chat_name,
                self.db_path.display()
            )
        })
    }

    fn query_recent(&self, count: usize) -> Result<Vec<Message>> {
        let conn = self.open()?;
        let chat_id = self.chat_rowid(&conn)?;

        let mut stmt = conn.prepare(RECENT_MESSAGES_SQL)?;
        let rows = stmt.query_map(params![chat_id, count as i64], |row| {
            Ok(RawRow {
                id: row.get(0)?,
                sender: row.get(1)?,
                text: row.get(2)?,
                time: row.get(3)?,
                is_from_me: row.get::<_, i64>(4)? != 0,
                associated_type: row.get(5)?,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            if let Some(message) = self.row_to_message(row?) {
                messages.push(message);
            }
        }
        // The query walks newest-first; callers expect chronological order.
        messages.reverse();
        Ok(messages)
    }

    fn row_to_message(&self, raw: RawRow) -> Option<Message> {
        let is_reaction = matches!(
            raw.associated_type,
            Some(2000..=2005) | Some(3000..=3005)
        );

        let text = if is_reaction {
            reaction_annotation(raw.associated_type.unwrap_or_default())?
        } else {
            // NULL text (attributed-body-only rows) degrades to empty;
            // downstream keeps empty messages rather than dropping them.
            raw.text.unwrap_or_default()
        };

        let sender = if raw.is_from_me {
            self.display_name.clone()
        } else {
            raw.sender.unwrap_or_else(|| "Unknown".to_string())
        };

        Some(Message {
            id: Some(raw.id),
            sender,
            text,
            timestamp: raw.time.as_deref().and_then(parse_db_time),
            is_from_me: raw.is_from_me,
            is_reaction,
        })
    }
}

impl MessageSource for ChatDbSource {
    fn recent(&mut self, count: usize) -> Result<Vec<Message>> {
        self.query_recent(count)
    }

    fn new_since_last(&mut self) -> Result<Vec<Message>> {
        let all = self.query_recent(NEW_MESSAGE_SCAN_DEPTH)?;
        let Some(latest_id) = all.last().and_then(|m| m.id) else {
            return Ok(Vec::new());
        };

        let Some(cursor) = self.last_message_id else {
            // First call: mark the current position, do not replay history.
            self.last_message_id = Some(latest_id);
            return Ok(Vec::new());
        };

        let fresh: Vec<Message> = all
            .into_iter()
            .filter(|m| m.id.map_or(false, |id| id > cursor))
            .collect();
        self.last_message_id = Some(fresh.last().and_then(|m| m.id).unwrap_or(latest_id));
        Ok(fresh)
    }
}

/// Tapback annotation for an `associated_message_type` code. The 2000 range
/// is added reactions, the 3000 range removals.
fn reaction_annotation(associated_type: i64) -> Option<String> {
    let emoji = match associated_type % 1000 {
        0 => "❤️",
        1 => "👍",
        2 => "👎",
        3 => "😂",
        4 => "‼️",
        5 => "❓",
        _ => return None,
    };
    if associated_type >= 3000 {
        Some(format!("[Removed reaction {emoji}]"))
    } else {
        Some(format!("[Reacted {emoji}]"))
    }
}

fn parse_db_time(value: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok()?;
    Local.from_local_datetime(&naive).single()
}

/// Sends through Messages.app via `osascript`.
pub struct OsascriptSink {
    chat_name: String,
}

impl OsascriptSink {
    pub fn new(chat_name: impl Into<String>) -> Self {
        Self {
            chat_name: chat_name.into(),
        }
    }
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl MessageSink for OsascriptSink {
    fn send(&mut self, text: &str) -> bool {
        let script = format!(
            "tell application \"Messages\"\n\
                 set targetChat to first chat whose name is \"{}\"\n\
                 send \"{}\" to targetChat\n\
             end tell",
            escape_applescript(&self.chat_name),
            escape_applescript(text),
        );

        match Command::new("osascript").arg("-e").arg(&script).output() {
            Ok(output) if output.status.success() => {
                tracing::debug!("sent message to chat '{}'", self.chat_name);
                true
            }
            Ok(output) => {
                tracing::error!(
                    "osascript send failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                tracing::error!("failed to run osascript: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn seed_db(path: &Path) -> Connection {
        let conn = Connection::open(path).expect("open fixture db");
        conn.execute_batch(
            "CREATE TABLE chat (ROWID INTEGER PRIMARY KEY, display_name TEXT, chat_identifier TEXT);
             CREATE TABLE handle (ROWID INTEGER PRIMARY KEY, id TEXT);
             CREATE TABLE message (
                 ROWID INTEGER PRIMARY KEY,
                 handle_id INTEGER,
                 text TEXT,
                 date INTEGER,
                 is_from_me INTEGER DEFAULT 0,
                 associated_message_type INTEGER
             );
             CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER);
             INSERT INTO chat (ROWID, display_name, chat_identifier) VALUES (1, 'Family', 'chat123');
             INSERT INTO handle (ROWID, id) VALUES (1, 'mom@example.com');
             INSERT INTO handle (ROWID, id) VALUES (2, '+15550002222');",
        )
        .expect("seed schema");
        conn
    }

    fn insert_message(
        conn: &Connection,
        rowid: i64,
        handle_id: Option<i64>,
        text: Option<&str>,
        seq: i64,
        is_from_me: bool,
        associated_type: Option<i64>,
    ) {
        conn.execute(
            "INSERT INTO message (ROWID, handle_id, text, date, is_from_me, associated_message_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                rowid,
                handle_id,
                text,
                seq * 1_000_000_000,
                is_from_me as i64,
                associated_type
            ],
        )
        .expect("insert message");
        conn.execute(
            "INSERT INTO chat_message_join (chat_id, message_id) VALUES (1, ?1)",
            params![rowid],
        )
        .expect("join message");
    }

    fn source(path: &Path) -> ChatDbSource {
        ChatDbSource::new(path, "Family", "Meg")
    }

    #[test]
    fn recent_returns_chronological_order_and_resolves_senders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let conn = seed_db(&path);
        insert_message(&conn, 1, Some(1), Some("在吗?"), 1, false, None);
        insert_message(&conn, 2, None, Some("在"), 2, true, None);
        insert_message(&conn, 3, Some(2), Some("周末去哪玩?"), 3, false, None);

        let messages = source(&path).recent(10).expect("read recent");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].sender, "mom@example.com");
        assert_eq!(messages[0].text, "在吗?");
        assert_eq!(messages[1].sender, "Meg");
        assert!(messages[1].is_from_me);
        assert_eq!(messages[2].id, Some(3));
        assert!(messages[2].timestamp.is_some());
    }

    #[test]
    fn reaction_rows_become_bracketed_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let conn = seed_db(&path);
        insert_message(&conn, 1, Some(1), Some("photo"), 1, false, None);
        insert_message(&conn, 2, Some(2), None, 2, false, Some(2001));
        insert_message(&conn, 3, Some(2), None, 3, false, Some(3003));

        let messages = source(&path).recent(10).expect("read recent");
        assert_eq!(messages.len(), 3);
        assert!(messages[1].is_reaction);
        assert_eq!(messages[1].text, "[Reacted 👍]");
        assert_eq!(messages[2].text, "[Removed reaction 😂]");
    }

    #[test]
    fn null_text_degrades_to_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let conn = seed_db(&path);
        insert_message(&conn, 1, Some(1), None, 1, false, None);

        let messages = source(&path).recent(10).expect("read recent");
        assert_eq!(messages[0].text, "");
    }

    #[test]
    fn new_since_last_primes_then_returns_only_fresh_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let conn = seed_db(&path);
        insert_message(&conn, 1, Some(1), Some("old"), 1, false, None);

        let mut src = source(&path);
        // First call only marks the position.
        assert!(src.new_since_last().expect("prime cursor").is_empty());

        insert_message(&conn, 2, Some(2), Some("fresh"), 2, false, None);
        let fresh = src.new_since_last().expect("poll");
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].text, "fresh");

        // Nothing new on the next poll.
        assert!(src.new_since_last().expect("poll again").is_empty());
    }

    #[test]
    fn unknown_chat_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        seed_db(&path);

        let mut src = ChatDbSource::new(&path, "Nope", "Meg");
        assert!(src.recent(5).is_err());
    }

    #[test]
    fn applescript_escaping_handles_quotes_and_backslashes() {
        assert_eq!(escape_applescript(r#"say "hi" \ bye"#), r#"say \"hi\" \\ bye"#);
    }
}
