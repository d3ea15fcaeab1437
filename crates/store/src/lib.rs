//! SQLite-backed session store.
//!
//! Two tables: `sessions` (id, user_id, timestamps, last state snapshot)
//! and `messages` (append-only log, cascade-deleted with the session).
//! One connection behind a mutex: statements are short and per-session
//! contention is bounded by the one-active-run lock upstream.

mod types;

pub use types::{MessageKind, MessageRecord, MessageRole, SessionRecord};

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use mf_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Schema
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id          TEXT PRIMARY KEY,
    user_id     TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    state       TEXT
);
CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions (user_id);

CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY,
    session_id  TEXT NOT NULL REFERENCES sessions (id) ON DELETE CASCADE,
    role        TEXT NOT NULL,
    type        TEXT NOT NULL,
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages (session_id);
"#;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open (or create) the store at the given path. Parent directories
    /// are created; `:memory:` gives an ephemeral store.
    pub fn open(path: &str) -> Result<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory().map_err(db_err)?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open(path).map_err(db_err)?
        };

        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        tracing::info!(path, "session store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    // ── Sessions ───────────────────────────────────────────────────

    pub fn create_session(&self, user_id: Option<&str>) -> Result<SessionRecord> {
        let now = Utc::now();
        let record = SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.map(String::from),
            created_at: now,
            updated_at: now,
            state: None,
        };

        self.conn
            .lock()
            .execute(
                "INSERT INTO sessions (id, user_id, created_at, updated_at, state)
                 VALUES (?1, ?2, ?3, ?4, NULL)",
                params![
                    record.id,
                    record.user_id,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

        tracing::info!(session_id = %record.id, "session created");
        Ok(record)
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        self.conn
            .lock()
            .query_row(
                "SELECT id, user_id, created_at, updated_at, state
                 FROM sessions WHERE id = ?1",
                params![id],
                row_to_session,
            )
            .optional()
            .map_err(db_err)
    }

    /// Store the final workflow state snapshot.
    pub fn update_state(&self, session_id: &str, state: &serde_json::Value) -> Result<()> {
        let changed = self
            .conn
            .lock()
            .execute(
                "UPDATE sessions SET state = ?1, updated_at = ?2 WHERE id = ?3",
                params![state.to_string(), Utc::now().to_rfc3339(), session_id],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(Error::SessionNotFound(session_id.into()));
        }
        Ok(())
    }

    /// Delete a session; messages cascade. Returns whether it existed.
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .lock()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    // ── Messages ───────────────────────────────────────────────────

    /// Append a message to a session's log and touch the session.
    pub fn append_message(
        &self,
        session_id: &str,
        role: MessageRole,
        kind: MessageKind,
        content: &str,
    ) -> Result<MessageRecord> {
        let now = Utc::now();
        let record = MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role,
            kind,
            content: content.to_string(),
            created_at: now,
        };

        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO messages (id, session_id, role, type, content, created_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6
             WHERE EXISTS (SELECT 1 FROM sessions WHERE id = ?2)",
            params![
                record.id,
                record.session_id,
                record.role.as_str(),
                record.kind.as_str(),
                record.content,
                record.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;

        if inserted == 0 {
            return Err(Error::SessionNotFound(session_id.into()));
        }

        conn.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), session_id],
        )
        .map_err(db_err)?;

        Ok(record)
    }

    /// All messages of a session in insertion order.
    pub fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, role, type, content, created_at
                 FROM messages WHERE session_id = ?1 ORDER BY rowid",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![session_id], row_to_message)
            .map_err(db_err)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.map_err(db_err)?);
        }
        Ok(messages)
    }

    /// The session history shaped for client consumption.
    pub fn format_history(&self, session_id: &str) -> Result<serde_json::Value> {
        let session = self
            .get_session(session_id)?
            .ok_or_else(|| Error::SessionNotFound(session_id.into()))?;
        let messages = self.list_messages(session_id)?;

        Ok(serde_json::json!({
            "session_id": session.id,
            "messages": messages,
            "state": session.state,
        }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Row mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: parse_instant(&row.get::<_, String>(2)?),
        updated_at: parse_instant(&row.get::<_, String>(3)?),
        state: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| serde_json::from_str(&s).ok()),
    })
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let role: String = row.get(2)?;
    let kind: String = row.get(3)?;
    Ok(MessageRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role: role.parse().unwrap_or(MessageRole::System),
        kind: kind.parse().unwrap_or(MessageKind::Text),
        content: row.get(4)?,
        created_at: parse_instant(&row.get::<_, String>(5)?),
    })
}

fn parse_instant(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_get_session() {
        let store = SessionStore::in_memory().unwrap();
        let session = store.create_session(Some("u1")).unwrap();
        assert_eq!(session.id.len(), 36);

        let fetched = store.get_session(&session.id).unwrap().unwrap();
        assert_eq!(fetched.id, session.id);
        assert_eq!(fetched.user_id.as_deref(), Some("u1"));
        assert!(fetched.state.is_none());
    }

    #[test]
    fn unknown_session_is_none() {
        let store = SessionStore::in_memory().unwrap();
        assert!(store.get_session("missing").unwrap().is_none());
    }

    #[test]
    fn messages_keep_insertion_order() {
        let store = SessionStore::in_memory().unwrap();
        let session = store.create_session(None).unwrap();

        store
            .append_message(&session.id, MessageRole::User, MessageKind::Text, "hi")
            .unwrap();
        store
            .append_message(
                &session.id,
                MessageRole::Assistant,
                MessageKind::Text,
                "hello",
            )
            .unwrap();
        store
            .append_message(&session.id, MessageRole::User, MessageKind::Text, "more")
            .unwrap();

        let messages = store.list_messages(&session.id).unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello", "more"]);
        assert!(messages.iter().all(|m| m.id.len() == 36));
    }

    #[test]
    fn append_to_unknown_session_fails() {
        let store = SessionStore::in_memory().unwrap();
        let err = store
            .append_message("ghost", MessageRole::User, MessageKind::Text, "x")
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[test]
    fn state_snapshot_round_trips() {
        let store = SessionStore::in_memory().unwrap();
        let session = store.create_session(None).unwrap();

        let state = serde_json::json!({"next": null, "full_plan": "done"});
        store.update_state(&session.id, &state).unwrap();

        let fetched = store.get_session(&session.id).unwrap().unwrap();
        assert_eq!(fetched.state, Some(state));
    }

    #[test]
    fn update_state_on_unknown_session_fails() {
        let store = SessionStore::in_memory().unwrap();
        let err = store
            .update_state("ghost", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[test]
    fn delete_cascades_to_messages() {
        let store = SessionStore::in_memory().unwrap();
        let session = store.create_session(None).unwrap();
        store
            .append_message(&session.id, MessageRole::User, MessageKind::Text, "hi")
            .unwrap();

        assert!(store.delete_session(&session.id).unwrap());
        assert!(store.get_session(&session.id).unwrap().is_none());
        assert!(store.list_messages(&session.id).unwrap().is_empty());
        assert!(!store.delete_session(&session.id).unwrap());
    }

    #[test]
    fn format_history_shape() {
        let store = SessionStore::in_memory().unwrap();
        let session = store.create_session(None).unwrap();
        store
            .append_message(&session.id, MessageRole::User, MessageKind::Text, "q")
            .unwrap();
        store
            .append_message(
                &session.id,
                MessageRole::Assistant,
                MessageKind::Workflow,
                r#"{"workflow": {"title": "t"}}"#,
            )
            .unwrap();

        let history = store.format_history(&session.id).unwrap();
        assert_eq!(history["session_id"], serde_json::json!(session.id));
        let messages = history["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["type"], "workflow");
    }

    #[test]
    fn store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medflow.db");
        let path_str = path.to_str().unwrap();

        let session_id = {
            let store = SessionStore::open(path_str).unwrap();
            let session = store.create_session(None).unwrap();
            store
                .append_message(&session.id, MessageRole::User, MessageKind::Text, "persist")
                .unwrap();
            session.id
        };

        let store = SessionStore::open(path_str).unwrap();
        let messages = store.list_messages(&session_id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "persist");
    }
}
