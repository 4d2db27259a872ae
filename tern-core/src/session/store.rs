//! SQLite-backed session and message persistence.
//!
//! The sessions table has drifted across releases: it may be missing, lack
//! the id column, or lack the created-at column. Reconciliation runs once
//! when the store is opened, detecting the actual column set and migrating
//! forward to the canonical shape, so every later operation works against a
//! single known schema. Reads degrade instead of failing; the store never
//! surfaces persistence trouble to the conversation.
//!
//! A connection is opened per operation. Concurrent access relies on
//! SQLite's own file locking, which is enough for a single local user.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};
use uuid::Uuid;

use super::memory::MemoryBlob;
use super::naming::derive_session_name;
use super::{Message, Role, SessionInfo};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Columns of the sessions table that survived reconciliation. When the
/// engine refuses an `ALTER TABLE`, writes and reads name only what exists.
#[derive(Debug, Clone, Copy)]
struct SessionColumns {
    has_name: bool,
    has_created_at: bool,
}

impl SessionColumns {
    const CANONICAL: Self = Self {
        has_name: true,
        has_created_at: true,
    };
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    db_path: PathBuf,
    base: String,
    session_columns: SessionColumns,
}

impl SessionStore {
    /// Open (and if needed create) the database at `db_path`, using `base`
    /// as the main table name with `_sessions` and `_messages` companions.
    pub fn open(db_path: impl Into<PathBuf>, base: &str) -> Result<Self> {
        if base.is_empty()
            || !base
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            || base.chars().next().is_some_and(|c| c.is_ascii_digit())
        {
            bail!("invalid table base name '{base}'");
        }
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let mut store = Self {
            db_path,
            base: base.to_string(),
            session_columns: SessionColumns::CANONICAL,
        };
        let conn = store.connect()?;
        store.session_columns = reconcile_sessions_table(&conn, &store.sessions_table())?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {main} (
                 session_id TEXT PRIMARY KEY,
                 memory TEXT,
                 created_at TEXT
             );
             CREATE TABLE IF NOT EXISTS {messages} (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 session_id TEXT NOT NULL,
                 role TEXT NOT NULL,
                 content TEXT NOT NULL,
                 created_at TEXT
             );",
            main = store.base,
            messages = store.messages_table(),
        ))?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("failed to open {}", self.db_path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn sessions_table(&self) -> String {
        format!("{}_sessions", self.base)
    }

    fn messages_table(&self) -> String {
        format!("{}_messages", self.base)
    }

    fn history_table(&self) -> String {
        format!("{}_history", self.base)
    }

    /// Record the session in the main table if it is not already there.
    pub fn create_session(&self, session_id: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (session_id, memory, created_at) VALUES (?1, NULL, ?2)",
                self.base
            ),
            rusqlite::params![session_id, now()],
        )?;
        Ok(())
    }

    pub fn session_exists(&self, session_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let found: Option<String> = conn
            .query_row(
                &format!("SELECT session_id FROM {} WHERE session_id = ?1", self.base),
                [session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Idempotent upsert of the display name, keyed by session id. The
    /// write names only the columns reconciliation left standing; a missing
    /// name column drops the name with a warning instead of failing.
    pub fn set_session_name(&self, session_id: &str, name: &str) -> Result<()> {
        let conn = self.connect()?;
        let SessionColumns {
            has_name,
            has_created_at,
        } = self.session_columns;
        if !has_name {
            warn!(session_id, "name column is absent, session stays unnamed");
        }
        match (has_name, has_created_at) {
            (true, true) => conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (session_id, session_name, created_at) \
                     VALUES (?1, ?2, ?3)",
                    self.sessions_table()
                ),
                rusqlite::params![session_id, name, now()],
            )?,
            (true, false) => conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (session_id, session_name) VALUES (?1, ?2)",
                    self.sessions_table()
                ),
                rusqlite::params![session_id, name],
            )?,
            (false, true) => conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (session_id, created_at) VALUES (?1, ?2)",
                    self.sessions_table()
                ),
                rusqlite::params![session_id, now()],
            )?,
            (false, false) => conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (session_id) VALUES (?1)",
                    self.sessions_table()
                ),
                [session_id],
            )?,
        };
        Ok(())
    }

    /// Derive a name from the first user message and persist it.
    pub fn set_session_name_from_message(&self, session_id: &str, message: &str) -> Result<String> {
        let name = derive_session_name(message);
        self.set_session_name(session_id, &name)?;
        Ok(name)
    }

    pub fn get_session_name(&self, session_id: &str) -> Result<Option<String>> {
        if !self.session_columns.has_name {
            return Ok(None);
        }
        let conn = self.connect()?;
        let name: Option<Option<String>> = conn
            .query_row(
                &format!(
                    "SELECT session_name FROM {} WHERE session_id = ?1",
                    self.sessions_table()
                ),
                [session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.flatten())
    }

    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE session_id = ?1", self.sessions_table()),
            [session_id],
        )?;
        conn.execute(
            &format!("DELETE FROM {} WHERE session_id = ?1", self.messages_table()),
            [session_id],
        )?;
        // The legacy table only exists in old databases.
        let _ = conn.execute(
            &format!("DELETE FROM {} WHERE session_id = ?1", self.history_table()),
            [session_id],
        );
        conn.execute(
            &format!("DELETE FROM {} WHERE session_id = ?1", self.base),
            [session_id],
        )?;
        Ok(())
    }

    pub fn delete_all_sessions(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(&format!("DELETE FROM {}", self.sessions_table()), [])?;
        conn.execute(&format!("DELETE FROM {}", self.messages_table()), [])?;
        let _ = conn.execute(&format!("DELETE FROM {}", self.history_table()), []);
        conn.execute(&format!("DELETE FROM {}", self.base), [])?;
        Ok(())
    }

    /// All known sessions, newest first. Sessions that only exist as a main
    /// table row (no metadata) are included unnamed.
    pub fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        let conn = self.connect()?;
        let name_column = if self.session_columns.has_name {
            "session_name"
        } else {
            "NULL"
        };
        let (created_column, order) = if self.session_columns.has_created_at {
            ("created_at", " ORDER BY created_at DESC")
        } else {
            ("NULL", "")
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT session_id, {name_column}, {created_column} FROM {}{order}",
            self.sessions_table()
        ))?;
        let mut sessions: Vec<SessionInfo> = stmt
            .query_map([], |row| {
                Ok(SessionInfo {
                    session_id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        let known: Vec<String> = sessions.iter().map(|s| s.session_id.clone()).collect();
        let mut stmt = conn.prepare(&format!(
            "SELECT session_id, created_at FROM {} ORDER BY created_at DESC",
            self.base
        ))?;
        let unnamed: Vec<SessionInfo> = stmt
            .query_map([], |row| {
                Ok(SessionInfo {
                    session_id: row.get(0)?,
                    name: None,
                    created_at: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for info in unnamed {
            if !known.contains(&info.session_id) {
                sessions.push(info);
            }
        }
        Ok(sessions)
    }

    pub fn append_message(&self, session_id: &str, message: &Message) -> Result<()> {
        self.create_session(session_id)?;
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                self.messages_table()
            ),
            rusqlite::params![
                session_id,
                message.role.as_str(),
                message.content,
                message.created_at.clone().unwrap_or_else(now),
            ],
        )?;
        Ok(())
    }

    /// Read the conversation, trying the canonical messages table, then the
    /// legacy history table, then the JSON memory blob on the main row.
    /// Every tier is wrapped; exhausting all of them yields an empty list,
    /// never an error.
    pub fn get_messages(&self, session_id: &str, limit: Option<usize>) -> Vec<Message> {
        let messages = match self.read_message_table(&self.messages_table(), session_id) {
            Ok(messages) if !messages.is_empty() => messages,
            Ok(_) | Err(_) => match self.read_message_table(&self.history_table(), session_id) {
                Ok(messages) if !messages.is_empty() => messages,
                Ok(_) => self.read_memory_blob(session_id),
                Err(err) => {
                    debug!(session_id, "legacy history table unavailable: {err}");
                    self.read_memory_blob(session_id)
                }
            },
        };
        match limit {
            Some(n) if messages.len() > n => messages[messages.len() - n..].to_vec(),
            _ => messages,
        }
    }

    fn read_message_table(&self, table: &str, session_id: &str) -> Result<Vec<Message>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT role, content, created_at FROM {table} WHERE session_id = ?1 ORDER BY id"
        ))?;
        let messages = stmt
            .query_map([session_id], |row| {
                Ok(Message {
                    role: Role::parse(&row.get::<_, String>(0)?),
                    content: row.get(1)?,
                    created_at: row.get(2)?,
                    id: None,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    fn read_memory_blob(&self, session_id: &str) -> Vec<Message> {
        let raw = match self.read_memory_column(session_id) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                debug!(session_id, "memory column unavailable: {err}");
                return Vec::new();
            }
        };
        match MemoryBlob::parse(&raw) {
            Some(blob) => blob.into_messages(),
            None => {
                warn!(session_id, "memory blob has an unrecognized shape");
                Vec::new()
            }
        }
    }

    fn read_memory_column(&self, session_id: &str) -> Result<Option<String>> {
        let conn = self.connect()?;
        let memory: Option<Option<String>> = conn
            .query_row(
                &format!("SELECT memory FROM {} WHERE session_id = ?1", self.base),
                [session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(memory.flatten())
    }
}

fn now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Bring the sessions table to the canonical shape. Returns the column set
/// that actually exists afterwards; an `ALTER TABLE` refusal clears the flag
/// for that column alone, so later writes name only what survived.
fn reconcile_sessions_table(conn: &Connection, table: &str) -> Result<SessionColumns> {
    let columns = table_columns(conn, table)?;
    if columns.is_empty() {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                     session_id TEXT PRIMARY KEY,
                     session_name TEXT,
                     created_at TEXT
                 )"
            ),
            [],
        )?;
        return Ok(SessionColumns::CANONICAL);
    }

    if !columns.iter().any(|c| c == "session_id") {
        // The table cannot key session metadata. Move it aside so any
        // salvageable legacy values survive, then recreate canonically.
        warn!(table, "sessions table lacks its key column, rebuilding");
        let backup = format!("{table}_legacy_backup");
        conn.execute(&format!("DROP TABLE IF EXISTS {backup}"), [])?;
        conn.execute(&format!("ALTER TABLE {table} RENAME TO {backup}"), [])?;
        conn.execute(
            &format!(
                "CREATE TABLE {table} (
                     session_id TEXT PRIMARY KEY,
                     session_name TEXT,
                     created_at TEXT
                 )"
            ),
            [],
        )?;
        return Ok(SessionColumns::CANONICAL);
    }

    let mut surviving = SessionColumns::CANONICAL;
    if !columns.iter().any(|c| c == "session_name") {
        if let Err(err) = conn.execute(
            &format!("ALTER TABLE {table} ADD COLUMN session_name TEXT"),
            [],
        ) {
            warn!(table, "could not add name column: {err}");
            surviving.has_name = false;
        }
    }
    if !columns.iter().any(|c| c == "created_at") {
        if let Err(err) = conn.execute(
            &format!("ALTER TABLE {table} ADD COLUMN created_at TEXT"),
            [],
        ) {
            warn!(table, "could not add created_at column: {err}");
            surviving.has_created_at = false;
        }
    }
    Ok(surviving)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> SessionStore {
        SessionStore::open(dir.path().join("test.db"), "agent").unwrap()
    }

    #[test]
    fn rename_twice_leaves_one_row_with_latest_name() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = SessionStore::new_session_id();
        store.set_session_name(&id, "first name").unwrap();
        store.set_session_name(&id, "second name").unwrap();

        assert_eq!(store.get_session_name(&id).unwrap().unwrap(), "second name");
        let conn = Connection::open(store.db_path()).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM agent_sessions WHERE session_id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn name_derivation_persists_the_derived_name() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = SessionStore::new_session_id();
        let name = store
            .set_session_name_from_message(
                &id,
                "Hello build me a small CLI tool for parsing web server logs",
            )
            .unwrap();
        assert!(name.ends_with("..."));
        assert_eq!(store.get_session_name(&id).unwrap(), Some(name));
    }

    #[test]
    fn absent_table_is_created_on_open() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.set_session_name("s1", "a name").unwrap();
        assert_eq!(store.get_session_name("s1").unwrap(), Some("a name".into()));
    }

    #[test]
    fn table_without_key_column_is_rebuilt_with_backup() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("test.db");
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute("CREATE TABLE agent_sessions (junk TEXT)", [])
                .unwrap();
            conn.execute("INSERT INTO agent_sessions (junk) VALUES ('old')", [])
                .unwrap();
        }
        let store = SessionStore::open(&db, "agent").unwrap();
        store.set_session_name("s1", "fresh").unwrap();
        assert_eq!(store.get_session_name("s1").unwrap(), Some("fresh".into()));

        let conn = Connection::open(&db).unwrap();
        let salvaged: String = conn
            .query_row("SELECT junk FROM agent_sessions_legacy_backup", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(salvaged, "old");
    }

    #[test]
    fn missing_created_at_column_is_added() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("test.db");
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute(
                "CREATE TABLE agent_sessions (session_id TEXT PRIMARY KEY, session_name TEXT)",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO agent_sessions VALUES ('old-id', 'old name')",
                [],
            )
            .unwrap();
        }
        let store = SessionStore::open(&db, "agent").unwrap();
        store.set_session_name("new-id", "new name").unwrap();
        assert_eq!(
            store.get_session_name("old-id").unwrap(),
            Some("old name".into())
        );
        let listed = store.list_sessions().unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn missing_name_column_writes_only_surviving_columns() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        {
            let conn = Connection::open(store.db_path()).unwrap();
            conn.execute("ALTER TABLE agent_sessions DROP COLUMN session_name", [])
                .unwrap();
        }
        store.session_columns.has_name = false;

        store.set_session_name("s1", "a name with nowhere to go").unwrap();
        assert_eq!(store.get_session_name("s1").unwrap(), None);

        let listed = store.list_sessions().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, "s1");
        assert!(listed[0].name.is_none());
        assert!(listed[0].created_at.is_some());
    }

    #[test]
    fn store_without_either_metadata_column_still_records_sessions() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        {
            let conn = Connection::open(store.db_path()).unwrap();
            conn.execute("ALTER TABLE agent_sessions DROP COLUMN session_name", [])
                .unwrap();
            conn.execute("ALTER TABLE agent_sessions DROP COLUMN created_at", [])
                .unwrap();
        }
        store.session_columns = SessionColumns {
            has_name: false,
            has_created_at: false,
        };

        store.set_session_name("s1", "unrecordable").unwrap();
        store.set_session_name("s1", "still unrecordable").unwrap();
        assert_eq!(store.get_session_name("s1").unwrap(), None);

        let listed = store.list_sessions().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, "s1");
        assert!(listed[0].name.is_none());
        assert!(listed[0].created_at.is_none());
    }

    #[test]
    fn append_and_read_messages_with_limit() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = SessionStore::new_session_id();
        for index in 0..5 {
            store
                .append_message(&id, &Message::user(format!("message {index}")))
                .unwrap();
        }
        let all = store.get_messages(&id, None);
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].content, "message 0");

        let last_two = store.get_messages(&id, Some(2));
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].content, "message 3");
        assert_eq!(last_two[1].content, "message 4");
    }

    #[test]
    fn memory_blob_is_the_final_fallback() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = SessionStore::new_session_id();
        store.create_session(&id).unwrap();
        {
            let conn = Connection::open(store.db_path()).unwrap();
            conn.execute(
                "UPDATE agent SET memory = ?1 WHERE session_id = ?2",
                rusqlite::params![
                    r#"{"history": {"messages": [{"role": "user", "content": "from the blob"}]}}"#,
                    id.as_str(),
                ],
            )
            .unwrap();
        }
        let messages = store.get_messages(&id, None);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "from the blob");
        assert_eq!(messages[0].role, Role::User);
    }

    #[test]
    fn unknown_session_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.get_messages("missing", None).is_empty());
    }

    #[test]
    fn delete_session_removes_all_traces() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = SessionStore::new_session_id();
        store.append_message(&id, &Message::user("hi")).unwrap();
        store.set_session_name(&id, "doomed").unwrap();
        store.delete_session(&id).unwrap();
        assert!(store.get_messages(&id, None).is_empty());
        assert!(store.get_session_name(&id).unwrap().is_none());
        assert!(!store.session_exists(&id).unwrap());
    }

    #[test]
    fn invalid_table_base_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(SessionStore::open(dir.path().join("x.db"), "bad-name; DROP").is_err());
        assert!(SessionStore::open(dir.path().join("x.db"), "1starts_with_digit").is_err());
    }
}
