mod chat;
mod coaching;
mod daily_work;
mod equipment;
mod failures;
mod maintenance;
mod resolved;
pub mod types;
mod users;

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::platform::{NativePlatform, Platform};
use types::ColumnChanges;

/// Human-readable table labels reported back to the operator.
pub mod labels {
    pub const ACTIVE_FAILURES: &str = "תקלות פעילות";
    pub const RESOLVED_FAILURES: &str = "תקלות שטופלו";
    pub const PENDING_MAINTENANCE: &str = "אחזקות ממתינות";
    pub const EQUIPMENT_HOURS: &str = "שעות מכלולים";
    pub const DAILY_WORK: &str = "תכנית עבודה יומית";
    pub const CONVERSATIONS: &str = "שיחות אימון";
    pub const DNA_ITEMS: &str = "DNA";
    pub const NINETY_DAY_PLAN: &str = "תכנית 90 יום";
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS active_failures (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        failure_number TEXT NOT NULL,
        date TEXT NOT NULL,
        system TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        urgency INTEGER NOT NULL DEFAULT 1,
        assignee TEXT NOT NULL DEFAULT '',
        estimated_hours REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'פתוח',
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS resolved_failures (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        failure_number TEXT NOT NULL,
        date TEXT NOT NULL,
        system TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        urgency INTEGER NOT NULL DEFAULT 1,
        assignee TEXT NOT NULL DEFAULT '',
        estimated_hours REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        actual_hours REAL NOT NULL DEFAULT 0,
        resolution_method TEXT NOT NULL DEFAULT '',
        resolved_date TEXT NOT NULL DEFAULT '',
        resolved_by TEXT NOT NULL DEFAULT '',
        lessons_learned TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS pending_maintenance (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        maintenance_type TEXT NOT NULL,
        system TEXT NOT NULL DEFAULT '',
        frequency_days INTEGER NOT NULL DEFAULT 30,
        last_performed TEXT NOT NULL,
        notes TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS equipment_hours (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        system TEXT NOT NULL,
        system_type TEXT NOT NULL DEFAULT '',
        current_hours REAL NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS daily_work_plans (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        date TEXT NOT NULL,
        task TEXT NOT NULL,
        source TEXT NOT NULL DEFAULT 'other',
        source_id TEXT,
        assignee TEXT NOT NULL DEFAULT '',
        estimated_hours REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'מתוכנן',
        notes TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        meeting_number INTEGER NOT NULL,
        date TEXT NOT NULL DEFAULT '',
        topics TEXT NOT NULL DEFAULT '[]',
        insights TEXT NOT NULL DEFAULT '[]',
        decisions TEXT NOT NULL DEFAULT '[]',
        notes TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS dna_items (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        component_name TEXT NOT NULL,
        current_status INTEGER NOT NULL DEFAULT 1,
        target_status INTEGER NOT NULL DEFAULT 5,
        gaps TEXT NOT NULL DEFAULT '[]',
        actions TEXT NOT NULL DEFAULT '[]',
        notes TEXT NOT NULL DEFAULT '',
        updated_at TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS ninety_day_plan (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        week_number INTEGER NOT NULL,
        goals TEXT NOT NULL DEFAULT '[]',
        actions TEXT NOT NULL DEFAULT '[]',
        metrics TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL DEFAULT 'מתוכנן',
        notes TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS chat_history (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        user_id TEXT,
        user_message TEXT NOT NULL,
        assistant_response TEXT NOT NULL,
        updated_tables TEXT NOT NULL DEFAULT '[]',
        outcome TEXT NOT NULL,
        context_json TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL DEFAULT '',
        google_sub TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_active_failures_user_number ON active_failures(user_id, failure_number)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_user_meeting ON conversations(user_id, meeting_number)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_dna_items_user_component ON dna_items(user_id, component_name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_ninety_day_plan_user_week ON ninety_day_plan(user_id, week_number)",
    "CREATE INDEX IF NOT EXISTS idx_chat_history_session ON chat_history(session_id, user_id)",
];

/// SQLite-backed record store shared by the HTTP handlers, the action
/// executor and the background sweep.
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
                NativePlatform::restrict_dir_permissions(parent);
            }
        }
        let db = Connection::open(path)?;
        NativePlatform::restrict_file_permissions(path);
        create_schema(&db)?;
        info!("Record store opened at {}", path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        create_schema(&db)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Shared handle for components that keep their own tables in the same
    /// database file (the secrets vault).
    pub fn get_db(&self) -> Arc<Mutex<Connection>> {
        self.db.clone()
    }
}

fn create_schema(db: &Connection) -> Result<()> {
    for statement in SCHEMA {
        db.execute(statement, [])?;
    }
    Ok(())
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub(crate) fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// `INSERT INTO table (cols...) VALUES (?...)`. Columns left out fall back to
/// the schema defaults.
pub(crate) fn insert_row(db: &Connection, table: &str, columns: &ColumnChanges) -> Result<usize> {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        placeholders.join(", ")
    );
    let values = columns.iter().map(|(_, value)| value);
    Ok(db.execute(&sql, params_from_iter(values))?)
}

/// Partial update of the rows owned by `user_id` whose `key_column` equals
/// `key`. An empty change set only counts the matching rows so callers can
/// still tell a missing record from a no-op.
pub(crate) fn update_scoped(
    db: &Connection,
    table: &str,
    key_column: &str,
    key: Value,
    user_id: &str,
    changes: &ColumnChanges,
) -> Result<usize> {
    if changes.is_empty() {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1 AND user_id = ?2",
            table, key_column
        );
        let count: i64 = db.query_row(
            &sql,
            rusqlite::params![key, user_id],
            |row| row.get(0),
        )?;
        return Ok(count as usize);
    }

    let assignments: Vec<String> = changes
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
        .collect();
    let n = changes.len();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{} AND user_id = ?{}",
        table,
        assignments.join(", "),
        key_column,
        n + 1,
        n + 2
    );
    let mut values: Vec<Value> = changes.iter().map(|(_, value)| value.clone()).collect();
    values.push(key);
    values.push(Value::Text(user_id.to_string()));
    Ok(db.execute(&sql, params_from_iter(values))?)
}

pub(crate) fn delete_scoped(
    db: &Connection,
    table: &str,
    key_column: &str,
    key: Value,
    user_id: &str,
) -> Result<usize> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1 AND user_id = ?2",
        table, key_column
    );
    Ok(db.execute(&sql, rusqlite::params![key, user_id])?)
}

/// Create an in-memory Store for testing. Avoids filesystem side-effects.
#[cfg(test)]
pub fn test_store() -> Store {
    Store::open_in_memory().expect("open in-memory store")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("maintops.db");
        let store = Store::open(&path).await.unwrap();
        assert!(path.exists());
        let db = store.get_db();
        let db = db.lock().await;
        let count: i64 = db
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(count >= 10);
    }

    #[tokio::test]
    async fn reopening_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maintops.db");
        {
            let store = Store::open(&path).await.unwrap();
            store
                .upsert_user("dana@example.com", "Dana", "sub-1")
                .await
                .unwrap();
        }
        let store = Store::open(&path).await.unwrap();
        let user = store.find_user_by_email("dana@example.com").await.unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn update_scoped_ignores_other_users() {
        let store = test_store();
        let db = store.get_db();
        let db = db.lock().await;
        insert_row(
            &db,
            "equipment_hours",
            &vec![
                ("id", Value::Text("e1".into())),
                ("user_id", Value::Text("owner".into())),
                ("system", Value::Text("מנוע".into())),
                ("updated_at", Value::Text(now_rfc3339())),
            ],
        )
        .unwrap();

        let changes = vec![("current_hours", Value::Real(12.0))];
        let other = update_scoped(&db, "equipment_hours", "id", Value::Text("e1".into()), "intruder", &changes)
            .unwrap();
        assert_eq!(other, 0);
        let own = update_scoped(&db, "equipment_hours", "id", Value::Text("e1".into()), "owner", &changes)
            .unwrap();
        assert_eq!(own, 1);
        let exists = update_scoped(&db, "equipment_hours", "id", Value::Text("e1".into()), "owner", &vec![])
            .unwrap();
        assert_eq!(exists, 1);
    }
}
