//! SQLite backend: current state per user plus named snapshots.

use crate::envelope::{decode, SavedState};
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS user_states (
        user_id TEXT PRIMARY KEY,
        state_version TEXT NOT NULL,
        state_data TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        note TEXT,
        state_version TEXT NOT NULL,
        state_data TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS snapshots_user ON snapshots (user_id, id)",
];

/// Open (creating if needed) the database at `url` and ensure the schema.
pub async fn init_db(url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    // each connection to :memory: is its own database
    let in_memory = url.contains(":memory:");
    let mut pool = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 4 });
    if in_memory {
        pool = pool.idle_timeout(None).max_lifetime(None);
    }
    let pool = pool.connect_with(options).await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    info!(url, "database ready");
    Ok(pool)
}

fn decode_row(row: &SqliteRow) -> Result<SavedState, StoreError> {
    let data: String = row.try_get("state_data")?;
    Ok(decode(serde_json::from_str(&data)?)?)
}

/// Upsert the current state of `user_id`. Last write wins.
pub async fn save_user_state(
    pool: &SqlitePool,
    user_id: &str,
    saved: &SavedState,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO user_states (user_id, state_version, state_data, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
            state_version = excluded.state_version,
            state_data = excluded.state_data,
            updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(&saved.version)
    .bind(serde_json::to_string(&saved.to_value()?)?)
    .bind(saved.saved_at.to_rfc3339())
    .execute(pool)
    .await?;
    debug!(user_id, "user state saved");
    Ok(())
}

pub async fn load_user_state(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<SavedState>, StoreError> {
    let row = sqlx::query("SELECT state_data FROM user_states WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(decode_row).transpose()
}

/// Listing entry; the state blob itself is only read by [`load_snapshot`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: i64,
    pub name: String,
    pub note: Option<String>,
    pub state_version: String,
    pub created_at: String,
}

/// Store a named copy of `saved` and return its id.
pub async fn create_snapshot(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    note: Option<&str>,
    saved: &SavedState,
) -> Result<i64, StoreError> {
    let id = sqlx::query(
        "INSERT INTO snapshots (user_id, name, note, state_version, state_data, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(note)
    .bind(&saved.version)
    .bind(serde_json::to_string(&saved.to_value()?)?)
    .bind(saved.saved_at.to_rfc3339())
    .execute(pool)
    .await?
    .last_insert_rowid();
    info!(user_id, name, id, "snapshot created");
    Ok(id)
}

/// Snapshots of `user_id`, newest first.
pub async fn list_snapshots(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<SnapshotInfo>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, name, note, state_version, created_at FROM snapshots
         WHERE user_id = ? ORDER BY id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| {
            Ok::<_, StoreError>(SnapshotInfo {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                note: row.try_get("note")?,
                state_version: row.try_get("state_version")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

pub async fn load_snapshot(
    pool: &SqlitePool,
    user_id: &str,
    id: i64,
) -> Result<Option<SavedState>, StoreError> {
    let row = sqlx::query("SELECT state_data FROM snapshots WHERE user_id = ? AND id = ?")
        .bind(user_id)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(decode_row).transpose()
}
