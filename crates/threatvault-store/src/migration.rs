//! SQLite schema versions.
//!
//! `MIGRATIONS[n]` upgrades the schema from version `n` to `n + 1`. Applied
//! versions are recorded in `schema_migrations`; pending ones run in a single
//! transaction.

use rusqlite::{params, Connection};

use crate::error::{Result, StoreError};

/// Ordered upgrade scripts.
const MIGRATIONS: &[&str] = &[
    // v1: one row per storage key
    r#"
    CREATE TABLE blobs (
        key TEXT PRIMARY KEY,             -- '/'-separated storage key
        value BLOB NOT NULL,              -- opaque bytes (ciphertext, markers)
        updated_at INTEGER NOT NULL       -- Unix ms of last write
    ) WITHOUT ROWID;
    "#,
];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    if applied > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "schema version {} is ahead of this build ({})",
            applied, CURRENT_VERSION
        )));
    }

    let pending = &MIGRATIONS[applied as usize..];
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (offset, script) in pending.iter().enumerate() {
        let version = applied + offset as u32 + 1;
        tx.execute_batch(script)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, unix_millis()],
        )?;
        tracing::debug!(version, "applied schema migration");
    }
    tx.commit()?;
    Ok(())
}

fn unix_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
