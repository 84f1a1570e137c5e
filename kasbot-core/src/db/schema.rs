//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        owner_id    TEXT PRIMARY KEY,
        mode        TEXT NOT NULL DEFAULT 'business',
        created_at  DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS transactions (
        id            TEXT PRIMARY KEY,
        owner_id      TEXT NOT NULL,
        action        TEXT NOT NULL,
        amount        TEXT NOT NULL,
        description   TEXT NOT NULL,
        counterparty  TEXT,
        payment_terms TEXT,
        category      TEXT,
        cogs_estimate TEXT,
        language      TEXT NOT NULL,
        created_at    DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_transactions_owner_created
        ON transactions(owner_id, created_at);

    -- owner_id as primary key enforces at most one pending capture per owner
    CREATE TABLE IF NOT EXISTS pending_captures (
        owner_id    TEXT PRIMARY KEY,
        draft       JSON NOT NULL,
        missing     JSON NOT NULL,
        created_at  DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS streaks (
        owner_id    TEXT PRIMARY KEY,
        count       INTEGER NOT NULL,
        last_logged TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS activity_log (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id    TEXT NOT NULL,
        class       TEXT NOT NULL,
        action      TEXT,
        outcome     TEXT NOT NULL,
        created_at  DATETIME NOT NULL
    );
    "#,
];

/// Run all pending migrations on the connection.
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let version = (idx + 1) as i32;
        if version > current {
            tracing::info!(version, "Applying schema migration");
            conn.execute_batch(migration)?;
            conn.pragma_update(None, "user_version", version)?;
        }
    }

    Ok(())
}
