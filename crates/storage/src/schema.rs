use rusqlite::Connection;

use crate::error::StorageError;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS scope_entries (
    scope TEXT NOT NULL CHECK (scope IN ('individual', 'tenant', 'category', 'global')),
    scope_key TEXT NOT NULL,
    snapshot BLOB NOT NULL,
    digest BLOB NOT NULL CHECK (length(digest) = 32),
    exemptions BLOB NOT NULL,
    superseded BLOB,
    updated_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER)),
    PRIMARY KEY (scope, scope_key),
    CHECK (scope <> 'global' OR scope_key = '')
);
";
