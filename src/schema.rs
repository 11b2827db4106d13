use rusqlite::Connection;

use crate::errors::KvGraphError;

/// Creates the four tables backing [`crate::store::SqliteStore`]: one per value type.
pub fn ensure_schema(conn: &Connection) -> Result<(), KvGraphError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv_strings (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS kv_hashes (
            key   TEXT NOT NULL,
            field TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (key, field)
        );
        CREATE TABLE IF NOT EXISTS kv_sets (
            key    TEXT NOT NULL,
            member TEXT NOT NULL,
            PRIMARY KEY (key, member)
        );
        CREATE TABLE IF NOT EXISTS kv_zsets (
            key    TEXT NOT NULL,
            member TEXT NOT NULL,
            score  REAL NOT NULL,
            PRIMARY KEY (key, member)
        );
        CREATE INDEX IF NOT EXISTS idx_zsets_key_score ON kv_zsets(key, score);
        "#,
    )
    .map_err(|e| KvGraphError::schema(e.to_string()))?;
    Ok(())
}
