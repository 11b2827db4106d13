use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::{errors::KvGraphError, schema::ensure_schema, types::Attributes};

use super::{Command, KeyValueStore, checked_increment, normalize_range, sample_with_replacement};

const VALUE_TABLES: [&str; 4] = ["kv_strings", "kv_hashes", "kv_sets", "kv_zsets"];

/// Durable store keeping each value type in its own SQLite table. Set algebra runs as compound
/// `SELECT`s, so keys can always be combined.
///
/// Writes reject a key already holding another type, like [`super::MemoryStore`]. Reads of such
/// a key see an empty value instead of failing.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KvGraphError> {
        let conn = Connection::open(path).map_err(|e| KvGraphError::store(e.to_string()))?;
        ensure_schema(&conn)?;
        // WAL may be unavailable on some filesystems; DELETE journaling is the fallback.
        if conn.pragma_update(None, "journal_mode", "WAL").is_err() {
            let _ = conn.pragma_update(None, "journal_mode", "DELETE");
        }
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, KvGraphError> {
        let conn = Connection::open_in_memory().map_err(|e| KvGraphError::store(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Applies a `PRAGMA key = value`; pragmas that answer with a row are accepted.
    pub fn apply_pragma(&self, key: &str, value: &str) -> Result<(), KvGraphError> {
        let sql = format!("PRAGMA {key} = {value}");
        match self.conn.lock().execute(&sql, []) {
            Ok(_) | Err(rusqlite::Error::ExecuteReturnedResults) => Ok(()),
            Err(e) => Err(KvGraphError::store(format!("PRAGMA {key} = {value}: {e}"))),
        }
    }

    pub fn set_statement_cache_capacity(&self, capacity: usize) {
        self.conn.lock().set_prepared_statement_cache_capacity(capacity);
    }

    fn from_connection(conn: Connection) -> Self {
        conn.set_prepared_statement_cache_capacity(64);
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn combine(&self, operator: &str, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let sql = (1..=keys.len())
            .map(|i| format!("SELECT member FROM kv_sets WHERE key=?{i}"))
            .collect::<Vec<_>>()
            .join(&format!(" {operator} "));
        let sql = format!("{sql} ORDER BY member");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
        let rows = stmt
            .query_map(params_from_iter(keys.iter()), |row| row.get(0))
            .map_err(sql_err)?;
        let mut members = Vec::new();
        for member in rows {
            members.push(member.map_err(sql_err)?);
        }
        Ok(members)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvGraphError> {
        self.conn
            .lock()
            .query_row(
                "SELECT value FROM kv_strings WHERE key=?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvGraphError> {
        self.multi(&[Command::Set {
            key: key.to_string(),
            value: value.to_string(),
        }])
    }

    fn delete(&self, key: &str) -> Result<bool, KvGraphError> {
        delete_key(&self.conn.lock(), key)
    }

    fn exists(&self, key: &str) -> Result<bool, KvGraphError> {
        self.conn
            .lock()
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM kv_strings WHERE key=?1)
                     OR EXISTS(SELECT 1 FROM kv_hashes WHERE key=?1)
                     OR EXISTS(SELECT 1 FROM kv_sets WHERE key=?1)
                     OR EXISTS(SELECT 1 FROM kv_zsets WHERE key=?1)",
                params![key],
                |row| row.get(0),
            )
            .map_err(sql_err)
    }

    fn hash_get_all(&self, key: &str) -> Result<Attributes, KvGraphError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT field, value FROM kv_hashes WHERE key=?1")
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![key], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(sql_err)?;
        let mut attributes = Attributes::new();
        for row in rows {
            let (field, value): (String, String) = row.map_err(sql_err)?;
            attributes.insert(field, value);
        }
        Ok(attributes)
    }

    fn hash_get_fields(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, KvGraphError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT value FROM kv_hashes WHERE key=?1 AND field=?2")
            .map_err(sql_err)?;
        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            values.push(
                stmt.query_row(params![key, field], |row| row.get(0))
                    .optional()
                    .map_err(sql_err)?,
            );
        }
        Ok(values)
    }

    fn hash_set_fields(&self, key: &str, fields: &Attributes) -> Result<(), KvGraphError> {
        self.multi(&[Command::HashSet {
            key: key.to_string(),
            fields: fields.clone(),
        }])
    }

    fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<i64, KvGraphError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(sql_err)?;
        ensure_type(&tx, key, "kv_hashes")?;
        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM kv_hashes WHERE key=?1 AND field=?2",
                params![key, field],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err)?;
        let current = match current {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                KvGraphError::store(format!("hash value {raw:?} is not an integer"))
            })?,
            None => 0,
        };
        let next = checked_increment(current, by)?;
        tx.execute(
            "INSERT INTO kv_hashes(key, field, value) VALUES(?1, ?2, ?3)
             ON CONFLICT(key, field) DO UPDATE SET value=excluded.value",
            params![key, field, next.to_string()],
        )
        .map_err(sql_err)?;
        tx.commit().map_err(sql_err)?;
        Ok(next)
    }

    fn set_add(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        let conn = self.conn.lock();
        ensure_type(&conn, key, "kv_sets")?;
        let affected = conn
            .execute(
                "INSERT OR IGNORE INTO kv_sets(key, member) VALUES(?1, ?2)",
                params![key, member],
            )
            .map_err(sql_err)?;
        Ok(affected == 1)
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        let affected = self
            .conn
            .lock()
            .execute(
                "DELETE FROM kv_sets WHERE key=?1 AND member=?2",
                params![key, member],
            )
            .map_err(sql_err)?;
        Ok(affected == 1)
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, KvGraphError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT member FROM kv_sets WHERE key=?1 ORDER BY member")
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![key], |row| row.get(0))
            .map_err(sql_err)?;
        let mut members = Vec::new();
        for member in rows {
            members.push(member.map_err(sql_err)?);
        }
        Ok(members)
    }

    fn set_random_members(&self, key: &str, count: usize) -> Result<Vec<String>, KvGraphError> {
        let members = self.set_members(key)?;
        Ok(sample_with_replacement(&members, count))
    }

    fn set_is_member(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        self.conn
            .lock()
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM kv_sets WHERE key=?1 AND member=?2)",
                params![key, member],
                |row| row.get(0),
            )
            .map_err(sql_err)
    }

    fn set_cardinality(&self, key: &str) -> Result<usize, KvGraphError> {
        count(&self.conn.lock(), "SELECT COUNT(*) FROM kv_sets WHERE key=?1", key)
    }

    fn set_union(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        self.combine("UNION", keys)
    }

    fn set_diff(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        self.combine("EXCEPT", keys)
    }

    fn set_intersect(&self, keys: &[&str]) -> Result<Vec<String>, KvGraphError> {
        self.combine("INTERSECT", keys)
    }

    fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<bool, KvGraphError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(sql_err)?;
        let existed: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM kv_zsets WHERE key=?1 AND member=?2)",
                params![key, member],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        apply(
            &tx,
            &Command::ZAdd {
                key: key.to_string(),
                score,
                member: member.to_string(),
            },
        )?;
        tx.commit().map_err(sql_err)?;
        Ok(!existed)
    }

    fn zset_remove(&self, key: &str, member: &str) -> Result<bool, KvGraphError> {
        let affected = self
            .conn
            .lock()
            .execute(
                "DELETE FROM kv_zsets WHERE key=?1 AND member=?2",
                params![key, member],
            )
            .map_err(sql_err)?;
        Ok(affected == 1)
    }

    fn zset_reverse_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, KvGraphError> {
        let conn = self.conn.lock();
        let len = count(&conn, "SELECT COUNT(*) FROM kv_zsets WHERE key=?1", key)?;
        let Some((from, to)) = normalize_range(start, stop, len) else {
            return Ok(Vec::new());
        };
        let mut stmt = conn
            .prepare_cached(
                "SELECT member FROM kv_zsets WHERE key=?1
                 ORDER BY score DESC, member DESC LIMIT ?2 OFFSET ?3",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![key, (to - from + 1) as i64, from as i64], |row| {
                row.get(0)
            })
            .map_err(sql_err)?;
        let mut members = Vec::new();
        for member in rows {
            members.push(member.map_err(sql_err)?);
        }
        Ok(members)
    }

    fn zset_reverse_rank(&self, key: &str, member: &str) -> Result<Option<usize>, KvGraphError> {
        let conn = self.conn.lock();
        let Some(score) = zscore(&conn, key, member)? else {
            return Ok(None);
        };
        let ahead: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM kv_zsets
                 WHERE key=?1 AND (score > ?2 OR (score = ?2 AND member > ?3))",
                params![key, score, member],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(Some(ahead as usize))
    }

    fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>, KvGraphError> {
        zscore(&self.conn.lock(), key, member)
    }

    fn zset_increment(&self, key: &str, member: &str, by: f64) -> Result<f64, KvGraphError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(sql_err)?;
        ensure_type(&tx, key, "kv_zsets")?;
        tx.execute(
            "INSERT INTO kv_zsets(key, member, score) VALUES(?1, ?2, ?3)
             ON CONFLICT(key, member) DO UPDATE SET score = score + excluded.score",
            params![key, member, by],
        )
        .map_err(sql_err)?;
        let score = zscore(&tx, key, member)?.unwrap_or(by);
        tx.commit().map_err(sql_err)?;
        Ok(score)
    }

    fn zset_cardinality(&self, key: &str) -> Result<usize, KvGraphError> {
        count(&self.conn.lock(), "SELECT COUNT(*) FROM kv_zsets WHERE key=?1", key)
    }

    fn multi(&self, commands: &[Command]) -> Result<(), KvGraphError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(sql_err)?;
        for command in commands {
            apply(&tx, command)?;
        }
        // Dropping an uncommitted transaction rolls it back.
        tx.commit().map_err(sql_err)
    }

    fn flush(&self) -> Result<(), KvGraphError> {
        let conn = self.conn.lock();
        for table in VALUE_TABLES {
            conn.execute(&format!("DELETE FROM {table}"), [])
                .map_err(sql_err)?;
        }
        Ok(())
    }
}

fn apply(conn: &Connection, command: &Command) -> Result<(), KvGraphError> {
    match command {
        Command::Set { key, value } => {
            delete_key(conn, key)?;
            conn.execute(
                "INSERT INTO kv_strings(key, value) VALUES(?1, ?2)",
                params![key, value],
            )
            .map_err(sql_err)?;
        }
        Command::Delete { key } => {
            delete_key(conn, key)?;
        }
        Command::HashSet { key, fields } => {
            ensure_type(conn, key, "kv_hashes")?;
            let mut stmt = conn
                .prepare_cached(
                    "INSERT INTO kv_hashes(key, field, value) VALUES(?1, ?2, ?3)
                     ON CONFLICT(key, field) DO UPDATE SET value=excluded.value",
                )
                .map_err(sql_err)?;
            for (field, value) in fields {
                stmt.execute(params![key, field, value]).map_err(sql_err)?;
            }
        }
        Command::SetAdd { key, member } => {
            ensure_type(conn, key, "kv_sets")?;
            conn.execute(
                "INSERT OR IGNORE INTO kv_sets(key, member) VALUES(?1, ?2)",
                params![key, member],
            )
            .map_err(sql_err)?;
        }
        Command::SetRemove { key, member } => {
            conn.execute(
                "DELETE FROM kv_sets WHERE key=?1 AND member=?2",
                params![key, member],
            )
            .map_err(sql_err)?;
        }
        Command::ZAdd { key, score, member } => {
            ensure_type(conn, key, "kv_zsets")?;
            conn.execute(
                "INSERT INTO kv_zsets(key, member, score) VALUES(?1, ?2, ?3)
                 ON CONFLICT(key, member) DO UPDATE SET score=excluded.score",
                params![key, member, score],
            )
            .map_err(sql_err)?;
        }
        Command::ZRemove { key, member } => {
            conn.execute(
                "DELETE FROM kv_zsets WHERE key=?1 AND member=?2",
                params![key, member],
            )
            .map_err(sql_err)?;
        }
    }
    Ok(())
}

/// Fails with WRONGTYPE when `key` holds a value outside `table`.
fn ensure_type(conn: &Connection, key: &str, table: &str) -> Result<(), KvGraphError> {
    for other in VALUE_TABLES.into_iter().filter(|other| *other != table) {
        let held: bool = conn
            .query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {other} WHERE key=?1)"),
                params![key],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        if held {
            return Err(KvGraphError::store(format!(
                "WRONGTYPE key {key} holds a {} value, expected {}",
                type_name(other),
                type_name(table)
            )));
        }
    }
    Ok(())
}

fn type_name(table: &str) -> &'static str {
    match table {
        "kv_strings" => "string",
        "kv_hashes" => "hash",
        "kv_sets" => "set",
        _ => "zset",
    }
}

fn delete_key(conn: &Connection, key: &str) -> Result<bool, KvGraphError> {
    let mut affected = 0;
    for table in VALUE_TABLES {
        affected += conn
            .execute(&format!("DELETE FROM {table} WHERE key=?1"), params![key])
            .map_err(sql_err)?;
    }
    Ok(affected > 0)
}

fn zscore(conn: &Connection, key: &str, member: &str) -> Result<Option<f64>, KvGraphError> {
    conn.query_row(
        "SELECT score FROM kv_zsets WHERE key=?1 AND member=?2",
        params![key, member],
        |row| row.get(0),
    )
    .optional()
    .map_err(sql_err)
}

fn count(conn: &Connection, sql: &str, key: &str) -> Result<usize, KvGraphError> {
    let value: i64 = conn
        .query_row(sql, params![key], |row| row.get(0))
        .map_err(sql_err)?;
    Ok(value as usize)
}

fn sql_err(err: rusqlite::Error) -> KvGraphError {
    KvGraphError::store(err.to_string())
}
