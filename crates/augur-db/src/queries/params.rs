//! Parameter blob queries.

use rusqlite::{Connection, OptionalExtension};

use crate::Result;

/// Get the raw value stored under `key`, if any.
pub fn get(conn: &Connection, key: &str) -> Result<Option<Vec<u8>>> {
    let value = conn
        .query_row("SELECT value FROM params WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}

/// Replace the value stored under `key`.
pub fn set(conn: &Connection, key: &str, value: &[u8]) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO params (key, value) VALUES (?1, ?2)",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// All stored keys, sorted.
pub fn keys(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT key FROM params ORDER BY key")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let mut keys = Vec::new();
    for row in rows {
        keys.push(row?);
    }
    Ok(keys)
}
