//! Node progress across restarts.

use rusqlite::{Connection, OptionalExtension};

use crate::{DbError, Result};

const HEIGHT_KEY: &str = "height";
const SEQUENCE_KEY: &str = "sequence";

/// Last applied height and the engine's next task-id sequence number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeState {
    pub height: u64,
    pub sequence: u64,
}

/// Load the stored state. A database that never saved one reads as zero.
pub fn load(conn: &Connection) -> Result<NodeState> {
    Ok(NodeState {
        height: get_u64(conn, HEIGHT_KEY)?.unwrap_or(0),
        sequence: get_u64(conn, SEQUENCE_KEY)?.unwrap_or(0),
    })
}

pub fn save(conn: &Connection, state: &NodeState) -> Result<()> {
    set_u64(conn, HEIGHT_KEY, state.height)?;
    set_u64(conn, SEQUENCE_KEY, state.sequence)
}

fn get_u64(conn: &Connection, key: &str) -> Result<Option<u64>> {
    let value: Option<Vec<u8>> = conn
        .query_row("SELECT value FROM node_state WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    value
        .map(|bytes| {
            <[u8; 8]>::try_from(bytes.as_slice())
                .map(u64::from_be_bytes)
                .map_err(|_| DbError::Serialization(format!("node_state {key}: bad length")))
        })
        .transpose()
}

// Big-endian bytes: heights above i64::MAX do not fit an INTEGER column.
fn set_u64(conn: &Connection, key: &str, value: u64) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO node_state (key, value) VALUES (?1, ?2)",
        rusqlite::params![key, value.to_be_bytes().as_slice()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_state_is_zero() {
        let conn = crate::open_memory().expect("open test db");
        assert_eq!(load(&conn).expect("load"), NodeState::default());
    }

    #[test]
    fn test_save_and_load() {
        let conn = crate::open_memory().expect("open test db");
        let state = NodeState {
            height: u64::MAX - 1,
            sequence: 7,
        };
        save(&conn, &state).expect("save");
        assert_eq!(load(&conn).expect("load"), state);

        let later = NodeState {
            height: u64::MAX,
            sequence: 9,
        };
        save(&conn, &later).expect("save again");
        assert_eq!(load(&conn).expect("load"), later);
    }
}
