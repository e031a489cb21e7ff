//! Database migrations.
//!
//! Schema version stored in `PRAGMA user_version`. Migrations are forward-only.

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// Run all pending migrations.
///
/// A fresh database gets schema v1 and is then migrated forward like any
/// existing one.
pub fn run(conn: &Connection) -> Result<()> {
    let mut current_version: u32 =
        conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current_version > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database version {current_version} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    if current_version == 0 {
        tracing::info!("initializing database schema v1");
        conn.execute_batch(schema::SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
        current_version = 1;
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        tracing::info!("running migration to v{version}");
        run_migration(conn, version)?;
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(())
}

fn run_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        2 => conn.execute_batch(schema::SCHEMA_V2)?,
        other => {
            return Err(DbError::Migration(format!(
                "unknown migration version: {other}"
            )))
        }
    }
    Ok(())
}
