//! SQL schema definitions.

/// Schema v1.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS params (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS task_archive (
    task_id BLOB PRIMARY KEY,
    creator BLOB NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('expired', 'aggregated')),
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_archive_created ON task_archive(created_at);
"#;

/// Schema v2: node progress (height, task-id sequence) kept across restarts.
pub const SCHEMA_V2: &str = r#"
CREATE TABLE IF NOT EXISTS node_state (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL
);
"#;
