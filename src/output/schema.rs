//! Database schema definitions for the result database

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track fetch runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per processed item
CREATE TABLE IF NOT EXISTS fetch_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    http_status INTEGER,
    final_url TEXT,
    content_type TEXT,
    content_length INTEGER,
    truncated INTEGER NOT NULL DEFAULT 0,
    elapsed_ms INTEGER,
    bytes_per_sec INTEGER,
    message TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fetch_results_run ON fetch_results(run_id);
CREATE INDEX IF NOT EXISTS idx_fetch_results_status ON fetch_results(status);
CREATE INDEX IF NOT EXISTS idx_fetch_results_url ON fetch_results(url);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
