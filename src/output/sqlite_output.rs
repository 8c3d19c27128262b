//! SQLite-based result sink implementation
//!
//! Every processed item becomes one row in `fetch_results`, tagged with the
//! run opened when the sink was created.

use super::schema::initialize_schema;
use super::traits::{OutputResult, ResultSink, StatusRecord};
use crate::fetch::FetchedContent;
use crate::state::FetchStatus;
use crate::SumiError;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;

/// Lifecycle status of a run row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Failed => "failed",
        }
    }
}

/// SQLite-backed [`ResultSink`]
pub struct SqliteSink {
    conn: Mutex<Connection>,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database and starts a new run
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `config_hash` - Hash of the configuration the run uses
    pub fn new(path: &Path, config_hash: &str) -> Result<Self, SumiError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        Self::with_connection(conn, config_hash)
    }

    /// Creates an in-memory database
    pub fn new_in_memory(config_hash: &str) -> Result<Self, SumiError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn, config_hash)
    }

    fn with_connection(conn: Connection, config_hash: &str) -> Result<Self, SumiError> {
        initialize_schema(&conn)?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![
                Utc::now().to_rfc3339(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        let run_id = conn.last_insert_rowid();
        Ok(Self {
            conn: Mutex::new(conn),
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Marks the run finished with the given status
    pub fn complete_run(&self, status: RunStatus) -> OutputResult<()> {
        self.conn.lock().execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), Utc::now().to_rfc3339(), self.run_id],
        )?;
        Ok(())
    }

    /// Counts this run's rows per outcome
    pub fn status_counts(&self) -> OutputResult<HashMap<FetchStatus, u64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM fetch_results WHERE run_id = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map(params![self.run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = FetchStatus::from_db_string(&status) {
                counts.insert(status, count as u64);
            }
        }
        Ok(counts)
    }
}

impl ResultSink for SqliteSink {
    fn record_fetched(&self, content: &FetchedContent) -> OutputResult<()> {
        self.conn.lock().execute(
            "INSERT INTO fetch_results
                (run_id, url, status, http_status, final_url, content_type, content_length,
                 truncated, elapsed_ms, bytes_per_sec, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                self.run_id,
                content.url,
                FetchStatus::Fetched.to_db_string(),
                content.status_code,
                content.final_url,
                content.content_type,
                content.content.len() as i64,
                content.truncated,
                content.elapsed.as_millis() as i64,
                content.bytes_per_sec as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn record_status(&self, record: &StatusRecord) -> OutputResult<()> {
        self.conn.lock().execute(
            "INSERT INTO fetch_results (run_id, url, status, http_status, message, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.run_id,
                record.url,
                record.status.to_db_string(),
                record.http_status,
                record.message,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn content(url: &str) -> FetchedContent {
        FetchedContent {
            url: url.to_string(),
            final_url: url.to_string(),
            status_code: 200,
            content_type: "text/html".to_string(),
            headers: vec![],
            content: b"<html></html>".to_vec(),
            elapsed: Duration::from_millis(20),
            bytes_per_sec: 650,
            truncated: false,
        }
    }

    #[test]
    fn test_records_fetched_and_status() {
        let sink = SqliteSink::new_in_memory("hash").unwrap();
        sink.record_fetched(&content("https://example.com/")).unwrap();
        sink.record_status(&StatusRecord::new(
            "https://example.com/private",
            FetchStatus::SkippedBlocked,
            "disallowed by robots.txt",
        ))
        .unwrap();

        let counts = sink.status_counts().unwrap();
        assert_eq!(counts.get(&FetchStatus::Fetched), Some(&1));
        assert_eq!(counts.get(&FetchStatus::SkippedBlocked), Some(&1));
    }

    #[test]
    fn test_complete_run() {
        let sink = SqliteSink::new_in_memory("hash").unwrap();
        sink.complete_run(RunStatus::Completed).unwrap();

        let conn = sink.conn.lock();
        let (status, finished): (String, Option<String>) = conn
            .query_row(
                "SELECT status, finished_at FROM runs WHERE id = ?1",
                params![sink.run_id()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "completed");
        assert!(finished.is_some());
    }

    #[test]
    fn test_runs_are_separate_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fetch.db");

        let first = SqliteSink::new(&path, "a").unwrap();
        first.record_fetched(&content("https://example.com/1")).unwrap();
        drop(first);

        let second = SqliteSink::new(&path, "b").unwrap();
        assert!(second.run_id() > 1);
        assert!(second.status_counts().unwrap().is_empty());
    }
}
