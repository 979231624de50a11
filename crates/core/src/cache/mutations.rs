//! Durable queue of mutating requests awaiting replay.
//!
//! Records are drained in insertion order. A record leaves the queue only
//! through `remove_mutation`, after its replay succeeded.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

/// A write request that failed while offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Stable identifier; replay is at-least-once, consumers dedupe on it.
    pub id: String,
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub created_at: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Unix milliseconds before which the record is not retried.
    pub next_attempt_at: Option<i64>,
}

impl MutationRecord {
    pub fn new(url: &str, method: &str, headers: Vec<(String, String)>, body: Option<Vec<u8>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            method: method.to_ascii_uppercase(),
            headers,
            body,
            created_at: chrono::Utc::now().to_rfc3339(),
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
        }
    }

    /// Whether the record may be replayed at `now_ms`.
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.next_attempt_at.is_none_or(|at| at <= now_ms)
    }
}

impl CacheDb {
    /// Append a record to the queue.
    pub async fn enqueue_mutation(&self, record: &MutationRecord) -> Result<(), Error> {
        let record = record.clone();
        let headers_json =
            serde_json::to_string(&record.headers).map_err(|e| Error::InvalidInput(e.to_string()))?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO mutations (id, url, method, headers_json, body, created_at, attempts, last_error, next_attempt_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        &record.id,
                        &record.url,
                        &record.method,
                        headers_json,
                        &record.body,
                        &record.created_at,
                        record.attempts,
                        &record.last_error,
                        &record.next_attempt_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All queued records in FIFO order.
    pub async fn pending_mutations(&self) -> Result<Vec<MutationRecord>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<MutationRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, url, method, headers_json, body, created_at, attempts, last_error, next_attempt_at
                     FROM mutations ORDER BY seq ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        MutationRecord {
                            id: row.get(0)?,
                            url: row.get(1)?,
                            method: row.get(2)?,
                            headers: Vec::new(),
                            body: row.get(4)?,
                            created_at: row.get(5)?,
                            attempts: row.get(6)?,
                            last_error: row.get(7)?,
                            next_attempt_at: row.get(8)?,
                        },
                        row.get::<_, String>(3)?,
                    ))
                })?;

                let mut records = Vec::new();
                for row in rows {
                    let (mut record, headers_json) = row?;
                    record.headers =
                        serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
                    records.push(record);
                }
                Ok(records)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a record after a successful replay.
    ///
    /// Returns true if the record was still queued.
    pub async fn remove_mutation(&self, id: &str) -> Result<bool, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM mutations WHERE id = ?1", params![id])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Record a failed replay attempt, keeping the record queued.
    pub async fn record_mutation_failure(
        &self, id: &str, error: &str, next_attempt_at: Option<i64>,
    ) -> Result<(), Error> {
        let id = id.to_string();
        let error = error.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "UPDATE mutations
                     SET attempts = attempts + 1, last_error = ?2, next_attempt_at = ?3
                     WHERE id = ?1",
                    params![id, error, next_attempt_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of queued records.
    pub async fn count_mutations(&self) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM mutations", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
