//! Cached response entries.
//!
//! An entry is a snapshot of one response stored under a generation. Puts
//! into a generation that no longer exists are dropped, so a late write
//! racing a reaper never resurrects a deleted generation.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::{Error, GenerationKind, HttpResponse, ResponseSource};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A response snapshot as stored in a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub generation: String,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: String,
}

impl CachedEntry {
    /// Rehydrate the stored snapshot as a response served from cache.
    pub fn into_response(self) -> HttpResponse {
        HttpResponse { status: self.status, headers: self.headers, body: self.body, source: ResponseSource::Cache }
    }
}

fn encode_headers(headers: &[(String, String)]) -> Result<String, Error> {
    serde_json::to_string(headers).map_err(|e| Error::CorruptEntry(e.to_string()))
}

fn decode_headers(json: &str) -> Result<Vec<(String, String)>, Error> {
    serde_json::from_str(json).map_err(|e| Error::CorruptEntry(e.to_string()))
}

const UPSERT_ENTRY: &str = "INSERT INTO entries (generation, key_hash, url, method, status, headers_json, body, stored_at)
     SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
     WHERE EXISTS (SELECT 1 FROM generations WHERE name = ?1)
     ON CONFLICT(generation, key_hash) DO UPDATE SET
        url = excluded.url,
        method = excluded.method,
        status = excluded.status,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

impl CacheDb {
    /// Store a GET response under `url` in `generation`.
    ///
    /// Uses UPSERT semantics (last writer wins). Returns false when the
    /// generation does not exist and the write was discarded.
    pub async fn put_entry(&self, generation: &str, url: &str, response: &HttpResponse) -> Result<bool, Error> {
        let generation = generation.to_string();
        let url = url.to_string();
        let key = compute_entry_key("GET", &url);
        let headers_json = encode_headers(&response.headers)?;
        let status = response.status;
        let body = response.body.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let written = conn.execute(
                    UPSERT_ENTRY,
                    params![generation, key, url, "GET", status, headers_json, body.as_ref(), stored_at],
                )?;
                Ok(written > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Create `generation` and fill it with exactly `entries` in one transaction.
    ///
    /// Rows already in the generation are replaced. Either every entry is
    /// written or none is. Returns the number of entries written.
    pub async fn populate_generation(
        &self, generation: &str, kind: GenerationKind, entries: Vec<(String, HttpResponse)>,
    ) -> Result<usize, Error> {
        let generation = generation.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let mut rows = Vec::with_capacity(entries.len());
        for (url, response) in entries {
            let key = compute_entry_key("GET", &url);
            let headers_json = encode_headers(&response.headers)?;
            rows.push((key, url, response.status, headers_json, response.body));
        }

        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, kind, created_at) VALUES (?1, ?2, ?3)",
                    params![generation, kind.as_str(), now],
                )?;
                tx.execute("DELETE FROM entries WHERE generation = ?1", params![generation])?;

                let mut written = 0;
                for (key, url, status, headers_json, body) in &rows {
                    written += tx.execute(
                        UPSERT_ENTRY,
                        params![generation, key, url, "GET", status, headers_json, body.as_ref(), now],
                    )?;
                }

                tx.commit()?;
                Ok(written)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the entry stored under `url` in one generation.
    pub async fn match_entry(&self, generation: &str, url: &str) -> Result<Option<CachedEntry>, Error> {
        let generation = generation.to_string();
        let key = compute_entry_key("GET", url);
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT generation, url, method, status, headers_json, body, stored_at
                     FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u16>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                });

                match result {
                    Ok((generation, url, method, status, headers_json, body, stored_at)) => Ok(Some(CachedEntry {
                        generation,
                        url,
                        method,
                        status,
                        headers: decode_headers(&headers_json)?,
                        body: Bytes::from(body),
                        stored_at,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Look up `url` across `generations`, returning the first hit in order.
    pub async fn match_any(&self, generations: &[&str], url: &str) -> Result<Option<CachedEntry>, Error> {
        for generation in generations {
            if let Some(entry) = self.match_entry(generation, url).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Count the entries stored in a generation.
    pub async fn count_entries(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
