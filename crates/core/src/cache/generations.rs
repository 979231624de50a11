//! Cache generation lifecycle operations.
//!
//! Generations are created at install/activate and destroyed only by
//! `retain_generations`, which deletes every generation outside the
//! current pair in one transaction.

use super::connection::CacheDb;
use crate::{Error, GenerationKind};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// A live generation with its entry count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub kind: String,
    pub created_at: String,
    pub entries: u64,
}

impl CacheDb {
    /// Create a generation if it does not exist yet.
    ///
    /// Returns true when a new generation was created.
    pub async fn create_generation(&self, name: &str, kind: GenerationKind) -> Result<bool, Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let created = conn.execute(
                    "INSERT OR IGNORE INTO generations (name, kind, created_at) VALUES (?1, ?2, ?3)",
                    params![name, kind.as_str(), now],
                )?;
                Ok(created > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a generation exists.
    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// List all generations present at rest, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<GenerationInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.kind, g.created_at,
                            (SELECT COUNT(*) FROM entries e WHERE e.generation = g.name)
                     FROM generations g
                     ORDER BY g.created_at ASC, g.name ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(GenerationInfo {
                        name: row.get(0)?,
                        kind: row.get(1)?,
                        created_at: row.get(2)?,
                        entries: row.get::<_, i64>(3)? as u64,
                    })
                })?;

                let mut generations = Vec::new();
                for row in rows {
                    generations.push(row?);
                }
                Ok(generations)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all generations present at rest.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        Ok(self.list_generations().await?.into_iter().map(|g| g.name).collect())
    }

    /// Delete a single generation and all of its entries.
    ///
    /// Returns true if the generation existed.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE generation = ?1", params![name])?;
                let deleted = tx.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every generation whose name is not in `keep`.
    ///
    /// Runs in one transaction; returns the deleted names.
    pub async fn retain_generations(&self, keep: &[&str]) -> Result<Vec<String>, Error> {
        let keep: Vec<String> = keep.iter().map(|s| s.to_string()).collect();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;

                let stale: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT name FROM generations ORDER BY name")?;
                    let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
                    let mut stale = Vec::new();
                    for name in names {
                        let name = name?;
                        if !keep.contains(&name) {
                            stale.push(name);
                        }
                    }
                    stale
                };

                for name in &stale {
                    tx.execute("DELETE FROM entries WHERE generation = ?1", params![name])?;
                    tx.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                }

                tx.commit()?;
                Ok(stale)
            })
            .await
            .map_err(Error::from)
    }
}
