//! SQLite-backed cache generations and offline mutation queue.
//!
//! This module provides the agent's only persistent state, using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named cache generations holding response snapshots
//! - Entry keys derived from SHA-256 of method and URL
//! - Atomic per-entry puts and single-transaction generation population/deletion
//! - A durable FIFO queue of mutations awaiting replay
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod mutations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use generations::GenerationInfo;
pub use mutations::MutationRecord;
