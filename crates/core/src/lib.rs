//! Core types and shared functionality for tether.
//!
//! This crate provides:
//! - Cache generation store and offline mutation queue on a SQLite backend
//! - Request/response model shared by the agent and its hosts
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod version;

pub use cache::{CacheDb, CachedEntry, GenerationInfo, MutationRecord};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Destination, HttpResponse, RequestDescriptor, RequestMode, ResponseSource};
pub use version::{GenerationKind, Generations};
