//! Cache-related MCP tools.
//!
//! Read-only views of the generation store and the mutation queue.

pub mod generations;
pub mod get;
pub mod queue;

pub use generations::generations_impl;
pub use get::{CacheGetParams, get_impl};
pub use queue::queue_impl;
