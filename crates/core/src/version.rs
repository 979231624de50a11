//! Cache generation naming.
//!
//! A generation is one versioned store of cached responses. Each deployed
//! build owns exactly two: a static generation filled by the precache and a
//! dynamic generation filled at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Which of a build's two generations a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Static,
    Dynamic,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Static => "static",
            GenerationKind::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current pair of generation identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generations {
    static_name: String,
    dynamic_name: String,
}

impl Generations {
    /// Build the identifiers for a version tag, e.g. `static-v3` / `dynamic-v3`.
    pub fn new(prefix: &str, version: &str) -> Self {
        Self {
            static_name: format!("{prefix}{}-{version}", GenerationKind::Static),
            dynamic_name: format!("{prefix}{}-{version}", GenerationKind::Dynamic),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.cache_prefix, &config.version)
    }

    pub fn static_name(&self) -> &str {
        &self.static_name
    }

    pub fn dynamic_name(&self) -> &str {
        &self.dynamic_name
    }

    /// Lookup order for cache reads: the precached shell first.
    pub fn lookup_order(&self) -> [&str; 2] {
        [&self.static_name, &self.dynamic_name]
    }

    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_name || name == self.dynamic_name
    }
}
