//! Configuration for the graph store, duplicate detection and similarity index.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```json
//! { "graph": { "bidirectional": true }, "dedup": { "similarity_threshold": 0.8 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::PathWeighting;
use crate::{Error, Result};

/// Graph-level settings fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Mirror every inserted/deleted edge in the reverse direction.
    pub bidirectional: bool,
    /// Combinator folding edge weights into a path weight.
    pub path_weighting: PathWeighting,
}

impl GraphConfig {
    pub fn bidirectional() -> Self {
        Self { bidirectional: true, ..Self::default() }
    }

    pub fn with_path_weighting(mut self, weighting: PathWeighting) -> Self {
        self.path_weighting = weighting;
        self
    }
}

/// Duplicate-detection settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Minimum `1 - distance` at which a vector hit counts as a duplicate (inclusive).
    pub similarity_threshold: f64,
    /// Number of nearest neighbours fetched from the index.
    pub top_k: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { similarity_threshold: 0.85, top_k: 3 }
    }
}

impl DedupConfig {
    pub fn new(similarity_threshold: f64, top_k: usize) -> Result<Self> {
        let config = Self { similarity_threshold, top_k };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::Config(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be at least 1".into()));
        }
        Ok(())
    }
}

/// Similarity-index collection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Collection that scopes every entry of this graph.
    pub collection: String,
    /// Drop and recreate the collection when opening (test isolation).
    pub reset: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { collection: "nodes".into(), reset: false }
    }
}

impl IndexConfig {
    pub fn new(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), reset: false }
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }
}

/// Aggregate configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub dedup: DedupConfig,
    pub index: IndexConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.dedup.validate()?;
        if self.index.collection.trim().is_empty() {
            return Err(Error::Config("index.collection must not be empty".into()));
        }
        Ok(())
    }
}
