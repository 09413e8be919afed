//! Ranked paths and the weight combinator used to score them.

use serde::{Deserialize, Serialize};

/// How edge weights are folded, left to right, into a path weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathWeighting {
    /// Weights are probability-like importance scores: `w1 * w2 * ...`.
    #[default]
    Product,
    /// Weights are additive costs/strengths: `w1 + w2 + ...`.
    Sum,
}

impl PathWeighting {
    /// Weight of the empty (single-node) path.
    pub fn identity(self) -> f64 {
        match self {
            PathWeighting::Product => 1.0,
            PathWeighting::Sum => 0.0,
        }
    }

    pub fn combine(self, acc: f64, weight: f64) -> f64 {
        match self {
            PathWeighting::Product => acc * weight,
            PathWeighting::Sum => acc + weight,
        }
    }

    /// Fold a sequence of edge weights.
    pub fn accumulate(self, weights: impl IntoIterator<Item = f64>) -> f64 {
        weights.into_iter().fold(self.identity(), |acc, w| self.combine(acc, w))
    }
}

/// A simple path through the graph with its accumulated weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPath {
    /// Entity names from start to target. Never contains a repeated name.
    pub nodes: Vec<String>,
    pub weight: f64,
}

impl RankedPath {
    /// Number of hops.
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn start(&self) -> Option<&str> {
        self.nodes.first().map(String::as_str)
    }

    pub fn end(&self) -> Option<&str> {
        self.nodes.last().map(String::as_str)
    }
}
