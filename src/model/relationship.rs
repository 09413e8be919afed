//! Relationship (edge) in the knowledge graph.

use serde::{Deserialize, Serialize};

/// A directed, weighted connection between two entities, referenced by
/// canonical name.
///
/// `weight` is an importance score. Source data keeps it within `[0, 1]`,
/// but the store only requires it to be finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start: String,
    pub end: String,
    pub weight: f64,
}

impl Relationship {
    pub fn new(start: impl Into<String>, end: impl Into<String>, weight: f64) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            start: start.into(),
            end: end.into(),
            weight,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The mirror edge: same title, description and weight, endpoints swapped.
    pub fn reversed(&self) -> Self {
        Self {
            title: self.title.clone(),
            description: self.description.clone(),
            start: self.end.clone(),
            end: self.start.clone(),
            weight: self.weight,
        }
    }

    /// True if this edge runs `start -> end`.
    pub fn links(&self, start: &str, end: &str) -> bool {
        self.start == start && self.end == end
    }

    /// True if either endpoint is `name`.
    pub fn touches(&self, name: &str) -> bool {
        self.start == name || self.end == name
    }

    /// The "other" endpoint from the given entity.
    pub fn other_end(&self, from: &str) -> Option<&str> {
        if from == self.start {
            Some(self.end.as_str())
        } else if from == self.end {
            Some(self.start.as_str())
        } else {
            None
        }
    }
}
