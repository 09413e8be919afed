//! Entity (node) in the knowledge graph.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Canonical record for one real-world thing (company, person, sector...).
///
/// `name` is the unique key inside one graph. `similarity_index_id` is a
/// weak back-reference into the similarity index; the graph never owns the
/// index entry through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// Alternate names. Order is irrelevant, so a sorted set keeps
    /// embeddings and exports deterministic.
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_index_id: Option<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: BTreeSet::new(),
            description: String::new(),
            entity_type: entity_type.into(),
            similarity_index_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn with_aliases(mut self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Case-insensitive comparison against the canonical name.
    pub fn name_matches(&self, other: &str) -> bool {
        self.name.to_lowercase() == other.to_lowercase()
    }

    /// Case-insensitive alias lookup.
    pub fn has_alias(&self, candidate: &str) -> bool {
        let needle = candidate.to_lowercase();
        self.aliases.iter().any(|a| a.to_lowercase() == needle)
    }

    /// Merge another record's aliases into this one. The other record's
    /// canonical name becomes an alias unless it equals ours.
    pub fn absorb_aliases(&mut self, other: &Entity) {
        if other.name != self.name {
            self.aliases.insert(other.name.clone());
        }
        self.aliases.extend(other.aliases.iter().filter(|a| **a != self.name).cloned());
    }
}
