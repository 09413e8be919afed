//! In-memory similarity index backend.
//!
//! Reference implementation of `IndexBackend`: exact brute-force cosine
//! search over HashMaps protected by an RwLock.
//!
//! ## Limitations
//!
//! - **Linear scan**: every query touches every entry of the collection.
//! - **No persistence**: dropping the last handle drops the data.
//!
//! Clones share the same storage, so a test can keep a handle to inspect
//! what the graph wrote through its own copy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::embedding::cosine_similarity;
use super::{IndexBackend, IndexEntry, IndexError, SearchHit};

/// In-memory, collection-scoped vector store.
#[derive(Clone, Default)]
pub struct MemoryIndex {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    collections: RwLock<HashMap<String, HashMap<String, IndexEntry>>>,
    /// When set, every call fails with `Unavailable` (simulated outage).
    offline: AtomicBool,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.offline.store(!available, Ordering::Relaxed);
    }

    /// Names of all collections, sorted.
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn ensure_online(&self) -> Result<(), IndexError> {
        if self.inner.offline.load(Ordering::Relaxed) {
            return Err(IndexError::Unavailable("memory index is offline".into()));
        }
        Ok(())
    }
}

impl IndexBackend for MemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    fn heartbeat(&self) -> Result<(), IndexError> {
        self.ensure_online()
    }

    fn create_collection(&self, collection: &str) -> Result<(), IndexError> {
        self.ensure_online()?;
        self.inner.collections.write().entry(collection.to_string()).or_default();
        Ok(())
    }

    fn drop_collection(&self, collection: &str) -> Result<(), IndexError> {
        self.ensure_online()?;
        self.inner.collections.write().remove(collection);
        Ok(())
    }

    fn add(&self, collection: &str, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        self.ensure_online()?;
        let mut collections = self.inner.collections.write();
        let store = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::UnknownCollection(collection.to_string()))?;
        for entry in entries {
            store.insert(entry.id.clone(), entry);
        }
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<IndexEntry>, IndexError> {
        self.ensure_online()?;
        let collections = self.inner.collections.read();
        let store = collections
            .get(collection)
            .ok_or_else(|| IndexError::UnknownCollection(collection.to_string()))?;
        Ok(store.get(id).cloned())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool, IndexError> {
        self.ensure_online()?;
        let mut collections = self.inner.collections.write();
        let store = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::UnknownCollection(collection.to_string()))?;
        Ok(store.remove(id).is_some())
    }

    fn count(&self, collection: &str) -> Result<usize, IndexError> {
        self.ensure_online()?;
        let collections = self.inner.collections.read();
        collections
            .get(collection)
            .map(HashMap::len)
            .ok_or_else(|| IndexError::UnknownCollection(collection.to_string()))
    }

    fn query_by_vector(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        self.ensure_online()?;
        let collections = self.inner.collections.read();
        let store = collections
            .get(collection)
            .ok_or_else(|| IndexError::UnknownCollection(collection.to_string()))?;

        let mut hits: Vec<SearchHit> = store
            .values()
            .map(|entry| SearchHit {
                id: entry.id.clone(),
                metadata: entry.metadata.clone(),
                document: entry.document.clone(),
                distance: 1.0 - cosine_similarity(vector, &entry.vector),
            })
            .collect();

        // Ties broken by id so results do not depend on HashMap order.
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EntryMetadata;

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.into(),
            vector,
            metadata: EntryMetadata {
                name: id.into(),
                description: String::new(),
                entity_type: "Test".into(),
                aliases: None,
            },
            document: format!("{id}: "),
        }
    }

    fn seeded() -> MemoryIndex {
        let idx = MemoryIndex::new();
        idx.create_collection("c").unwrap();
        idx.add("c", vec![
            entry("east", vec![1.0, 0.0]),
            entry("north", vec![0.0, 1.0]),
            entry("west", vec![-1.0, 0.0]),
        ]).unwrap();
        idx
    }

    #[test]
    fn test_query_orders_by_ascending_distance() {
        let idx = seeded();
        let hits = idx.query_by_vector("c", &[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["east", "north", "west"]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[2].distance, 2.0);
    }

    #[test]
    fn test_query_truncates_to_k() {
        let idx = seeded();
        assert_eq!(idx.query_by_vector("c", &[0.0, 1.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn test_add_replaces_existing_id() {
        let idx = seeded();
        idx.add("c", vec![entry("east", vec![0.0, 1.0])]).unwrap();
        assert_eq!(idx.count("c").unwrap(), 3);
        let stored = idx.get("c", "east").unwrap().unwrap();
        assert_eq!(stored.vector, vec![0.0, 1.0]);
    }

    #[test]
    fn test_delete_reports_presence() {
        let idx = seeded();
        assert!(idx.delete("c", "north").unwrap());
        assert!(!idx.delete("c", "north").unwrap());
        assert_eq!(idx.count("c").unwrap(), 2);
    }

    #[test]
    fn test_collections_are_isolated() {
        let idx = seeded();
        idx.create_collection("other").unwrap();
        assert_eq!(idx.count("other").unwrap(), 0);
        assert!(idx.query_by_vector("other", &[1.0, 0.0], 5).unwrap().is_empty());
        assert_eq!(idx.collections(), vec!["c".to_string(), "other".to_string()]);
    }

    #[test]
    fn test_unknown_collection() {
        let idx = MemoryIndex::new();
        assert!(matches!(idx.count("missing"), Err(IndexError::UnknownCollection(_))));
        assert!(idx.drop_collection("missing").is_ok());
    }

    #[test]
    fn test_offline_backend_fails_every_call() {
        let idx = seeded();
        idx.set_available(false);
        assert!(matches!(idx.heartbeat(), Err(IndexError::Unavailable(_))));
        assert!(matches!(idx.query_by_vector("c", &[1.0, 0.0], 1), Err(IndexError::Unavailable(_))));
        idx.set_available(true);
        assert_eq!(idx.count("c").unwrap(), 3);
    }

    #[test]
    fn test_clones_share_storage() {
        let idx = seeded();
        let handle = idx.clone();
        idx.delete("c", "east").unwrap();
        assert_eq!(handle.count("c").unwrap(), 2);
    }
}
