//! MemoryBackend - In-process fallback store
//!
//! TigerStyle: Insertion-ordered collections behind an async lock. Data does
//! not survive a restart.
//!
//! Every write is a self-contained append or upsert under the write lock, so
//! concurrent writers never lose each other's documents. Insertion order
//! reflects lock acquisition order, not call order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::backend::DocumentBackend;
use crate::constants::{MEMORY_ID_PREFIX, SETTINGS_COLLECTION, SETTINGS_DOCUMENT_ID};
use crate::document::{assert_collection_name, merge_fields, Document, DocumentPath, Fields, Query};
use crate::error::StoreResult;
use crate::settings::default_settings;

/// In-memory document store.
#[derive(Debug)]
pub struct MemoryBackend {
    /// Documents by collection, in insertion order
    collections: RwLock<HashMap<String, Vec<Document>>>,
    /// Sequence for synthesized identifiers
    sequence: AtomicU64,
}

impl MemoryBackend {
    /// Create a store pre-seeded with the default settings document.
    #[must_use]
    pub fn new() -> Self {
        let mut collections = HashMap::new();
        collections.insert(
            SETTINGS_COLLECTION.to_string(),
            vec![Document::new(SETTINGS_DOCUMENT_ID, default_settings())],
        );
        Self {
            collections: RwLock::new(collections),
            sequence: AtomicU64::new(0),
        }
    }

    /// Create a store with no documents at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Synthesize an identifier: `mock-<unix-millis>-<sequence>`.
    fn next_id(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}{}-{}",
            MEMORY_ID_PREFIX,
            Utc::now().timestamp_millis(),
            sequence
        )
    }

    /// Append a document with a synthesized identifier.
    pub async fn insert(&self, collection: &str, fields: Fields) -> Document {
        assert_collection_name(collection);

        let document = Document::new(self.next_id(), fields);
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());

        document
    }

    /// Read a collection, sorted and limited as the query says.
    pub async fn list(&self, query: &Query) -> Vec<Document> {
        let mut documents = {
            let collections = self.collections.read().await;
            collections
                .get(query.collection_name())
                .cloned()
                .unwrap_or_default()
        };
        query.apply(&mut documents);
        documents
    }

    /// Find one document.
    pub async fn find(&self, path: &DocumentPath) -> Option<Document> {
        let collections = self.collections.read().await;
        collections
            .get(path.collection())
            .and_then(|docs| docs.iter().find(|d| d.id == path.id()))
            .cloned()
    }

    /// Insert or update one document.
    pub async fn upsert(&self, path: &DocumentPath, fields: Fields, merge: bool) {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(path.collection().to_string()).or_default();

        match documents.iter_mut().find(|d| d.id == path.id()) {
            Some(existing) if merge => merge_fields(&mut existing.fields, fields),
            Some(existing) => existing.fields = fields,
            None => documents.push(Document::new(path.id(), fields)),
        }
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, Vec::len)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<Document> {
        Ok(self.insert(collection, fields).await)
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        Ok(self.list(query).await)
    }

    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        Ok(self.find(path).await)
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> StoreResult<()> {
        self.upsert(path, fields, merge).await;
        Ok(())
    }

    async fn probe(&self) -> StoreResult<()> {
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SortDirection;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_seeded_settings() {
        let memory = MemoryBackend::new();
        let doc = tokio_test::block_on(memory.find(&DocumentPath::settings()));
        let doc = doc.expect("settings should be seeded");
        assert_eq!(doc.fields, default_settings());
    }

    #[test]
    fn test_empty_has_no_settings() {
        let memory = MemoryBackend::empty();
        let doc = tokio_test::block_on(memory.find(&DocumentPath::settings()));
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_insert_assigns_distinct_ids() {
        let memory = MemoryBackend::new();
        let a = memory.insert("interventions", fields(json!({"n": 1}))).await;
        let b = memory.insert("interventions", fields(json!({"n": 2}))).await;

        assert!(a.id.starts_with(MEMORY_ID_PREFIX));
        assert_ne!(a.id, b.id);
        assert_eq!(memory.count("interventions").await, 2);
    }

    #[tokio::test]
    async fn test_list_sorts_descending() {
        let memory = MemoryBackend::new();
        for at in ["2025-03-01", "2025-03-03", "2025-03-02"] {
            memory.insert("interventions", fields(json!({"approvedAt": at}))).await;
        }

        let docs = memory
            .list(&Query::collection("interventions").order_by("approvedAt", SortDirection::Descending))
            .await;
        let dates: Vec<&str> = docs.iter().filter_map(|d| d.get_str("approvedAt")).collect();
        assert_eq!(dates, vec!["2025-03-03", "2025-03-02", "2025-03-01"]);
    }

    #[tokio::test]
    async fn test_list_absent_collection_is_empty() {
        let memory = MemoryBackend::new();
        assert!(memory.list(&Query::collection("nothing_here")).await.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_merge_and_replace() {
        let memory = MemoryBackend::new();
        let path = DocumentPath::parse("customers/c1").unwrap();

        memory.upsert(&path, fields(json!({"a": 1})), true).await;
        memory.upsert(&path, fields(json!({"b": 2})), true).await;
        assert_eq!(
            Value::Object(memory.find(&path).await.unwrap().fields),
            json!({"a": 1, "b": 2})
        );

        memory.upsert(&path, fields(json!({"c": 3})), false).await;
        assert_eq!(
            Value::Object(memory.find(&path).await.unwrap().fields),
            json!({"c": 3})
        );
        assert_eq!(memory.count("customers").await, 1);
    }
}
