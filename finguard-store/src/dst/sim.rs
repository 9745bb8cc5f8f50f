//! SimBackend - A "real" backend that fails on purpose
//!
//! TigerStyle: Stands in for Firestore or Postgres in tests. Stores documents
//! in its own memory, separate from the facade's fallback store, so tests can
//! tell which side served a call.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::backend::DocumentBackend;
use crate::document::{Document, DocumentPath, Fields, Query};
use crate::error::StoreResult;
use crate::memory::MemoryBackend;

use super::config::SimConfig;
use super::fault::{FaultConfig, FaultInjector, SimOperation};

/// Simulated document backend with fault injection and call counters.
#[derive(Debug)]
pub struct SimBackend {
    store: MemoryBackend,
    faults: FaultInjector,
    calls: [AtomicU64; 5],
    failures: AtomicU64,
}

impl SimBackend {
    /// Create an empty simulated backend.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            store: MemoryBackend::empty(),
            faults: FaultInjector::new(config.seed),
            calls: Default::default(),
            failures: AtomicU64::new(0),
        }
    }

    /// Register a fault.
    #[must_use]
    pub fn with_fault(mut self, fault: FaultConfig) -> Self {
        self.faults.add(fault);
        self
    }

    /// Number of times an operation was attempted (faulted or not).
    #[must_use]
    pub fn calls(&self, operation: SimOperation) -> u64 {
        self.calls[Self::slot(operation)].load(Ordering::SeqCst)
    }

    /// Total attempts across operations other than `probe`.
    #[must_use]
    pub fn data_calls(&self) -> u64 {
        [
            SimOperation::Add,
            SimOperation::Query,
            SimOperation::Get,
            SimOperation::Set,
        ]
        .iter()
        .map(|op| self.calls(*op))
        .sum()
    }

    /// Number of injected failures.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Documents the backend itself holds for a collection.
    pub async fn stored(&self, collection: &str) -> usize {
        self.store.count(collection).await
    }

    fn slot(operation: SimOperation) -> usize {
        match operation {
            SimOperation::Add => 0,
            SimOperation::Query => 1,
            SimOperation::Get => 2,
            SimOperation::Set => 3,
            SimOperation::Probe => 4,
        }
    }

    /// Count the attempt and fail it if a fault fires.
    fn enter(&self, operation: SimOperation) -> StoreResult<()> {
        self.calls[Self::slot(operation)].fetch_add(1, Ordering::SeqCst);
        match self.faults.check(operation) {
            Some(err) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(operation = operation.as_str(), error = %err, "injected fault");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentBackend for SimBackend {
    fn name(&self) -> &'static str {
        "sim"
    }

    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<Document> {
        self.enter(SimOperation::Add)?;
        Ok(self.store.insert(collection, fields).await)
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.enter(SimOperation::Query)?;
        Ok(self.store.list(query).await)
    }

    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        self.enter(SimOperation::Get)?;
        Ok(self.store.find(path).await)
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> StoreResult<()> {
        self.enter(SimOperation::Set)?;
        self.store.upsert(path, fields, merge).await;
        Ok(())
    }

    async fn probe(&self) -> StoreResult<()> {
        self.enter(SimOperation::Probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::FaultType;
    use crate::error::BackendErrorKind;

    #[tokio::test]
    async fn test_no_faults_behaves_like_store() {
        let sim = SimBackend::new(SimConfig::with_seed(3));
        let doc = sim.add("flagged_customers", Fields::new()).await.unwrap();
        let path = DocumentPath::new("flagged_customers", &doc.id).unwrap();

        assert_eq!(sim.get(&path).await.unwrap().map(|d| d.id), Some(doc.id));
        assert_eq!(sim.stored("flagged_customers").await, 1);
        assert_eq!(sim.calls(SimOperation::Add), 1);
        assert_eq!(sim.calls(SimOperation::Get), 1);
        assert_eq!(sim.failures(), 0);
    }

    #[tokio::test]
    async fn test_fault_counts_attempt() {
        let sim = SimBackend::new(SimConfig::with_seed(3))
            .with_fault(FaultConfig::new(FaultType::PermissionDenied, 1.0).on_query());

        let err = sim.query(&Query::collection("interventions")).await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::PermissionDenied);
        assert_eq!(sim.calls(SimOperation::Query), 1);
        assert_eq!(sim.failures(), 1);
        assert!(sim.probe().await.is_ok());
    }
}
