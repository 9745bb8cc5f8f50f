//! ResilientStore - Document store facade with memory fallback
//!
//! TigerStyle: Callers never branch on which backend is active, and never
//! receive an error.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ResilientStore                          │
//! │  add / query / get / set  ──►  Served<T> (never an error)   │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │ real backend (lazy, probed)  │ MemoryBackend (always there) │
//! │ Firestore | Postgres | Sim   │                              │
//! └──────────────────────────────┴──────────────────────────────┘
//!                 ▲
//!          BackendHealth (injectable mode state)
//! ```
//!
//! # Fallback Policy
//!
//! - Resource-absent errors (not found, service disabled) move the store to
//!   [`StoreMode::Fallback`] for the rest of the process, and the call is
//!   retried against memory.
//! - Any other error on a read is served from memory for that call only.
//!   The mode is left alone and the error is returned in [`Served::fault`].
//! - Any other error on a write keeps the write in memory, returns the error
//!   in [`Served::fault`] and moves the store to [`StoreMode::Fallback`], so
//!   later reads see the write.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::backend::DocumentBackend;
use crate::config::{BackendSelection, StoreConfig};
use crate::document::{assert_collection_name, Document, DocumentPath, Fields, Query};
use crate::error::BackendError;
use crate::firestore::FirestoreBackend;
use crate::health::{BackendHealth, ModeTransition, StoreMode, TransitionCause};
use crate::memory::MemoryBackend;
use crate::settings::settings_with_defaults;

#[cfg(feature = "postgres")]
use crate::postgres::PostgresBackend;

// =============================================================================
// Served
// =============================================================================

/// Which store produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// The real backend
    Backend,
    /// The in-memory fallback
    Memory,
}

/// Uniform result of every facade call.
#[derive(Debug, Clone)]
pub struct Served<T> {
    /// The result
    pub value: T,
    /// Where it came from
    pub source: ServedFrom,
    /// Mode change this call caused, if any
    pub transition: Option<ModeTransition>,
    /// Backend failure that forced the memory path, if any
    pub fault: Option<BackendError>,
}

impl<T> Served<T> {
    fn backend(value: T) -> Self {
        Self {
            value,
            source: ServedFrom::Backend,
            transition: None,
            fault: None,
        }
    }

    fn memory(value: T) -> Self {
        Self {
            value,
            source: ServedFrom::Memory,
            transition: None,
            fault: None,
        }
    }

    fn degraded(value: T, fault: BackendError, transition: Option<ModeTransition>) -> Self {
        Self {
            value,
            source: ServedFrom::Memory,
            transition,
            fault: Some(fault),
        }
    }

    /// True only when the real backend served the call.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.source == ServedFrom::Backend
    }

    /// Drop the metadata.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Transform the value, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> Served<U>
    where
        F: FnOnce(T) -> U,
    {
        Served {
            value: f(self.value),
            source: self.source,
            transition: self.transition,
            fault: self.fault,
        }
    }
}

// =============================================================================
// ResilientStore
// =============================================================================

/// How the real backend gets built on first use.
enum Connector {
    /// Build from configuration
    Config(StoreConfig),
    /// Use a prebuilt backend
    Backend(Arc<dyn DocumentBackend>),
}

/// Document store facade over a real backend and an in-memory fallback.
pub struct ResilientStore {
    connector: Connector,
    backend: OnceCell<Option<Arc<dyn DocumentBackend>>>,
    memory: Arc<MemoryBackend>,
    health: BackendHealth,
}

impl ResilientStore {
    /// Build the real backend from configuration on first use.
    #[must_use]
    pub fn from_config(config: StoreConfig, health: BackendHealth) -> Self {
        Self::with_connector(Connector::Config(config), health)
    }

    /// Use a prebuilt real backend (probed on first use).
    #[must_use]
    pub fn with_backend(backend: Arc<dyn DocumentBackend>, health: BackendHealth) -> Self {
        Self::with_connector(Connector::Backend(backend), health)
    }

    /// Never try a real backend.
    #[must_use]
    pub fn memory_only(health: BackendHealth) -> Self {
        Self::from_config(StoreConfig::memory_only(), health)
    }

    /// Replace the fallback store.
    #[must_use]
    pub fn with_memory(mut self, memory: Arc<MemoryBackend>) -> Self {
        self.memory = memory;
        self
    }

    fn with_connector(connector: Connector, health: BackendHealth) -> Self {
        Self {
            connector,
            backend: OnceCell::new(),
            memory: Arc::new(MemoryBackend::new()),
            health,
        }
    }

    /// Mode state shared with whoever injected it.
    #[must_use]
    pub fn health(&self) -> &BackendHealth {
        &self.health
    }

    /// The fallback store.
    #[must_use]
    pub fn memory(&self) -> &Arc<MemoryBackend> {
        &self.memory
    }

    /// True only if the real backend initialized and no fallback has been
    /// triggered.
    #[must_use]
    pub fn is_backend_connected(&self) -> bool {
        self.health.is_backend_connected()
    }

    /// Run first-use initialization now. Idempotent.
    pub async fn initialize(&self) -> StoreMode {
        let _ = self.active_backend().await;
        self.health.mode()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Append a document to a collection.
    ///
    /// # Panics
    /// Panics if the collection name is empty or too long.
    pub async fn collection_add(&self, collection: &str, fields: Fields) -> Served<Document> {
        assert_collection_name(collection);

        if let Some(backend) = self.active_backend().await {
            match backend.add(collection, fields.clone()).await {
                Ok(document) => {
                    debug!(collection, id = %document.id, backend = backend.name(), "document added");
                    return Served::backend(document);
                }
                Err(err) => {
                    let transition = self.absorb_write("collection_add", collection, &err);
                    let document = self.memory.insert(collection, fields).await;
                    return Served::degraded(document, err, transition);
                }
            }
        }

        let document = self.memory.insert(collection, fields).await;
        debug!(collection, id = %document.id, "document added to memory");
        Served::memory(document)
    }

    /// Read a collection, ordered and limited as the query says.
    pub async fn collection_query(&self, query: &Query) -> Served<Vec<Document>> {
        let collection = query.collection_name();

        if let Some(backend) = self.active_backend().await {
            match backend.query(query).await {
                Ok(documents) => return Served::backend(documents),
                Err(err) => {
                    let transition = self.absorb_read("collection_query", collection, &err);
                    let documents = self.memory.list(query).await;
                    return Served::degraded(documents, err, transition);
                }
            }
        }

        Served::memory(self.memory.list(query).await)
    }

    /// Read one document. `None` means not found.
    pub async fn document_get(&self, path: &DocumentPath) -> Served<Option<Document>> {
        if let Some(backend) = self.active_backend().await {
            match backend.get(path).await {
                Ok(document) => return Served::backend(document),
                Err(err) => {
                    let transition = self.absorb_read("document_get", &path.to_string(), &err);
                    let document = self.memory.find(path).await;
                    return Served::degraded(document, err, transition);
                }
            }
        }

        Served::memory(self.memory.find(path).await)
    }

    /// Write one document, merging into the existing one when `merge` is set.
    pub async fn document_set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Served<()> {
        if let Some(backend) = self.active_backend().await {
            match backend.set(path, fields.clone(), merge).await {
                Ok(()) => {
                    debug!(path = %path, merge, backend = backend.name(), "document written");
                    return Served::backend(());
                }
                Err(err) => {
                    let transition = self.absorb_write("document_set", &path.to_string(), &err);
                    self.memory.upsert(path, fields, merge).await;
                    return Served::degraded((), err, transition);
                }
            }
        }

        self.memory.upsert(path, fields, merge).await;
        Served::memory(())
    }

    /// Read the settings singleton layered over the defaults.
    pub async fn read_settings(&self) -> Served<Fields> {
        self.document_get(&DocumentPath::settings())
            .await
            .map(|document| settings_with_defaults(document.map(|d| d.fields)))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// The real backend, unless none was built or the store has degraded.
    async fn active_backend(&self) -> Option<&Arc<dyn DocumentBackend>> {
        let backend = self.backend.get_or_init(|| self.connect()).await.as_ref()?;
        if self.health.mode() == StoreMode::Fallback {
            return None;
        }
        Some(backend)
    }

    /// First-use initialization: build the client, go pending, launch the
    /// probe.
    async fn connect(&self) -> Option<Arc<dyn DocumentBackend>> {
        let built = match &self.connector {
            Connector::Backend(backend) => Ok(Arc::clone(backend)),
            Connector::Config(config) => build_backend(config).await,
        };

        let backend = match built {
            Ok(backend) => backend,
            Err(cause) => {
                if self.health.degrade(cause.clone()).is_some() {
                    warn!(cause = ?cause, "real backend unavailable, using memory mode");
                }
                return None;
            }
        };

        if self.health.begin_real().is_some() {
            info!(backend = backend.name(), "backend initialized (checking connectivity...)");
            self.spawn_probe(Arc::clone(&backend));
        } else if !self.health.mode().is_real() {
            // Shared health already degraded.
            return None;
        }

        Some(backend)
    }

    /// Check connectivity without blocking the first call.
    fn spawn_probe(&self, backend: Arc<dyn DocumentBackend>) {
        let health = self.health.clone();
        tokio::spawn(async move {
            match backend.probe().await {
                Ok(()) => {
                    if health.confirm().is_some() {
                        info!(backend = backend.name(), "backend connectivity verified");
                    }
                }
                Err(err) => {
                    if health.degrade(TransitionCause::probe_failed(&err)).is_some() {
                        warn!(
                            backend = backend.name(),
                            error = %err,
                            "backend connectivity check failed, switching to memory mode"
                        );
                    }
                }
            }
        });
    }

    /// Apply the fallback policy to a failed read.
    ///
    /// Only resource-absent errors degrade; anything else is answered from
    /// memory for this call alone.
    fn absorb_read(&self, operation: &'static str, target: &str, err: &BackendError) -> Option<ModeTransition> {
        if err.is_resource_absent() {
            let transition = self.health.degrade(TransitionCause::resource_absent(err));
            warn!(operation, target, error = %err, "backend resource absent, falling back to memory");
            transition
        } else {
            error!(operation, target, error = %err, "backend read failed, served from memory");
            None
        }
    }

    /// Apply the fallback policy to a failed write.
    ///
    /// Every write failure degrades. A write held only in memory must stay
    /// visible to later reads.
    fn absorb_write(&self, operation: &'static str, target: &str, err: &BackendError) -> Option<ModeTransition> {
        if err.is_resource_absent() {
            let transition = self.health.degrade(TransitionCause::resource_absent(err));
            warn!(operation, target, error = %err, "backend resource absent, falling back to memory");
            transition
        } else {
            let transition = self.health.degrade(TransitionCause::write_failed(err));
            error!(operation, target, error = %err, "backend write failed, falling back to memory");
            transition
        }
    }
}

impl std::fmt::Debug for ResilientStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientStore")
            .field("mode", &self.health.mode())
            .field("initialized", &self.backend.initialized())
            .finish_non_exhaustive()
    }
}

/// Build the configured real backend, or say why there is none.
async fn build_backend(config: &StoreConfig) -> Result<Arc<dyn DocumentBackend>, TransitionCause> {
    if let Some(err) = &config.invalid {
        return Err(TransitionCause::InvalidConfiguration {
            message: err.to_string(),
        });
    }

    match config.backend {
        BackendSelection::Memory => Err(TransitionCause::Disabled),
        BackendSelection::Firestore => {
            let account = config
                .service_account
                .as_ref()
                .ok_or(TransitionCause::MissingConfiguration)?;
            FirestoreBackend::new(account, config)
                .map(|backend| Arc::new(backend) as Arc<dyn DocumentBackend>)
                .map_err(|e| TransitionCause::ClientConstruction { message: e.to_string() })
        }
        BackendSelection::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(TransitionCause::MissingConfiguration)?;
            connect_postgres(url, config).await
        }
    }
}

#[cfg(feature = "postgres")]
async fn connect_postgres(url: &str, config: &StoreConfig) -> Result<Arc<dyn DocumentBackend>, TransitionCause> {
    PostgresBackend::connect(url, config.timeout)
        .await
        .map(|backend| Arc::new(backend) as Arc<dyn DocumentBackend>)
        .map_err(|e| TransitionCause::ClientConstruction { message: e.to_string() })
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_url: &str, _config: &StoreConfig) -> Result<Arc<dyn DocumentBackend>, TransitionCause> {
    Err(TransitionCause::ClientConstruction {
        message: "postgres support not compiled in (enable the `postgres` feature)".to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
