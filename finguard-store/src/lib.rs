//! FinGuard Store - Resilient document storage
//!
//! TigerStyle: A document store that degrades to memory instead of failing.
//!
//! # Philosophy
//!
//! The dashboard must keep working when the database does not. Every call
//! returns data; whether that data was persisted is reported alongside it,
//! never thrown.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              ResilientStore                  │
//! ├─────────────────────────────────────────────┤
//! │  BackendHealth          │ Mode state machine│
//! │  DocumentBackend        │ Firestore/Postgres│
//! │  MemoryBackend          │ Always available  │
//! ├─────────────────────────────────────────────┤
//! │  DST Framework          │ Fault injection   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use finguard_store::{BackendHealth, Query, ResilientStore, SortDirection};
//!
//! # tokio_test::block_on(async {
//! let store = ResilientStore::memory_only(BackendHealth::new());
//!
//! let mut fields = finguard_store::Fields::new();
//! fields.insert("flaggedAt".into(), "2025-03-01T10:00:00.000Z".into());
//! store.collection_add("flagged_customers", fields).await;
//!
//! let recent = store
//!     .collection_query(
//!         &Query::collection("flagged_customers")
//!             .order_by("flaggedAt", SortDirection::Descending)
//!             .limit(10),
//!     )
//!     .await;
//! assert_eq!(recent.value.len(), 1);
//! assert!(!recent.is_persisted());
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod constants;
pub mod document;
pub mod dst;
pub mod error;
pub mod facade;
pub mod firestore;
pub mod health;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod settings;

// Re-export common types
pub use backend::DocumentBackend;
pub use config::{BackendSelection, ServiceAccount, StoreConfig};
pub use document::{Document, DocumentPath, Fields, Query, SortDirection};
pub use error::{BackendError, BackendErrorKind, ConfigError, PathError, StoreResult};
pub use facade::{ResilientStore, Served, ServedFrom};
pub use firestore::FirestoreBackend;
pub use health::{BackendHealth, HealthState, ModeTransition, StoreMode, TransitionCause};
pub use memory::MemoryBackend;
pub use settings::{default_settings, settings_with_defaults};

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
