//! DST - Deterministic Simulation Testing
//!
//! TigerBeetle/FoundationDB-style fault injection for the store facade.
//!
//! # Philosophy
//!
//! > "If you're not testing with fault injection, you're not testing."
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use finguard_store::dst::{FaultConfig, FaultType, SimBackend, SimConfig};
//! use finguard_store::{BackendHealth, ResilientStore};
//!
//! # tokio_test::block_on(async {
//! let sim = SimBackend::new(SimConfig::with_seed(42))
//!     .with_fault(FaultConfig::new(FaultType::ServiceDisabled, 1.0).on_add());
//! let store = ResilientStore::with_backend(Arc::new(sim), BackendHealth::new());
//!
//! let served = store.collection_add("interventions", Default::default()).await;
//! assert!(!served.is_persisted());
//! assert!(!store.is_backend_connected());
//! # });
//! ```
//!
//! Run with explicit seed for reproducibility:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

mod config;
mod fault;
mod rng;
mod sim;

pub use config::SimConfig;
pub use fault::{FaultConfig, FaultInjector, FaultType, SimOperation};
pub use rng::DeterministicRng;
pub use sim::SimBackend;
