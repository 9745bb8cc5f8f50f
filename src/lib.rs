//! FinGuard - Early-warning risk dashboard API
//!
//! HTTP endpoints the dashboard calls to flag customers, log interventions,
//! tune alert settings and export reports. Every endpoint sits on a
//! [`finguard_store::ResilientStore`], so a database outage degrades
//! durability instead of availability.

pub mod api;
pub mod export;
pub mod models;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Default HTTP bind address
pub const HTTP_BIND_ADDRESS_DEFAULT: &str = "127.0.0.1:3000";

/// Application name
pub const APP_NAME: &str = "finguard";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum request body size in bytes
pub const REQUEST_BODY_BYTES_MAX: usize = 1024 * 1024;

/// Collection holding flagged customers
pub const FLAGGED_CUSTOMERS_COLLECTION: &str = "flagged_customers";

/// Collection holding logged interventions
pub const INTERVENTIONS_COLLECTION: &str = "interventions";

/// Maximum length of a free-text request field in bytes
pub const TEXT_FIELD_BYTES_MAX: usize = 4_096;
