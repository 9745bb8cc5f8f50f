//! Constants
//!
//! TigerStyle: Every limit is named, explicit, and carries its unit.

// =============================================================================
// Collections and Paths
// =============================================================================

/// Maximum collection name length in bytes
pub const COLLECTION_NAME_BYTES_MAX: usize = 1_500;

/// Maximum document id length in bytes
pub const DOCUMENT_ID_BYTES_MAX: usize = 1_500;

/// Collection holding the settings singleton
pub const SETTINGS_COLLECTION: &str = "settings";

/// Id of the settings singleton
pub const SETTINGS_DOCUMENT_ID: &str = "global_config";

// =============================================================================
// Queries
// =============================================================================

/// Maximum number of documents a single query may return
pub const QUERY_LIMIT_MAX: usize = 1_000;

// =============================================================================
// Memory Store
// =============================================================================

/// Prefix of identifiers synthesized by the memory store
pub const MEMORY_ID_PREFIX: &str = "mock-";

// =============================================================================
// Backends
// =============================================================================

/// Default per-request timeout for real backends, in seconds
pub const BACKEND_TIMEOUT_SECS_DEFAULT: u64 = 10;

/// Maximum per-request timeout for real backends, in seconds
pub const BACKEND_TIMEOUT_SECS_MAX: u64 = 300;

/// Default Firestore REST endpoint
pub const FIRESTORE_ENDPOINT_DEFAULT: &str = "https://firestore.googleapis.com/v1";

/// Default Google OAuth token endpoint
pub const OAUTH_TOKEN_URI_DEFAULT: &str = "https://oauth2.googleapis.com/token";

/// OAuth scope granting Firestore access
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Lifetime of a signed service-account assertion, in seconds
pub const ASSERTION_LIFETIME_SECS: i64 = 3_600;

/// Refresh cached access tokens this many seconds before they expire
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Maximum Postgres pool connections
pub const POSTGRES_CONNECTIONS_MAX: u32 = 10;

// =============================================================================
// DST
// =============================================================================

/// Environment variable holding the simulation seed
pub const DST_SEED_ENV: &str = "DST_SEED";

/// Maximum number of faults a single injector can hold
pub const DST_FAULTS_COUNT_MAX: usize = 32;
