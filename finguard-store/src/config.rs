//! StoreConfig - Backend selection and credentials
//!
//! TigerStyle: Read the environment once, normalize, and hand the facade a
//! plain value.

use std::time::Duration;

use tracing::warn;

use crate::constants::{
    BACKEND_TIMEOUT_SECS_DEFAULT, BACKEND_TIMEOUT_SECS_MAX, FIRESTORE_ENDPOINT_DEFAULT,
    OAUTH_TOKEN_URI_DEFAULT,
};
use crate::error::ConfigError;

// =============================================================================
// Environment Variables
// =============================================================================

/// Firestore project id
pub const ENV_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";

/// Service-account email
pub const ENV_CLIENT_EMAIL: &str = "FIREBASE_CLIENT_EMAIL";

/// Service-account PEM private key
pub const ENV_PRIVATE_KEY: &str = "FIREBASE_PRIVATE_KEY";

/// Backend selection: firestore, postgres or memory
pub const ENV_STORE_BACKEND: &str = "FINGUARD_STORE_BACKEND";

/// Postgres connection URL
pub const ENV_DATABASE_URL: &str = "FINGUARD_DATABASE_URL";

/// Per-request backend timeout in seconds
pub const ENV_BACKEND_TIMEOUT_SECS: &str = "FINGUARD_BACKEND_TIMEOUT_SECS";

// =============================================================================
// Service Account
// =============================================================================

/// Credentials for the Firestore backend.
#[derive(Clone)]
pub struct ServiceAccount {
    /// Project id
    pub project_id: String,
    /// Service-account email
    pub client_email: String,
    /// Normalized PEM private key
    pub private_key: String,
}

impl ServiceAccount {
    /// Build from raw values. The private key is normalized.
    #[must_use]
    pub fn new(project_id: &str, client_email: &str, raw_private_key: &str) -> Self {
        Self {
            project_id: project_id.trim().to_string(),
            client_email: client_email.trim().to_string(),
            private_key: normalize_private_key(raw_private_key),
        }
    }
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Undo the usual mangling a PEM key suffers in environment variables:
/// surrounding quotes, escaped newlines, and carriage returns.
#[must_use]
pub fn normalize_private_key(raw: &str) -> String {
    let mut key = raw.trim();
    if let Some(stripped) = key.strip_prefix(['"', '\'']) {
        key = stripped;
    }
    if let Some(stripped) = key.strip_suffix(['"', '\'']) {
        key = stripped;
    }

    key.replace("\\\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\r", "")
        .replace('\r', "")
}

// =============================================================================
// Backend Selection
// =============================================================================

/// Which real backend to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendSelection {
    /// Google Cloud Firestore over REST
    #[default]
    Firestore,
    /// PostgreSQL JSONB table (requires the `postgres` feature)
    Postgres,
    /// No real backend; serve from memory
    Memory,
}

impl BackendSelection {
    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "firestore" | "firebase" => Some(Self::Firestore),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "memory" | "mock" => Some(Self::Memory),
            _ => None,
        }
    }
}

// =============================================================================
// Store Config
// =============================================================================

/// Everything the facade needs to build its real backend.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend to try
    pub backend: BackendSelection,
    /// Firestore credentials, if all three values were present
    pub service_account: Option<ServiceAccount>,
    /// Postgres URL, if present
    pub database_url: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Firestore REST endpoint
    pub firestore_endpoint: String,
    /// OAuth token endpoint
    pub token_uri: String,
    /// Unusable setting found while reading; the facade degrades on first use
    pub invalid: Option<ConfigError>,
}

impl StoreConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through a lookup function.
    ///
    /// Nothing here fails. Missing credentials leave `service_account`
    /// empty, and an unparseable backend selection or timeout is recorded in
    /// `invalid`; either way the facade commits to memory mode on first use.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut invalid = None;

        let backend = match present(ENV_STORE_BACKEND) {
            Some(raw) => BackendSelection::from_str(&raw).unwrap_or_else(|| {
                let err = ConfigError::UnknownBackend(raw);
                warn!(error = %err, "ignoring store backend setting");
                invalid = Some(err);
                BackendSelection::default()
            }),
            None => BackendSelection::default(),
        };

        let service_account = match (
            present(ENV_PROJECT_ID),
            present(ENV_CLIENT_EMAIL),
            present(ENV_PRIVATE_KEY),
        ) {
            (Some(project_id), Some(client_email), Some(private_key)) => {
                Some(ServiceAccount::new(&project_id, &client_email, &private_key))
            }
            _ => None,
        };

        let timeout_secs = match present(ENV_BACKEND_TIMEOUT_SECS) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0 && *secs <= BACKEND_TIMEOUT_SECS_MAX)
                .unwrap_or_else(|| {
                    let err = ConfigError::InvalidValue {
                        var: ENV_BACKEND_TIMEOUT_SECS,
                        value: raw,
                    };
                    warn!(error = %err, "ignoring backend timeout setting");
                    invalid.get_or_insert(err);
                    BACKEND_TIMEOUT_SECS_DEFAULT
                }),
            None => BACKEND_TIMEOUT_SECS_DEFAULT,
        };

        Self {
            backend,
            service_account,
            database_url: present(ENV_DATABASE_URL).map(|url| url.trim().to_string()),
            timeout: Duration::from_secs(timeout_secs),
            firestore_endpoint: FIRESTORE_ENDPOINT_DEFAULT.to_string(),
            token_uri: OAUTH_TOKEN_URI_DEFAULT.to_string(),
            invalid,
        }
    }

    /// Configuration that never tries a real backend.
    #[must_use]
    pub fn memory_only() -> Self {
        Self {
            backend: BackendSelection::Memory,
            service_account: None,
            database_url: None,
            timeout: Duration::from_secs(BACKEND_TIMEOUT_SECS_DEFAULT),
            firestore_endpoint: FIRESTORE_ENDPOINT_DEFAULT.to_string(),
            token_uri: OAUTH_TOKEN_URI_DEFAULT.to_string(),
            invalid: None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
