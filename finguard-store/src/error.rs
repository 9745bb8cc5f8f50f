//! Errors - Structured Backend Failures
//!
//! TigerStyle: Classify failures by kind, never by message text.

use serde::Serialize;

// =============================================================================
// Backend Error Kind
// =============================================================================

/// Category of a real-backend failure.
///
/// The facade switches on this value to decide whether the backend is gone
/// for good (resource absent) or merely failing this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// Database, collection root or API resource does not exist
    NotFound,
    /// The backing service is disabled for this project
    ServiceDisabled,
    /// Credentials are valid but lack permission
    PermissionDenied,
    /// Credentials were rejected
    Unauthenticated,
    /// Network failure, timeout or temporary unavailability
    Unavailable,
    /// The backend rejected the request shape
    InvalidArgument,
    /// Anything else
    Internal,
}

impl BackendErrorKind {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::ServiceDisabled => "service_disabled",
            Self::PermissionDenied => "permission_denied",
            Self::Unauthenticated => "unauthenticated",
            Self::Unavailable => "unavailable",
            Self::InvalidArgument => "invalid_argument",
            Self::Internal => "internal",
        }
    }

    /// True for the kinds that mean the backend resource is absent.
    #[must_use]
    pub fn is_resource_absent(&self) -> bool {
        matches!(self, Self::NotFound | Self::ServiceDisabled)
    }
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Backend Error
// =============================================================================

/// A failure reported by a real backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    /// Failure category
    pub kind: BackendErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl BackendError {
    /// Create an error of the given kind.
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Resource does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }

    /// Service disabled for the project.
    pub fn service_disabled(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::ServiceDisabled, message)
    }

    /// Caller lacks permission.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::PermissionDenied, message)
    }

    /// Credentials rejected.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unauthenticated, message)
    }

    /// Network or availability failure.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unavailable, message)
    }

    /// Malformed request.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::InvalidArgument, message)
    }

    /// Unclassified failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Internal, message)
    }

    /// See [`BackendErrorKind::is_resource_absent`].
    #[must_use]
    pub fn is_resource_absent(&self) -> bool {
        self.kind.is_resource_absent()
    }
}

/// Result type for backend operations.
pub type StoreResult<T> = Result<T, BackendError>;

// =============================================================================
// Path Error
// =============================================================================

/// A document path that cannot be addressed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// No segments at all
    #[error("document path is empty")]
    Empty,

    /// Two slashes in a row
    #[error("document path {path:?} has an empty segment")]
    EmptySegment {
        /// Path as given
        path: String,
    },

    /// Path ends on a collection instead of a document
    #[error("document path {path:?} must have an even number of segments, got {count}")]
    OddSegments {
        /// Path as given
        path: String,
        /// Segments found
        count: usize,
    },

    /// A segment over the length limit
    #[error("document path segment too long: {len} > {max}")]
    SegmentTooLong {
        /// Segment length in bytes
        len: usize,
        /// Limit in bytes
        max: usize,
    },
}

// =============================================================================
// Config Error
// =============================================================================

/// Configuration that names an unknown or unusable backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Backend selection names no known backend
    #[error("unknown store backend: {0} (expected firestore, postgres or memory)")]
    UnknownBackend(String),

    /// Variable set to something unusable
    #[error("invalid value for {var}: {value}")]
    InvalidValue {
        /// Environment variable
        var: &'static str,
        /// Value as read
        value: String,
    },
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_absent_kinds() {
        assert!(BackendErrorKind::NotFound.is_resource_absent());
        assert!(BackendErrorKind::ServiceDisabled.is_resource_absent());
        assert!(!BackendErrorKind::PermissionDenied.is_resource_absent());
        assert!(!BackendErrorKind::Unavailable.is_resource_absent());
        assert!(!BackendErrorKind::Internal.is_resource_absent());
    }

    #[test]
    fn test_display_includes_kind() {
        let err = BackendError::service_disabled("firestore.googleapis.com is disabled");
        assert_eq!(
            err.to_string(),
            "service_disabled: firestore.googleapis.com is disabled"
        );
    }
}
