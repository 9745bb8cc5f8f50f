//! BackendHealth - Injectable store-mode state
//!
//! TigerStyle: Mode changes are explicit values, not hidden side effects.
//!
//! # State Machine
//!
//! ```text
//! Uninitialized ──► RealPending ──► RealConfirmed
//!       │                │                 │
//!       └────────────────┴─────────────────┴──► Fallback (absorbing)
//! ```
//!
//! The mode only ever moves forward. Concurrent callers racing on a
//! transition cost at most one redundant real-backend attempt.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{BackendError, BackendErrorKind};

// =============================================================================
// Store Mode
// =============================================================================

/// Which backend the facade is routing to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// No initialization attempt yet
    #[default]
    Uninitialized,
    /// Real client built, connectivity probe not yet resolved
    RealPending,
    /// Connectivity probe succeeded
    RealConfirmed,
    /// Serving from memory for the rest of the process lifetime
    Fallback,
}

impl StoreMode {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::RealPending => "real_pending",
            Self::RealConfirmed => "real_confirmed",
            Self::Fallback => "fallback",
        }
    }

    /// True while calls are routed to the real backend.
    #[must_use]
    pub fn is_real(&self) -> bool {
        matches!(self, Self::RealPending | Self::RealConfirmed)
    }

    /// True once the probe (or initialization) has decided the mode.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::RealConfirmed | Self::Fallback)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: StoreMode) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized, Self::RealPending)
                | (Self::Uninitialized, Self::Fallback)
                | (Self::RealPending, Self::RealConfirmed)
                | (Self::RealPending, Self::Fallback)
                | (Self::RealConfirmed, Self::Fallback)
        )
    }
}

impl std::fmt::Display for StoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// Why the mode changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionCause {
    /// Memory-only operation was requested
    Disabled,
    /// A required configuration value is missing
    MissingConfiguration,
    /// A configuration value could not be used
    InvalidConfiguration {
        /// What was wrong
        message: String,
    },
    /// Building the real client failed
    ClientConstruction {
        /// Construction error
        message: String,
    },
    /// Real client built, probe launched
    ClientBuilt,
    /// Probe reached the backend
    ProbeSucceeded,
    /// Probe failed
    ProbeFailed {
        /// Failure category
        kind: BackendErrorKind,
        /// Failure detail
        message: String,
    },
    /// A call hit a resource-absent error
    ResourceAbsent {
        /// Failure category
        kind: BackendErrorKind,
        /// Failure detail
        message: String,
    },
    /// A write failed and was kept in memory instead
    WriteFailed {
        /// Failure category
        kind: BackendErrorKind,
        /// Failure detail
        message: String,
    },
}

impl TransitionCause {
    /// Cause for a failed probe.
    #[must_use]
    pub fn probe_failed(err: &BackendError) -> Self {
        Self::ProbeFailed {
            kind: err.kind,
            message: err.message.clone(),
        }
    }

    /// Cause for a write the backend did not take.
    #[must_use]
    pub fn write_failed(err: &BackendError) -> Self {
        Self::WriteFailed {
            kind: err.kind,
            message: err.message.clone(),
        }
    }

    /// Cause for a resource-absent call failure.
    #[must_use]
    pub fn resource_absent(err: &BackendError) -> Self {
        Self::ResourceAbsent {
            kind: err.kind,
            message: err.message.clone(),
        }
    }
}

/// A mode change, returned to whoever caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeTransition {
    /// Mode before
    pub from: StoreMode,
    /// Mode after
    pub to: StoreMode,
    /// Why
    pub cause: TransitionCause,
    /// When
    pub at: DateTime<Utc>,
}

/// Current mode plus the most recent transition cause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthState {
    /// Current mode
    pub mode: StoreMode,
    /// Cause of the last transition
    pub cause: Option<TransitionCause>,
    /// Time of the last transition
    pub changed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Backend Health
// =============================================================================

/// Shared, cloneable store-mode handle.
///
/// Clones observe and drive the same state. Create one per facade, or share
/// one between facades that should degrade together.
#[derive(Debug, Clone)]
pub struct BackendHealth {
    state: Arc<watch::Sender<HealthState>>,
}

impl BackendHealth {
    /// Create a handle in [`StoreMode::Uninitialized`].
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(HealthState::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> StoreMode {
        self.state.borrow().mode
    }

    /// Current mode plus last cause.
    #[must_use]
    pub fn snapshot(&self) -> HealthState {
        self.state.borrow().clone()
    }

    /// True only while calls are routed to the real backend.
    #[must_use]
    pub fn is_backend_connected(&self) -> bool {
        self.mode().is_real()
    }

    /// Watch mode changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HealthState> {
        self.state.subscribe()
    }

    /// `Uninitialized → RealPending`.
    pub fn begin_real(&self) -> Option<ModeTransition> {
        self.transition(StoreMode::RealPending, TransitionCause::ClientBuilt)
    }

    /// `RealPending → RealConfirmed`.
    pub fn confirm(&self) -> Option<ModeTransition> {
        self.transition(StoreMode::RealConfirmed, TransitionCause::ProbeSucceeded)
    }

    /// Any non-fallback mode `→ Fallback`.
    pub fn degrade(&self, cause: TransitionCause) -> Option<ModeTransition> {
        self.transition(StoreMode::Fallback, cause)
    }

    /// Apply a transition if it is legal from the current mode.
    fn transition(&self, to: StoreMode, cause: TransitionCause) -> Option<ModeTransition> {
        let mut applied = None;
        self.state.send_if_modified(|state| {
            if !state.mode.can_transition_to(to) {
                return false;
            }

            let transition = ModeTransition {
                from: state.mode,
                to,
                cause: cause.clone(),
                at: Utc::now(),
            };
            state.mode = to;
            state.cause = Some(cause.clone());
            state.changed_at = Some(transition.at);
            applied = Some(transition);
            true
        });

        // Postcondition
        if let Some(transition) = &applied {
            assert_eq!(transition.to, to, "applied transition must reach target");
        }

        applied
    }
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
