//! Fault Injection
//!
//! TigerStyle: Faults are declared up front, targeted per operation, and
//! decided by the seeded RNG.

use std::sync::Mutex;

use crate::constants::DST_FAULTS_COUNT_MAX;
use crate::error::{BackendError, BackendErrorKind};

use super::rng::DeterministicRng;

// =============================================================================
// Fault Type
// =============================================================================

/// A backend failure the simulation can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// Database or collection root missing
    NotFound,
    /// API disabled for the project
    ServiceDisabled,
    /// Credentials lack permission
    PermissionDenied,
    /// Credentials rejected
    Unauthenticated,
    /// Network outage or timeout
    Unavailable,
    /// Unclassified backend failure
    Internal,
}

impl FaultType {
    /// Error kind this fault surfaces as.
    #[must_use]
    pub fn kind(&self) -> BackendErrorKind {
        match self {
            Self::NotFound => BackendErrorKind::NotFound,
            Self::ServiceDisabled => BackendErrorKind::ServiceDisabled,
            Self::PermissionDenied => BackendErrorKind::PermissionDenied,
            Self::Unauthenticated => BackendErrorKind::Unauthenticated,
            Self::Unavailable => BackendErrorKind::Unavailable,
            Self::Internal => BackendErrorKind::Internal,
        }
    }

    /// Build the error this fault produces for an operation.
    #[must_use]
    pub fn to_error(&self, operation: SimOperation) -> BackendError {
        BackendError::new(
            self.kind(),
            format!("injected {:?} fault on {}", self, operation.as_str()),
        )
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Backend operations a fault can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOperation {
    /// `add`
    Add,
    /// `query`
    Query,
    /// `get`
    Get,
    /// `set`
    Set,
    /// `probe`
    Probe,
}

impl SimOperation {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Query => "query",
            Self::Get => "get",
            Self::Set => "set",
            Self::Probe => "probe",
        }
    }
}

// =============================================================================
// Fault Config
// =============================================================================

/// One fault: what fails, how often, and on which operations.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultConfig {
    /// Failure produced
    pub fault_type: FaultType,
    /// Probability in `[0, 1]`
    pub probability: f64,
    /// Targeted operations; empty means every operation
    pub operations: Vec<SimOperation>,
}

impl FaultConfig {
    /// Fault on every operation with the given probability.
    ///
    /// # Panics
    /// Panics if probability is outside `[0.0, 1.0]`.
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability {probability} must be within [0, 1]"
        );
        Self {
            fault_type,
            probability,
            operations: Vec::new(),
        }
    }

    /// Restrict to one more operation.
    #[must_use]
    pub fn on(mut self, operation: SimOperation) -> Self {
        if !self.operations.contains(&operation) {
            self.operations.push(operation);
        }
        self
    }

    /// Restrict to `add`.
    #[must_use]
    pub fn on_add(self) -> Self {
        self.on(SimOperation::Add)
    }

    /// Restrict to `query`.
    #[must_use]
    pub fn on_query(self) -> Self {
        self.on(SimOperation::Query)
    }

    /// Restrict to `get`.
    #[must_use]
    pub fn on_get(self) -> Self {
        self.on(SimOperation::Get)
    }

    /// Restrict to `set`.
    #[must_use]
    pub fn on_set(self) -> Self {
        self.on(SimOperation::Set)
    }

    /// Restrict to `probe`.
    #[must_use]
    pub fn on_probe(self) -> Self {
        self.on(SimOperation::Probe)
    }

    fn targets(&self, operation: SimOperation) -> bool {
        self.operations.is_empty() || self.operations.contains(&operation)
    }
}

// =============================================================================
// Fault Injector
// =============================================================================

/// Decides, per operation, whether a configured fault fires.
#[derive(Debug)]
pub struct FaultInjector {
    faults: Vec<FaultConfig>,
    rng: Mutex<DeterministicRng>,
}

impl FaultInjector {
    /// Create with no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            faults: Vec::new(),
            rng: Mutex::new(DeterministicRng::new(seed)),
        }
    }

    /// Add a fault.
    ///
    /// # Panics
    /// Panics if more than [`DST_FAULTS_COUNT_MAX`] faults are registered.
    pub fn add(&mut self, fault: FaultConfig) {
        assert!(
            self.faults.len() < DST_FAULTS_COUNT_MAX,
            "fault count exceeds max {DST_FAULTS_COUNT_MAX}"
        );
        self.faults.push(fault);
    }

    /// Number of registered faults.
    #[must_use]
    pub fn len(&self) -> usize {
        self.faults.len()
    }

    /// True when no faults are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// First fault that fires for this operation, in registration order.
    pub fn check(&self, operation: SimOperation) -> Option<BackendError> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        self.faults
            .iter()
            .filter(|fault| fault.targets(operation))
            .find(|fault| rng.next_bool(fault.probability))
            .map(|fault| fault.fault_type.to_error(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targeted_fault() {
        let mut injector = FaultInjector::new(1);
        injector.add(FaultConfig::new(FaultType::NotFound, 1.0).on_add().on_set());

        let err = injector.check(SimOperation::Add).expect("add should fail");
        assert_eq!(err.kind, BackendErrorKind::NotFound);
        assert!(injector.check(SimOperation::Set).is_some());
        assert!(injector.check(SimOperation::Query).is_none());
        assert!(injector.check(SimOperation::Probe).is_none());
    }

    #[test]
    fn test_untargeted_fault_hits_everything() {
        let mut injector = FaultInjector::new(1);
        injector.add(FaultConfig::new(FaultType::Unavailable, 1.0));
        for op in [
            SimOperation::Add,
            SimOperation::Query,
            SimOperation::Get,
            SimOperation::Set,
            SimOperation::Probe,
        ] {
            assert_eq!(
                injector.check(op).map(|e| e.kind),
                Some(BackendErrorKind::Unavailable)
            );
        }
    }

    #[test]
    fn test_probabilistic_faults_replay() {
        let run = |seed| {
            let mut injector = FaultInjector::new(seed);
            injector.add(FaultConfig::new(FaultType::Internal, 0.3));
            (0..64)
                .map(|_| injector.check(SimOperation::Get).is_some())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(99), run(99));
    }
}
