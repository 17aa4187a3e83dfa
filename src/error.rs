// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the dynamics engine.

use std::fmt;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Result type alias for dynamics operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Dynamics error types.
#[derive(Debug)]
pub enum Error {
    /// Configuration error
    Config(String),
    /// Validation error
    Validation(ValidationError),
    /// Shapes or subsystem dims disagree
    DimensionMismatch {
        context: String,
        expected: String,
        actual: String,
    },
    /// Integrator could not meet tolerance or diverged
    IntegrationFailure(Box<IntegrationFailure>),
    /// Trajectory exceeded its wall-clock budget
    TrajectoryTimeout { elapsed_ms: u64, reached_time: f64 },
    /// Every trajectory of an ensemble failed
    EnsembleWorkerFailure(String),
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

/// Details of an integration failure.
///
/// Carries the last time the integrator reached together with the state it
/// held there, so the caller can inspect or resume.
#[derive(Debug, Clone)]
pub struct IntegrationFailure {
    /// Why the integrator stopped.
    pub reason: String,
    /// Last time successfully reached.
    pub last_time: f64,
    /// State at `last_time`.
    pub last_state: Vec<Complex64>,
}

impl Error {
    /// Build an [`Error::DimensionMismatch`].
    pub fn dims(
        context: impl Into<String>,
        expected: impl fmt::Debug,
        actual: impl fmt::Debug,
    ) -> Self {
        Error::DimensionMismatch {
            context: context.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    /// Build an [`Error::IntegrationFailure`].
    pub fn integration(reason: impl Into<String>, last_time: f64, last_state: &[Complex64]) -> Self {
        Error::IntegrationFailure(Box::new(IntegrationFailure {
            reason: reason.into(),
            last_time,
            last_state: last_state.to_vec(),
        }))
    }

    /// Whether this error is a per-trajectory condition that a retry or the
    /// ensemble can absorb.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::IntegrationFailure(_) | Error::TrajectoryTimeout { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::DimensionMismatch {
                context,
                expected,
                actual,
            } => write!(
                f,
                "Dimension mismatch in {}: expected {}, got {}",
                context, expected, actual
            ),
            Error::IntegrationFailure(e) => write!(
                f,
                "Integration failure at t={}: {}",
                e.last_time, e.reason
            ),
            Error::TrajectoryTimeout {
                elapsed_ms,
                reached_time,
            } => write!(
                f,
                "Trajectory timed out after {} ms at t={}",
                elapsed_ms, reached_time
            ),
            Error::EnsembleWorkerFailure(msg) => write!(f, "Ensemble worker failure: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Non-fatal conditions surfaced alongside results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Hamiltonian deviates from Hermitian by more than tolerance.
    NonHermitian { deviation: f64 },
    /// A jump was triggered but every collapse channel had ~zero weight.
    InvalidJumpOperator { trajectory: u64, time: f64 },
    /// A collapse channel never fired over a whole ensemble while others did.
    SilentChannel { channel: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NonHermitian { deviation } => {
                write!(f, "Hamiltonian is not Hermitian (max deviation {:.3e})", deviation)
            }
            Diagnostic::InvalidJumpOperator { trajectory, time } => write!(
                f,
                "Trajectory {}: no viable collapse channel at t={}",
                trajectory, time
            ),
            Diagnostic::SilentChannel { channel } => {
                write!(f, "Collapse channel {} never fired", channel)
            }
        }
    }
}

/// Validation errors.
#[derive(Debug)]
pub enum ValidationError {
    /// Field validation failed
    Field { field: String, message: String },
    /// Output-time grid is not strictly increasing
    TimeGrid { index: usize, message: String },
    /// Physics constraint violated
    PhysicsConstraint(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Field { field, message } => {
                write!(f, "Field '{}': {}", field, message)
            }
            ValidationError::TimeGrid { index, message } => {
                write!(f, "Time grid entry {}: {}", index, message)
            }
            ValidationError::PhysicsConstraint(msg) => {
                write!(f, "Physics constraint violated: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_error_display_config() {
        let e = Error::Config("bad ntraj".into());
        assert_eq!(e.to_string(), "Configuration error: bad ntraj");
    }

    #[test]
    fn test_error_display_dimension_mismatch() {
        let e = Error::dims("liouvillian", vec![2], vec![3]);
        assert_eq!(
            e.to_string(),
            "Dimension mismatch in liouvillian: expected [2], got [3]"
        );
    }

    #[test]
    fn test_error_display_integration_failure() {
        let e = Error::integration("step size underflow", 0.5, &[Complex64::new(1.0, 0.0)]);
        assert_eq!(
            e.to_string(),
            "Integration failure at t=0.5: step size underflow"
        );
        match e {
            Error::IntegrationFailure(f) => {
                assert_eq!(f.last_state.len(), 1);
                assert_eq!(f.last_time, 0.5);
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn test_error_display_timeout() {
        let e = Error::TrajectoryTimeout {
            elapsed_ms: 1500,
            reached_time: 2.0,
        };
        assert_eq!(e.to_string(), "Trajectory timed out after 1500 ms at t=2");
    }

    #[test]
    fn test_validation_error_display_time_grid() {
        let e = ValidationError::TimeGrid {
            index: 3,
            message: "not strictly increasing".into(),
        };
        assert_eq!(e.to_string(), "Time grid entry 3: not strictly increasing");
    }

    #[test]
    fn test_validation_error_display_field() {
        let e = ValidationError::Field {
            field: "ntraj".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(e.to_string(), "Field 'ntraj': must be greater than 0");
    }

    #[test]
    fn test_error_source() {
        let e = Error::Io(std::io::Error::other("disk"));
        assert!(e.source().is_some());
        let e = Error::Validation(ValidationError::PhysicsConstraint("x".into()));
        assert!(e.source().is_some());
        let e = Error::Config("x".into());
        assert!(e.source().is_none());
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::integration("x", 0.0, &[]).is_recoverable());
        assert!(Error::TrajectoryTimeout {
            elapsed_ms: 1,
            reached_time: 0.0
        }
        .is_recoverable());
        assert!(!Error::dims("x", 1, 2).is_recoverable());
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::SilentChannel { channel: 2 };
        assert_eq!(d.to_string(), "Collapse channel 2 never fired");
        let d = Diagnostic::InvalidJumpOperator {
            trajectory: 7,
            time: 1.5,
        };
        assert_eq!(d.to_string(), "Trajectory 7: no viable collapse channel at t=1.5");
    }

    #[test]
    fn test_from_serde_errors() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("{{{{").unwrap_err();
        assert!(matches!(Error::from(yaml_err), Error::Serialization(_)));
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        assert!(matches!(Error::from(json_err), Error::Serialization(_)));
    }
}
