// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fail-fast input validation, run before any integration starts.

use crate::ensemble::EnsembleOptions;
use crate::error::{Error, Result, ValidationError};
use crate::qobj::{QObj, QObjKind};
use crate::solver::SolverOptions;

/// Validate an output-time grid: non-empty, finite, strictly increasing.
pub fn validate_times(times: &[f64]) -> Result<()> {
    if times.is_empty() {
        return Err(ValidationError::Field {
            field: "times".into(),
            message: "must contain at least one time".into(),
        }
        .into());
    }

    for (i, t) in times.iter().enumerate() {
        if !t.is_finite() {
            return Err(ValidationError::TimeGrid {
                index: i,
                message: format!("{} is not finite", t),
            }
            .into());
        }
        if i > 0 && *t <= times[i - 1] {
            return Err(ValidationError::TimeGrid {
                index: i,
                message: format!(
                    "{} does not exceed previous time {} (grid must be strictly increasing)",
                    t,
                    times[i - 1]
                ),
            }
            .into());
        }
    }

    Ok(())
}

/// Validate integrator options.
pub fn validate_solver_options(options: &SolverOptions) -> Result<()> {
    positive("atol", options.atol)?;
    if !options.rtol.is_finite() || options.rtol < 0.0 {
        return Err(field("rtol", format!("must be finite and non-negative, got {}", options.rtol)));
    }
    if let Some(h) = options.max_step {
        positive("max_step", h)?;
    }
    if let Some(h) = options.first_step {
        positive("first_step", h)?;
    }
    if options.nsteps == 0 {
        return Err(field("nsteps", "must be greater than 0".into()));
    }
    positive("trace_tolerance", options.trace_tolerance)?;
    positive("jump_time_tolerance", options.jump_time_tolerance)?;
    Ok(())
}

/// Validate ensemble options.
pub fn validate_ensemble_options(options: &EnsembleOptions) -> Result<()> {
    if options.ntraj == 0 {
        return Err(field("ntraj", "must be greater than 0".into()));
    }
    if options.workers == Some(0) {
        return Err(field("workers", "must be greater than 0".into()));
    }
    if let Some(shard) = options.shard {
        if shard.count == 0 || shard.index >= shard.count {
            return Err(field(
                "shard",
                format!("index {} out of range for {} shards", shard.index, shard.count),
            ));
        }
        if shard.count > options.ntraj {
            return Err(field(
                "shard",
                format!("{} shards for only {} trajectories", shard.count, options.ntraj),
            ));
        }
    }
    if let Some(target) = options.target_std_error {
        positive("target_std_error", target)?;
    }
    if options.report_every == Some(0) {
        return Err(field("report_every", "must be greater than 0".into()));
    }
    Ok(())
}

/// Validate observables against the evolved system's dims.
pub fn validate_observables(e_ops: &[QObj], dims: &[usize]) -> Result<()> {
    for (i, op) in e_ops.iter().enumerate() {
        if op.kind() != QObjKind::Operator {
            return Err(Error::dims(format!("e_ops[{}] kind", i), QObjKind::Operator, op.kind()));
        }
        if op.dims() != dims {
            return Err(Error::dims(format!("e_ops[{}] dims", i), dims, op.dims()));
        }
    }
    Ok(())
}

/// Reject an initial ket with zero or non-finite norm.
pub fn validate_initial_ket(psi0: &QObj) -> Result<()> {
    let norm = psi0.norm();
    if !norm.is_finite() || norm == 0.0 {
        return Err(ValidationError::PhysicsConstraint(format!(
            "initial state must have finite nonzero norm, got {}",
            norm
        ))
        .into());
    }
    Ok(())
}

fn positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(field(name, format!("must be finite and positive, got {}", value)));
    }
    Ok(())
}

fn field(name: &str, message: String) -> Error {
    ValidationError::Field {
        field: name.into(),
        message,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::Shard;
    use crate::qobj::{destroy, sigmaz};

    #[test]
    fn test_validate_times() {
        assert!(validate_times(&[0.0]).is_ok());
        assert!(validate_times(&[0.0, 0.5, 1.0]).is_ok());
        assert!(validate_times(&[]).is_err());

        let err = validate_times(&[0.0, 1.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::TimeGrid { index: 2, .. })
        ));

        let err = validate_times(&[0.0, 2.0, 1.0]).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));

        assert!(validate_times(&[0.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_validate_initial_ket() {
        let psi = crate::qobj::basis(2, 1).unwrap();
        assert!(validate_initial_ket(&psi).is_ok());
        let zero = psi.scale(num_complex::Complex64::new(0.0, 0.0));
        let err = validate_initial_ket(&zero).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::PhysicsConstraint(_))
        ));
    }

    #[test]
    fn test_validate_solver_options() {
        assert!(validate_solver_options(&SolverOptions::default()).is_ok());

        let bad = SolverOptions {
            atol: 0.0,
            ..Default::default()
        };
        assert!(validate_solver_options(&bad).is_err());

        let bad = SolverOptions {
            max_step: Some(-1.0),
            ..Default::default()
        };
        assert!(validate_solver_options(&bad).is_err());

        let bad = SolverOptions {
            nsteps: 0,
            ..Default::default()
        };
        assert!(validate_solver_options(&bad).is_err());
    }

    #[test]
    fn test_validate_ensemble_options() {
        let ok = EnsembleOptions::default();
        assert!(validate_ensemble_options(&ok).is_ok());

        let bad = EnsembleOptions {
            ntraj: 0,
            ..Default::default()
        };
        assert!(validate_ensemble_options(&bad).is_err());

        let bad = EnsembleOptions {
            shard: Some(Shard { index: 3, count: 3 }),
            ..Default::default()
        };
        assert!(validate_ensemble_options(&bad).is_err());

        let bad = EnsembleOptions {
            workers: Some(0),
            ..Default::default()
        };
        assert!(validate_ensemble_options(&bad).is_err());
    }

    #[test]
    fn test_validate_observables() {
        let dims = [2];
        assert!(validate_observables(&[sigmaz().unwrap()], &dims).is_ok());
        assert!(matches!(
            validate_observables(&[destroy(3).unwrap()], &dims),
            Err(Error::DimensionMismatch { .. })
        ));
        let ket = crate::qobj::basis(2, 0).unwrap();
        assert!(validate_observables(&[ket], &dims).is_err());
    }
}
