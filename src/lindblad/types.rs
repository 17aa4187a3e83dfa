// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lindblad master equation types.
//!
//! Ref: Lindblad (1976), Commun. Math. Phys. 48, 119.
//! Ref: Gorini, Kossakowski, Sudarshan (1976), J. Math. Phys. 17, 821.

use num_complex::Complex64;

use crate::error::{Error, Result, ValidationError};
use crate::qobj::{sigmam, sigmaz, QObj};

/// A Lindblad collapse (jump) operator with its rate.
///
/// Represents a single dissipation channel:
///   D[L](ρ) = γ (L ρ L† − ½{L†L, ρ})
///
/// The engine works with the effective jump operator √γ·L. Rates share the
/// time unit of the output grid.
///
/// Common channels:
///   - Amplitude damping: L = σ⁻, γ = 1/T1
///   - Pure dephasing:    L = σz/2, γ = 1/T_φ
///     where 1/T_φ = 1/T2 − 1/(2T1)
#[derive(Debug, Clone)]
pub struct CollapseOperator {
    /// Bare operator L.
    pub operator: QObj,
    /// Non-negative rate γ.
    pub rate: f64,
    /// Human-readable label (e.g., "T1_q0", "Tphi_q1").
    pub label: String,
}

impl CollapseOperator {
    /// Create a channel from an operator, rate and label.
    pub fn new(operator: QObj, rate: f64, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if !operator.is_operator() {
            return Err(Error::dims(
                format!("collapse operator '{}'", label),
                "oper",
                operator.kind(),
            ));
        }
        if !rate.is_finite() || rate < 0.0 {
            return Err(ValidationError::Field {
                field: format!("rate[{}]", label),
                message: format!("must be finite and non-negative, got {rate}"),
            }
            .into());
        }
        Ok(Self {
            operator,
            rate,
            label,
        })
    }

    /// Amplitude damping on a single two-level system: √γ·σ⁻.
    pub fn amplitude_damping(gamma: f64, qubit_label: &str) -> Result<Self> {
        Self::new(sigmam()?, gamma, format!("T1_{qubit_label}"))
    }

    /// Pure dephasing on a single two-level system with rate
    /// 1/T2 − 1/(2·T1) on σz/2.
    ///
    /// T2 must satisfy T2 ≤ 2·T1.
    pub fn pure_dephasing(t1: f64, t2: f64, qubit_label: &str) -> Result<Self> {
        if t1 <= 0.0 {
            return Err(physics(format!("T1 must be positive, got {t1}")));
        }
        if t2 <= 0.0 {
            return Err(physics(format!("T2 must be positive, got {t2}")));
        }
        if t2 > 2.0 * t1 {
            return Err(physics(format!("T2 ({t2}) must be ≤ 2*T1 ({})", 2.0 * t1)));
        }

        // T2 = 2·T1 exactly can still round slightly below zero
        let gamma_phi = (1.0 / t2 - 1.0 / (2.0 * t1)).max(0.0);
        let half_sz = sigmaz()?.scale(Complex64::new(0.5, 0.0));
        Self::new(half_sz, gamma_phi, format!("Tphi_{qubit_label}"))
    }

    /// Both T1 and T_φ channels for a single two-level system.
    pub fn from_t1_t2(t1: f64, t2: f64, qubit_label: &str) -> Result<Vec<Self>> {
        if t1 <= 0.0 {
            return Err(physics(format!("T1 must be positive, got {t1}")));
        }
        let t1_op = Self::amplitude_damping(1.0 / t1, qubit_label)?;
        let tphi_op = Self::pure_dephasing(t1, t2, qubit_label)?;
        Ok(vec![t1_op, tphi_op])
    }

    /// Effective jump operator √γ·L.
    pub fn jump_operator(&self) -> QObj {
        self.operator.scale(Complex64::new(self.rate.sqrt(), 0.0))
    }
}

impl From<QObj> for CollapseOperator {
    /// A bare operator is taken as already scaled (rate 1).
    fn from(operator: QObj) -> Self {
        Self {
            operator,
            rate: 1.0,
            label: String::from("c_op"),
        }
    }
}

fn physics(msg: String) -> Error {
    ValidationError::PhysicsConstraint(msg).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qobj::{destroy, sigmax};
    use approx::assert_relative_eq;

    #[test]
    fn test_amplitude_damping_creates_sigma_minus() {
        let op = CollapseOperator::amplitude_damping(0.25, "q0").unwrap();
        // σ⁻ = |0⟩⟨1|: only [0,1] element is nonzero
        let m = op.operator.data();
        assert_eq!(m[[0, 1]], Complex64::new(1.0, 0.0));
        assert_eq!(m[[0, 0]], Complex64::new(0.0, 0.0));
        assert_eq!(m[[1, 0]], Complex64::new(0.0, 0.0));
        assert_eq!(m[[1, 1]], Complex64::new(0.0, 0.0));
        assert_eq!(op.label, "T1_q0");

        let jump = op.jump_operator();
        assert_relative_eq!(jump.data()[[0, 1]].re, 0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_pure_dephasing_rate() {
        // T1=50, T2=30 → 1/T_φ = 1/30 - 1/100
        let op = CollapseOperator::pure_dephasing(50.0, 30.0, "q0").unwrap();
        assert_relative_eq!(op.rate, 1.0 / 30.0 - 1.0 / 100.0, epsilon = 1e-15);
        assert_relative_eq!(op.operator.data()[[1, 1]].re, 0.5, epsilon = 1e-15);
        assert_eq!(op.label, "Tphi_q0");
    }

    #[test]
    fn test_t2_exceeds_2t1_rejected() {
        let err = CollapseOperator::pure_dephasing(50.0, 110.0, "q0").unwrap_err();
        assert!(err.to_string().contains("must be ≤ 2*T1"));
    }

    #[test]
    fn test_t2_equals_2t1_zero_dephasing() {
        let op = CollapseOperator::pure_dephasing(50.0, 100.0, "q0").unwrap();
        assert_relative_eq!(op.rate, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_negative_rate_rejected() {
        assert!(CollapseOperator::amplitude_damping(-1.0, "q0").is_err());
        assert!(CollapseOperator::new(sigmax().unwrap(), f64::NAN, "x").is_err());
    }

    #[test]
    fn test_non_operator_rejected() {
        let ket = crate::qobj::basis(2, 0).unwrap();
        assert!(matches!(
            CollapseOperator::new(ket, 1.0, "bad"),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_from_t1_t2_creates_two_operators() {
        let ops = CollapseOperator::from_t1_t2(50.0, 30.0, "q0").unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].label, "T1_q0");
        assert_relative_eq!(ops[0].rate, 0.02, epsilon = 1e-15);
        assert_eq!(ops[1].label, "Tphi_q0");
    }

    #[test]
    fn test_bare_operator_has_unit_rate() {
        let a = destroy(3).unwrap();
        let op = CollapseOperator::from(a.clone());
        assert_eq!(op.rate, 1.0);
        assert_eq!(op.jump_operator(), a);
    }
}
