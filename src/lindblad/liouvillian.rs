// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vectorized Lindblad generator.
//!
//! With column-stacking vec(AρB) = (Bᵀ⊗A)·vec(ρ) the master equation
//! dρ/dt = −i[H, ρ] + Σ_k D[L_k](ρ) becomes dx/dt = 𝓛x with
//!
//!   𝓛 = −i(I⊗H − Hᵀ⊗I) + Σ_k [ conj(L_k)⊗L_k − ½(I⊗L_k†L_k + (L_k†L_k)ᵀ⊗I) ]
//!
//! Ref: Havel (2003), J. Math. Phys. 44, 534.

use ndarray::linalg::kron;
use ndarray::Array2;
use num_complex::Complex64;
use tracing::warn;

use super::types::CollapseOperator;
use crate::error::{Diagnostic, Error, Result};
use crate::linalg::{CsrMatrix, LinearOperator};
use crate::qobj::{QObj, QObjKind};

/// Elementwise |H − H†| above which a Hamiltonian is flagged.
pub const HERMITICITY_TOLERANCE: f64 = 1e-10;

/// Immutable Lindblad superoperator.
#[derive(Debug, Clone)]
pub struct Liouvillian {
    superop: QObj,
    num_collapse: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Liouvillian {
    /// Build 𝓛 from a Hamiltonian and collapse channels.
    ///
    /// Every operator must share the Hamiltonian's dims. A non-Hermitian
    /// Hamiltonian is reported through [`Liouvillian::diagnostics`].
    pub fn build(hamiltonian: &QObj, c_ops: &[CollapseOperator]) -> Result<Self> {
        let mut diagnostics = Vec::new();
        if let Some(d) = check_hamiltonian(hamiltonian)? {
            diagnostics.push(d);
        }
        let jumps = jump_operators(hamiltonian, c_ops)?;

        let n = hamiltonian.hilbert_size();
        let eye = Array2::from_diag_elem(n, Complex64::new(1.0, 0.0));
        let h = hamiltonian.data();
        let minus_i = Complex64::new(0.0, -1.0);
        let half = Complex64::new(0.5, 0.0);

        let mut data = (kron(&eye, h) - kron(&h.t(), &eye)) * minus_i;
        for l in &jumps {
            let l = l.data();
            let ldag_l = l.adjoint().dot(l);
            data = data + kron(&l.mapv(|z| z.conj()), l)
                - (kron(&eye, &ldag_l) + kron(&ldag_l.t(), &eye)) * half;
        }

        let superop = QObj::new(data, hamiltonian.dims().to_vec(), QObjKind::SuperOperator)?;
        Ok(Self {
            superop,
            num_collapse: jumps.len(),
            diagnostics,
        })
    }

    /// The superoperator as a quantum object.
    pub fn as_qobj(&self) -> &QObj {
        &self.superop
    }

    /// Dense matrix of side N².
    pub fn data(&self) -> &Array2<Complex64> {
        self.superop.data()
    }

    /// CSR copy of the generator.
    pub fn to_sparse(&self) -> CsrMatrix {
        CsrMatrix::from_dense(self.superop.data())
    }

    /// Subsystem dims of the underlying Hilbert space.
    pub fn dims(&self) -> &[usize] {
        self.superop.dims()
    }

    /// Number of collapse channels folded into the generator.
    pub fn num_collapse(&self) -> usize {
        self.num_collapse
    }

    /// Non-fatal findings from construction.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// H_eff = H − (i/2)·Σ_k L_k†L_k with L_k the effective jump operators.
pub fn effective_hamiltonian(hamiltonian: &QObj, c_ops: &[CollapseOperator]) -> Result<QObj> {
    let jumps = jump_operators(hamiltonian, c_ops)?;
    let mut data = hamiltonian.data().clone();
    let minus_half_i = Complex64::new(0.0, -0.5);
    for l in &jumps {
        let l = l.data();
        data = data + l.adjoint().dot(l) * minus_half_i;
    }
    QObj::operator(data, hamiltonian.dims().to_vec())
}

/// Flag a Hamiltonian that is not Hermitian within
/// [`HERMITICITY_TOLERANCE`] (scaled by its norm).
pub fn check_hamiltonian(hamiltonian: &QObj) -> Result<Option<Diagnostic>> {
    if !hamiltonian.is_operator() {
        return Err(Error::dims("hamiltonian", QObjKind::Operator, hamiltonian.kind()));
    }
    let deviation = hamiltonian.hermiticity_deviation();
    let tol = HERMITICITY_TOLERANCE * hamiltonian.norm().max(1.0);
    if deviation > tol {
        warn!(deviation, "Hamiltonian is not Hermitian");
        return Ok(Some(Diagnostic::NonHermitian { deviation }));
    }
    Ok(None)
}

/// Effective jump operators, checked against the Hamiltonian's dims.
pub(crate) fn jump_operators(hamiltonian: &QObj, c_ops: &[CollapseOperator]) -> Result<Vec<QObj>> {
    c_ops
        .iter()
        .map(|op| {
            if !op.operator.is_operator() {
                return Err(Error::dims(
                    format!("collapse operator '{}'", op.label),
                    QObjKind::Operator,
                    op.operator.kind(),
                ));
            }
            if op.operator.dims() != hamiltonian.dims() {
                return Err(Error::dims(
                    format!("collapse operator '{}'", op.label),
                    hamiltonian.dims(),
                    op.operator.dims(),
                ));
            }
            Ok(op.jump_operator())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lindblad::dissipator::lindblad_rhs;
    use crate::qobj::{destroy, num, qeye, sigmam, sigmax, sigmaz, unvectorize, vectorize};
    use approx::assert_relative_eq;

    fn test_rho() -> Array2<Complex64> {
        // Hermitian, unit trace, not diagonal
        let mut rho = Array2::zeros((3, 3));
        rho[[0, 0]] = Complex64::new(0.5, 0.0);
        rho[[1, 1]] = Complex64::new(0.3, 0.0);
        rho[[2, 2]] = Complex64::new(0.2, 0.0);
        rho[[0, 1]] = Complex64::new(0.1, 0.05);
        rho[[1, 0]] = Complex64::new(0.1, -0.05);
        rho[[1, 2]] = Complex64::new(0.0, 0.07);
        rho[[2, 1]] = Complex64::new(0.0, -0.07);
        rho
    }

    #[test]
    fn test_matches_matrix_form_rhs() {
        let h = num(3).unwrap().scale(Complex64::new(1.3, 0.0));
        let c_ops = vec![
            CollapseOperator::new(destroy(3).unwrap(), 0.4, "decay").unwrap(),
            CollapseOperator::new(num(3).unwrap(), 0.1, "dephase").unwrap(),
        ];
        let l = Liouvillian::build(&h, &c_ops).unwrap();
        let rho = test_rho();

        let from_super = unvectorize(&l.data().dot(&vectorize(&rho)), 3).unwrap();
        let from_matrix = lindblad_rhs(&h, &c_ops, &rho).unwrap();
        for (a, b) in from_super.iter().zip(from_matrix.iter()) {
            assert_relative_eq!((a - b).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_generator_is_trace_preserving() {
        // Σ_i 𝓛[(i,i), :] = 0: the trace functional annihilates 𝓛
        let h = sigmax().unwrap();
        let c_ops = vec![CollapseOperator::amplitude_damping(0.7, "q0").unwrap()];
        let l = Liouvillian::build(&h, &c_ops).unwrap();
        let n = 2;
        for col in 0..n * n {
            let s: Complex64 = (0..n).map(|i| l.data()[[i + n * i, col]]).sum();
            assert_relative_eq!(s.norm(), 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_shape_and_kind() {
        let h = qeye(4).unwrap();
        let l = Liouvillian::build(&h, &[]).unwrap();
        assert_eq!(l.as_qobj().kind(), QObjKind::SuperOperator);
        assert_eq!(l.data().shape(), &[16, 16]);
        assert_eq!(l.num_collapse(), 0);
        assert!(l.diagnostics().is_empty());
    }

    #[test]
    fn test_dims_mismatch_rejected() {
        let h = sigmaz().unwrap();
        let c_ops = vec![CollapseOperator::from(destroy(3).unwrap())];
        assert!(matches!(
            Liouvillian::build(&h, &c_ops),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_non_hermitian_is_diagnostic_not_error() {
        let h = sigmam().unwrap();
        let l = Liouvillian::build(&h, &[]).unwrap();
        assert!(matches!(
            l.diagnostics(),
            [Diagnostic::NonHermitian { deviation }] if (*deviation - 1.0).abs() < 1e-12
        ));
    }

    #[test]
    fn test_sparse_copy_matches_dense() {
        let h = num(3).unwrap();
        let c_ops = vec![CollapseOperator::from(destroy(3).unwrap())];
        let l = Liouvillian::build(&h, &c_ops).unwrap();
        let sparse = l.to_sparse();
        assert!(sparse.nnz() < 81);
        assert_eq!(&sparse.to_dense(), l.data());
    }

    #[test]
    fn test_effective_hamiltonian() {
        let h = sigmaz().unwrap();
        let c_ops = vec![CollapseOperator::amplitude_damping(2.0, "q0").unwrap()];
        let h_eff = effective_hamiltonian(&h, &c_ops).unwrap();
        // σ⁺σ⁻ = |1⟩⟨1|, so H_eff[1,1] = 1 − i
        assert_relative_eq!(h_eff.data()[[1, 1]].re, 1.0, epsilon = 1e-15);
        assert_relative_eq!(h_eff.data()[[1, 1]].im, -1.0, epsilon = 1e-15);
        assert_relative_eq!(h_eff.data()[[0, 0]].im, 0.0, epsilon = 1e-15);
    }
}
