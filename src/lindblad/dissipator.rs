// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lindblad dissipator in matrix form.
//!
//! Computes D[L](ρ) = γ (L ρ L† − ½{L†L, ρ}) directly on density matrices.
//! The vectorized [`Liouvillian`](super::Liouvillian) must agree with this.
//!
//! Ref: Breuer & Petruccione, "The Theory of Open Quantum Systems" (2002), Ch. 3.

use ndarray::Array2;
use num_complex::Complex64;

use super::liouvillian::jump_operators;
use super::types::CollapseOperator;
use crate::error::{Error, Result};
use crate::qobj::QObj;

/// Dissipator contribution of a single channel.
///
/// D[L](ρ) = γ (L ρ L† − ½ L†L ρ − ½ ρ L†L)
pub fn dissipator(op: &CollapseOperator, rho: &Array2<Complex64>) -> Array2<Complex64> {
    if op.rate == 0.0 {
        return Array2::zeros(rho.raw_dim());
    }
    let l = op.operator.data();
    let l_dag = conjugate_transpose(l);
    let l_dag_l = l_dag.dot(l);

    let l_rho_ldag = l.dot(rho).dot(&l_dag);
    let anti = l_dag_l.dot(rho) + rho.dot(&l_dag_l);

    (l_rho_ldag - anti * Complex64::new(0.5, 0.0)) * Complex64::new(op.rate, 0.0)
}

/// Full right-hand side dρ/dt = −i[H, ρ] + Σ_k D[L_k](ρ).
pub fn lindblad_rhs(
    hamiltonian: &QObj,
    c_ops: &[CollapseOperator],
    rho: &Array2<Complex64>,
) -> Result<Array2<Complex64>> {
    let n = hamiltonian.hilbert_size();
    if rho.dim() != (n, n) {
        return Err(Error::dims("lindblad_rhs rho", (n, n), rho.dim()));
    }
    // dims check only
    jump_operators(hamiltonian, c_ops)?;

    let h = hamiltonian.data();
    let i = Complex64::new(0.0, 1.0);
    let mut out = (h.dot(rho) - rho.dot(h)) * -i;
    for op in c_ops {
        out = out + dissipator(op, rho);
    }
    Ok(out)
}

fn conjugate_transpose(m: &Array2<Complex64>) -> Array2<Complex64> {
    m.t().mapv(|z| z.conj())
}
