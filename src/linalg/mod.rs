// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Linear-algebra capability interface.
//!
//! The evolution engine only ever issues matrix-vector products,
//! matrix-matrix products, adjoints and norms. Anything that implements
//! [`LinearOperator`] can be plugged in; two backends ship with the crate:
//!
//! - dense: `ndarray::Array2<Complex64>`
//! - sparse: [`CsrMatrix`] (compressed sparse row)
//!
//! Dispatch is static: solvers are generic over `G: LinearOperator`.

pub mod expm;
pub mod sparse;

use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

pub use expm::matrix_exp;
pub use sparse::CsrMatrix;

/// Narrow backend contract used by the integrators.
pub trait LinearOperator: Clone + Send + Sync {
    /// Number of rows.
    fn nrows(&self) -> usize;

    /// Number of columns.
    fn ncols(&self) -> usize;

    /// y ← A·x. `y` must already have length `nrows()`.
    fn apply_into(&self, x: &Array1<Complex64>, y: &mut Array1<Complex64>);

    /// Matrix product A·B.
    fn matmul(&self, other: &Self) -> Self;

    /// Conjugate transpose.
    fn adjoint(&self) -> Self;

    /// Frobenius norm.
    fn norm(&self) -> f64;

    /// A scaled by a complex factor.
    fn scaled(&self, factor: Complex64) -> Self;

    /// Build from a dense matrix.
    fn from_dense(m: &Array2<Complex64>) -> Self;

    /// Dense copy.
    fn to_dense(&self) -> Array2<Complex64>;

    /// A·x into a fresh vector.
    fn apply(&self, x: &Array1<Complex64>) -> Array1<Complex64> {
        let mut y = Array1::zeros(self.nrows());
        self.apply_into(x, &mut y);
        y
    }
}

/// Backend selector for solvers that build their own generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Dense `ndarray` matrices
    #[default]
    Dense,
    /// Compressed sparse row
    Sparse,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dense" => Ok(Backend::Dense),
            "sparse" | "csr" => Ok(Backend::Sparse),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

impl LinearOperator for Array2<Complex64> {
    fn nrows(&self) -> usize {
        Array2::nrows(self)
    }

    fn ncols(&self) -> usize {
        Array2::ncols(self)
    }

    fn apply_into(&self, x: &Array1<Complex64>, y: &mut Array1<Complex64>) {
        general_mat_vec_mul(
            Complex64::new(1.0, 0.0),
            self,
            x,
            Complex64::new(0.0, 0.0),
            y,
        );
    }

    fn matmul(&self, other: &Self) -> Self {
        self.dot(other)
    }

    fn adjoint(&self) -> Self {
        self.t().mapv(|z| z.conj())
    }

    fn norm(&self) -> f64 {
        self.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
    }

    fn scaled(&self, factor: Complex64) -> Self {
        self * factor
    }

    fn from_dense(m: &Array2<Complex64>) -> Self {
        m.clone()
    }

    fn to_dense(&self) -> Array2<Complex64> {
        self.clone()
    }
}

/// Squared 2-norm of a state vector.
pub fn norm_sqr(x: &Array1<Complex64>) -> f64 {
    x.iter().map(|z| z.norm_sqr()).sum()
}

/// Inner product ⟨a|b⟩ (conjugates `a`).
pub fn inner(a: &Array1<Complex64>, b: &Array1<Complex64>) -> Complex64 {
    a.iter().zip(b.iter()).map(|(x, y)| x.conj() * y).sum()
}

/// Whether every entry is finite.
pub fn all_finite(x: &Array1<Complex64>) -> bool {
    x.iter().all(|z| z.re.is_finite() && z.im.is_finite())
}
