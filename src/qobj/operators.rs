// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Standard states and operators.
//!
//! Two-level conventions put the ground state first: |0⟩ = ground,
//! |1⟩ = excited. Accordingly
//!
//!   σ⁻ = |0⟩⟨1|,  σ⁺ = |1⟩⟨0|,  σz = |1⟩⟨1| − |0⟩⟨0|,
//!
//! and σy = i(σ⁻ − σ⁺) so that σ± = (σx ± iσy)/2 and [σx, σy] = 2iσz hold.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use super::types::QObj;
use crate::error::{Error, Result};

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// Fock/computational basis ket |k⟩ in an `n`-level space.
pub fn basis(n: usize, k: usize) -> Result<QObj> {
    if k >= n {
        return Err(Error::dims("basis index", format!("< {}", n), k));
    }
    let mut v = Array1::zeros(n);
    v[k] = c(1.0, 0.0);
    QObj::ket(v, vec![n])
}

/// Identity operator.
pub fn qeye(n: usize) -> Result<QObj> {
    QObj::from_matrix(Array2::from_diag_elem(n, c(1.0, 0.0)))
}

/// Truncated annihilation operator a, with a|k⟩ = √k |k−1⟩.
pub fn destroy(n: usize) -> Result<QObj> {
    let mut m = Array2::zeros((n, n));
    for k in 1..n {
        m[[k - 1, k]] = c((k as f64).sqrt(), 0.0);
    }
    QObj::from_matrix(m)
}

/// Truncated creation operator a†.
pub fn create(n: usize) -> Result<QObj> {
    Ok(destroy(n)?.dag())
}

/// Number operator a†a.
pub fn num(n: usize) -> Result<QObj> {
    let diag: Array1<Complex64> = (0..n).map(|k| c(k as f64, 0.0)).collect();
    QObj::from_matrix(Array2::from_diag(&diag))
}

/// Lowering operator σ⁻ = |0⟩⟨1|.
pub fn sigmam() -> Result<QObj> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 1]] = c(1.0, 0.0);
    QObj::from_matrix(m)
}

/// Raising operator σ⁺ = |1⟩⟨0|.
pub fn sigmap() -> Result<QObj> {
    Ok(sigmam()?.dag())
}

pub fn sigmax() -> Result<QObj> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 1]] = c(1.0, 0.0);
    m[[1, 0]] = c(1.0, 0.0);
    QObj::from_matrix(m)
}

pub fn sigmay() -> Result<QObj> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 1]] = c(0.0, 1.0);
    m[[1, 0]] = c(0.0, -1.0);
    QObj::from_matrix(m)
}

/// σz = |1⟩⟨1| − |0⟩⟨0|.
pub fn sigmaz() -> Result<QObj> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 0]] = c(-1.0, 0.0);
    m[[1, 1]] = c(1.0, 0.0);
    QObj::from_matrix(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_close(a: &QObj, b: &QObj) {
        for (x, y) in a.data().iter().zip(b.data().iter()) {
            assert_relative_eq!((x - y).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_basis_out_of_range() {
        assert!(basis(2, 2).is_err());
    }

    #[test]
    fn test_number_operator_is_adag_a() {
        let a = destroy(5).unwrap();
        let n = create(5).unwrap().matmul(&a).unwrap();
        assert_close(&n, &num(5).unwrap());
    }

    #[test]
    fn test_sigma_ladder_relation() {
        // σ± = (σx ± iσy)/2
        let x = sigmax().unwrap();
        let iy = sigmay().unwrap().scale(c(0.0, 1.0));
        let half = c(0.5, 0.0);
        assert_close(&x.add(&iy).unwrap().scale(half), &sigmap().unwrap());
        assert_close(&x.sub(&iy).unwrap().scale(half), &sigmam().unwrap());
    }

    #[test]
    fn test_pauli_commutator() {
        // [σx, σy] = 2iσz
        let x = sigmax().unwrap();
        let y = sigmay().unwrap();
        let comm = x.matmul(&y).unwrap().sub(&y.matmul(&x).unwrap()).unwrap();
        assert_close(&comm, &sigmaz().unwrap().scale(c(0.0, 2.0)));
    }

    #[test]
    fn test_sigmam_lowers_excited_state() {
        let out = sigmam().unwrap().matmul(&basis(2, 1).unwrap()).unwrap();
        assert_close(&out, &basis(2, 0).unwrap());
    }
}
