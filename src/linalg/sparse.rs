// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Compressed sparse row (CSR) complex matrix.
//!
//! Liouvillians are very sparse (a handful of Kronecker products of sparse
//! ladder operators), so the CSR backend keeps matrix-vector products at
//! O(nnz) instead of O(N⁴).

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use super::LinearOperator;

/// CSR matrix with complex entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<Complex64>,
}

impl CsrMatrix {
    /// Empty (all-zero) matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            indptr: vec![0; nrows + 1],
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from (row, col, value) triplets. Duplicates are summed and
    /// explicit zeros dropped.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        mut triplets: Vec<(usize, usize, Complex64)>,
    ) -> Self {
        triplets.sort_by_key(|&(r, c, _)| (r, c));

        let mut indptr = vec![0; nrows + 1];
        let mut indices = Vec::with_capacity(triplets.len());
        let mut values: Vec<Complex64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (r, c, v) in triplets {
            debug_assert!(r < nrows && c < ncols, "triplet out of bounds");
            if last == Some((r, c)) {
                if let Some(tail) = values.last_mut() {
                    *tail += v;
                }
                continue;
            }
            indices.push(c);
            values.push(v);
            indptr[r + 1] += 1;
            last = Some((r, c));
        }
        for r in 0..nrows {
            indptr[r + 1] += indptr[r];
        }

        Self {
            nrows,
            ncols,
            indptr,
            indices,
            values,
        }
        .pruned()
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate over (row, col, value) of stored entries.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Complex64)> + '_ {
        (0..self.nrows).flat_map(move |r| {
            (self.indptr[r]..self.indptr[r + 1]).map(move |k| (r, self.indices[k], self.values[k]))
        })
    }

    fn pruned(self) -> Self {
        if self.values.iter().all(|v| *v != Complex64::new(0.0, 0.0)) {
            return self;
        }
        let triplets: Vec<_> = self
            .iter()
            .filter(|(_, _, v)| *v != Complex64::new(0.0, 0.0))
            .collect();
        let mut indptr = vec![0; self.nrows + 1];
        let mut indices = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());
        for (r, c, v) in triplets {
            indptr[r + 1] += 1;
            indices.push(c);
            values.push(v);
        }
        for r in 0..self.nrows {
            indptr[r + 1] += indptr[r];
        }
        Self {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr,
            indices,
            values,
        }
    }
}

impl LinearOperator for CsrMatrix {
    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    fn apply_into(&self, x: &Array1<Complex64>, y: &mut Array1<Complex64>) {
        for r in 0..self.nrows {
            let mut acc = Complex64::new(0.0, 0.0);
            for k in self.indptr[r]..self.indptr[r + 1] {
                acc += self.values[k] * x[self.indices[k]];
            }
            y[r] = acc;
        }
    }

    fn matmul(&self, other: &Self) -> Self {
        assert_eq!(self.ncols, other.nrows, "csr matmul shape mismatch");
        // Row-by-row with a dense accumulator over the output columns.
        let mut acc = vec![Complex64::new(0.0, 0.0); other.ncols];
        let mut touched = vec![false; other.ncols];
        let mut cols: Vec<usize> = Vec::new();
        let mut triplets = Vec::new();

        for r in 0..self.nrows {
            for k in self.indptr[r]..self.indptr[r + 1] {
                let mid = self.indices[k];
                let a = self.values[k];
                for kk in other.indptr[mid]..other.indptr[mid + 1] {
                    let c = other.indices[kk];
                    if !touched[c] {
                        touched[c] = true;
                        cols.push(c);
                    }
                    acc[c] += a * other.values[kk];
                }
            }
            for &c in &cols {
                triplets.push((r, c, acc[c]));
                acc[c] = Complex64::new(0.0, 0.0);
                touched[c] = false;
            }
            cols.clear();
        }
        CsrMatrix::from_triplets(self.nrows, other.ncols, triplets)
    }

    fn adjoint(&self) -> Self {
        let triplets = self.iter().map(|(r, c, v)| (c, r, v.conj())).collect();
        CsrMatrix::from_triplets(self.ncols, self.nrows, triplets)
    }

    fn norm(&self) -> f64 {
        self.values.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
    }

    fn scaled(&self, factor: Complex64) -> Self {
        let mut out = self.clone();
        for v in &mut out.values {
            *v *= factor;
        }
        out.pruned()
    }

    fn from_dense(m: &Array2<Complex64>) -> Self {
        let zero = Complex64::new(0.0, 0.0);
        let triplets = m
            .indexed_iter()
            .filter(|(_, v)| **v != zero)
            .map(|((r, c), v)| (r, c, *v))
            .collect();
        CsrMatrix::from_triplets(m.nrows(), m.ncols(), triplets)
    }

    fn to_dense(&self) -> Array2<Complex64> {
        let mut m = Array2::zeros((self.nrows, self.ncols));
        for (r, c, v) in self.iter() {
            m[[r, c]] = v;
        }
        m
    }
}
