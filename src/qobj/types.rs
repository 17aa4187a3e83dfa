// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Quantum object type: a dense matrix tagged with its kind and subsystem dims.
//!
//! Every constructor and every binary operation checks the shape invariant:
//!
//! | kind            | shape              |
//! |-----------------|--------------------|
//! | `Ket`           | N × 1              |
//! | `Bra`           | 1 × N              |
//! | `Operator`      | N × N              |
//! | `OperatorKet`   | N² × 1             |
//! | `OperatorBra`   | 1 × N²             |
//! | `SuperOperator` | N² × N²            |
//!
//! where N = ∏dims.

use ndarray::linalg::kron;
use ndarray::{Array1, Array2, ShapeBuilder};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of a quantum object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QObjKind {
    /// Column state vector
    Ket,
    /// Row (dual) state vector
    Bra,
    /// Square matrix on the Hilbert space
    Operator,
    /// Square matrix on the vectorized operator space
    SuperOperator,
    /// Vectorized operator (column)
    OperatorKet,
    /// Vectorized operator (row)
    OperatorBra,
}

impl QObjKind {
    /// Expected (rows, cols) for this kind given Hilbert space size `n`.
    pub fn shape_for(self, n: usize) -> (usize, usize) {
        match self {
            QObjKind::Ket => (n, 1),
            QObjKind::Bra => (1, n),
            QObjKind::Operator => (n, n),
            QObjKind::SuperOperator => (n * n, n * n),
            QObjKind::OperatorKet => (n * n, 1),
            QObjKind::OperatorBra => (1, n * n),
        }
    }

    /// Kind after conjugate transposition.
    pub fn dual(self) -> Self {
        match self {
            QObjKind::Ket => QObjKind::Bra,
            QObjKind::Bra => QObjKind::Ket,
            QObjKind::OperatorKet => QObjKind::OperatorBra,
            QObjKind::OperatorBra => QObjKind::OperatorKet,
            other => other,
        }
    }
}

impl std::fmt::Display for QObjKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QObjKind::Ket => "ket",
            QObjKind::Bra => "bra",
            QObjKind::Operator => "oper",
            QObjKind::SuperOperator => "super",
            QObjKind::OperatorKet => "operator-ket",
            QObjKind::OperatorBra => "operator-bra",
        };
        write!(f, "{}", name)
    }
}

/// A quantum object: dense complex matrix + kind + subsystem dims.
#[derive(Debug, Clone, PartialEq)]
pub struct QObj {
    data: Array2<Complex64>,
    dims: Vec<usize>,
    kind: QObjKind,
}

impl QObj {
    /// Create a quantum object, checking the shape invariant.
    pub fn new(data: Array2<Complex64>, dims: Vec<usize>, kind: QObjKind) -> Result<Self> {
        if dims.is_empty() || dims.contains(&0) {
            return Err(Error::dims("qobj dims", "non-empty, non-zero dims", &dims));
        }
        let n: usize = dims.iter().product();
        let expected = kind.shape_for(n);
        let actual = (data.nrows(), data.ncols());
        if expected != actual {
            return Err(Error::dims(format!("{} shape", kind), expected, actual));
        }
        Ok(Self { data, dims, kind })
    }

    /// Create a ket from a column vector.
    pub fn ket(vector: Array1<Complex64>, dims: Vec<usize>) -> Result<Self> {
        let n = vector.len();
        let data = vector
            .into_shape_with_order((n, 1))
            .map_err(|e| Error::dims("ket reshape", n, e.to_string()))?;
        Self::new(data, dims, QObjKind::Ket)
    }

    /// Create an operator from a square matrix.
    pub fn operator(data: Array2<Complex64>, dims: Vec<usize>) -> Result<Self> {
        Self::new(data, dims, QObjKind::Operator)
    }

    /// Create an operator on a single subsystem of size `data.nrows()`.
    pub fn from_matrix(data: Array2<Complex64>) -> Result<Self> {
        let n = data.nrows();
        Self::new(data, vec![n], QObjKind::Operator)
    }

    /// Underlying matrix.
    pub fn data(&self) -> &Array2<Complex64> {
        &self.data
    }

    /// Consume and return the underlying matrix.
    pub fn into_data(self) -> Array2<Complex64> {
        self.data
    }

    /// Subsystem dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Object kind.
    pub fn kind(&self) -> QObjKind {
        self.kind
    }

    /// Hilbert space size ∏dims.
    pub fn hilbert_size(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_ket(&self) -> bool {
        self.kind == QObjKind::Ket
    }

    pub fn is_operator(&self) -> bool {
        self.kind == QObjKind::Operator
    }

    /// Column of a ket or operator-ket as a flat vector.
    pub fn to_vector(&self) -> Result<Array1<Complex64>> {
        match self.kind {
            QObjKind::Ket | QObjKind::OperatorKet => Ok(self.data.column(0).to_owned()),
            QObjKind::Bra | QObjKind::OperatorBra => Ok(self.data.row(0).to_owned()),
            other => Err(Error::dims("to_vector", "ket or bra", other)),
        }
    }

    /// Conjugate transpose.
    pub fn dag(&self) -> QObj {
        QObj {
            data: self.data.t().mapv(|z| z.conj()),
            dims: self.dims.clone(),
            kind: self.kind.dual(),
        }
    }

    /// Multiply by a complex scalar.
    pub fn scale(&self, factor: Complex64) -> QObj {
        QObj {
            data: &self.data * factor,
            dims: self.dims.clone(),
            kind: self.kind,
        }
    }

    /// Sum of two objects of the same kind and dims.
    pub fn add(&self, other: &QObj) -> Result<QObj> {
        self.check_same("add", other)?;
        Ok(QObj {
            data: &self.data + &other.data,
            dims: self.dims.clone(),
            kind: self.kind,
        })
    }

    /// Difference of two objects of the same kind and dims.
    pub fn sub(&self, other: &QObj) -> Result<QObj> {
        self.check_same("sub", other)?;
        Ok(QObj {
            data: &self.data - &other.data,
            dims: self.dims.clone(),
            kind: self.kind,
        })
    }

    /// Matrix product `self · other`.
    ///
    /// Supported: oper·oper, oper·ket, bra·oper, ket·bra, super·super,
    /// super·operator-ket, operator-bra·super.
    pub fn matmul(&self, other: &QObj) -> Result<QObj> {
        use QObjKind::*;
        let kind = match (self.kind, other.kind) {
            (Operator, Operator) | (Ket, Bra) => Operator,
            (Operator, Ket) => Ket,
            (Bra, Operator) => Bra,
            (SuperOperator, SuperOperator) | (OperatorKet, OperatorBra) => SuperOperator,
            (SuperOperator, OperatorKet) => OperatorKet,
            (OperatorBra, SuperOperator) => OperatorBra,
            (a, b) => {
                return Err(Error::dims(
                    "matmul kinds",
                    format!("compatible with {}", a),
                    b,
                ))
            }
        };
        if self.dims != other.dims {
            return Err(Error::dims("matmul dims", &self.dims, &other.dims));
        }
        Ok(QObj {
            data: self.data.dot(&other.data),
            dims: self.dims.clone(),
            kind,
        })
    }

    /// Tensor (Kronecker) product; dims concatenate.
    pub fn tensor(&self, other: &QObj) -> Result<QObj> {
        match self.kind {
            QObjKind::Ket | QObjKind::Bra | QObjKind::Operator if self.kind == other.kind => {}
            _ => {
                return Err(Error::dims(
                    "tensor kinds",
                    self.kind,
                    other.kind,
                ))
            }
        }
        let mut dims = self.dims.clone();
        dims.extend_from_slice(&other.dims);
        QObj::new(kron(&self.data, &other.data), dims, self.kind)
    }

    /// Trace of an operator.
    pub fn trace(&self) -> Result<Complex64> {
        if self.kind != QObjKind::Operator {
            return Err(Error::dims("trace", QObjKind::Operator, self.kind));
        }
        Ok(self.data.diag().sum())
    }

    /// Vector 2-norm for kets/bras, Frobenius norm otherwise.
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
    }

    /// Normalized copy (unit norm). Zero objects are returned unchanged.
    pub fn unit(&self) -> QObj {
        let n = self.norm();
        if n == 0.0 {
            return self.clone();
        }
        self.scale(Complex64::new(1.0 / n, 0.0))
    }

    /// Expectation value of this operator on `state`.
    ///
    /// Ket: ⟨ψ|O|ψ⟩ (not normalized). Operator: tr(O ρ).
    pub fn expect(&self, state: &QObj) -> Result<Complex64> {
        if self.kind != QObjKind::Operator {
            return Err(Error::dims("expect operand", QObjKind::Operator, self.kind));
        }
        if self.dims != state.dims {
            return Err(Error::dims("expect dims", &self.dims, &state.dims));
        }
        match state.kind {
            QObjKind::Ket => {
                let psi = state.data.column(0);
                let o_psi = self.data.dot(&psi);
                Ok(psi.iter().zip(o_psi.iter()).map(|(a, b)| a.conj() * b).sum())
            }
            QObjKind::Operator => Ok(self.data.dot(&state.data).diag().sum()),
            other => Err(Error::dims("expect state", "ket or oper", other)),
        }
    }

    /// Outer product |ψ⟩⟨ψ| of a ket.
    pub fn ket2dm(&self) -> Result<QObj> {
        if self.kind != QObjKind::Ket {
            return Err(Error::dims("ket2dm", QObjKind::Ket, self.kind));
        }
        self.matmul(&self.dag())
    }

    /// Column-stacking vectorization of an operator.
    pub fn operator_to_vector(&self) -> Result<QObj> {
        if self.kind != QObjKind::Operator {
            return Err(Error::dims(
                "operator_to_vector",
                QObjKind::Operator,
                self.kind,
            ));
        }
        let v = vectorize(&self.data);
        let len = v.len();
        let data = v
            .into_shape_with_order((len, 1))
            .map_err(|e| Error::dims("operator_to_vector", len, e.to_string()))?;
        QObj::new(data, self.dims.clone(), QObjKind::OperatorKet)
    }

    /// Inverse of [`QObj::operator_to_vector`].
    pub fn vector_to_operator(&self) -> Result<QObj> {
        if self.kind != QObjKind::OperatorKet {
            return Err(Error::dims(
                "vector_to_operator",
                QObjKind::OperatorKet,
                self.kind,
            ));
        }
        let n = self.hilbert_size();
        let data = unvectorize(&self.data.column(0).to_owned(), n)?;
        QObj::new(data, self.dims.clone(), QObjKind::Operator)
    }

    /// Largest elementwise deviation |A − A†|.
    pub fn hermiticity_deviation(&self) -> f64 {
        let adj = self.data.t().mapv(|z| z.conj());
        self.data
            .iter()
            .zip(adj.iter())
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max)
    }

    fn check_same(&self, op: &str, other: &QObj) -> Result<()> {
        if self.kind != other.kind {
            return Err(Error::dims(format!("{} kinds", op), self.kind, other.kind));
        }
        if self.dims != other.dims {
            return Err(Error::dims(format!("{} dims", op), &self.dims, &other.dims));
        }
        Ok(())
    }
}

/// Column-stacking vectorization: `v[i + n·j] = m[i, j]`.
pub fn vectorize(m: &Array2<Complex64>) -> Array1<Complex64> {
    m.t().iter().copied().collect()
}

/// Inverse of [`vectorize`] for an `n × n` matrix.
pub fn unvectorize(v: &Array1<Complex64>, n: usize) -> Result<Array2<Complex64>> {
    if v.len() != n * n {
        return Err(Error::dims("unvectorize", n * n, v.len()));
    }
    Array2::from_shape_vec((n, n).f(), v.to_vec())
        .map_err(|e| Error::dims("unvectorize", n * n, e.to_string()))
}
