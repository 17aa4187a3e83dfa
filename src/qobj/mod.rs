// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Quantum objects: kets, operators and superoperators with dims metadata.
//!
//! This is the minimal object model the evolution engine consumes. It keeps
//! data dense; the solvers convert generators into whichever
//! [`LinearOperator`](crate::linalg::LinearOperator) backend is selected.

pub mod operators;
pub mod types;

pub use operators::{basis, create, destroy, num, qeye, sigmam, sigmap, sigmax, sigmay, sigmaz};
pub use types::{unvectorize, vectorize, QObj, QObjKind};
