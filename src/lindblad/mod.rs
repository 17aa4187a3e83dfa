// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lindblad master equation generators for open quantum systems.
//!
//! Implements the Gorini–Kossakowski–Sudarshan–Lindblad (GKSL) master equation:
//!
//!   dρ/dt = -i[H, ρ] + Σ_k γ_k (L_k ρ L_k† − ½{L_k†L_k, ρ})
//!
//! This module provides:
//! - Collapse channels for amplitude damping and pure dephasing
//! - The vectorized Liouvillian superoperator (dense or CSR)
//! - The non-Hermitian effective Hamiltonian used by quantum trajectories
//! - A matrix-form right-hand side for cross-checking
//!
//! # Example
//!
//! ```
//! use qubit_os_dynamics::lindblad::{CollapseOperator, Liouvillian};
//! use qubit_os_dynamics::qobj::sigmaz;
//!
//! let h = sigmaz().unwrap();
//! let ops = CollapseOperator::from_t1_t2(50.0, 30.0, "q0").unwrap();
//! let l = Liouvillian::build(&h, &ops).unwrap();
//! assert_eq!(l.data().shape(), &[4, 4]);
//! ```
//!
//! # References
//!
//! - Lindblad, G. (1976). Commun. Math. Phys. 48, 119.
//!   DOI: 10.1007/BF01608499
//! - Gorini, V., Kossakowski, A., & Sudarshan, E. C. G. (1976). J. Math. Phys. 17, 821.
//!   DOI: 10.1063/1.522979
//! - Breuer, H.-P. & Petruccione, F. (2002). "The Theory of Open Quantum Systems." Oxford.

pub mod dissipator;
pub mod liouvillian;
pub mod types;

pub use dissipator::{dissipator, lindblad_rhs};
pub use liouvillian::{check_hamiltonian, effective_hamiltonian, Liouvillian, HERMITICITY_TOLERANCE};
pub use types::CollapseOperator;
