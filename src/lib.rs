// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS Dynamics
//!
//! Time evolution of open and closed quantum systems: the Lindblad master
//! equation on vectorized density matrices, and its stochastic unravelling
//! into Monte-Carlo quantum trajectories run as a parallel, shardable
//! ensemble.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        mcsolve / mesolve / sesolve          │
//! ├──────────────────────┬──────────────────────┤
//! │  Ensemble executor   │                      │
//! │  (rayon, sharding)   │                      │
//! ├──────────────────────┤  Liouvillian builder │
//! │  Trajectory engine   │                      │
//! │  (H_eff, jumps)      │                      │
//! ├──────────────────────┴──────────────────────┤
//! │   Propagator (Dormand–Prince 5(4) / expm)   │
//! ├─────────────────────────────────────────────┤
//! │  LinearOperator: dense ndarray | CSR sparse │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`qobj`]: Quantum objects and standard operators
//! - [`linalg`]: Linear-algebra backends
//! - [`lindblad`]: Collapse operators, Liouvillian, effective Hamiltonian
//! - [`solver`]: Deterministic integrators and master-equation solver
//! - [`trajectory`]: Single quantum trajectories
//! - [`ensemble`]: Parallel trajectory ensembles
//! - [`config`]: Configuration management
//! - [`validation`]: Input validation utilities
//! - [`error`]: Error types

pub mod config;
pub mod ensemble;
pub mod error;
pub mod linalg;
pub mod lindblad;
pub mod qobj;
pub mod solver;
pub mod trajectory;
pub mod validation;

pub use config::Config;
pub use ensemble::{mcsolve, EnsembleOptions, EnsembleResult, EnsembleStatus};
pub use error::{Diagnostic, Error, Result};
pub use lindblad::{CollapseOperator, Liouvillian};
pub use qobj::{QObj, QObjKind};
pub use solver::{mesolve, sesolve, EvolutionResult, Method, SolverOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
