// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trajectory ensembles: scheduling, seeding, aggregation and sharding.
//!
//! Each run builds its own rayon thread pool. Trajectory `i` is always run
//! with `trajectory_seed(master, i)`, so a distributed run split into shards
//! and merged with [`EnsembleResult::merge`] covers exactly the same
//! trajectories as a single-process run.
//!
//! ```no_run
//! use qubit_os_dynamics::ensemble::{mcsolve, EnsembleOptions};
//! use qubit_os_dynamics::lindblad::CollapseOperator;
//! use qubit_os_dynamics::qobj::{basis, sigmaz};
//! use qubit_os_dynamics::solver::SolverOptions;
//! use qubit_os_dynamics::QObj;
//! use ndarray::Array2;
//!
//! let h = QObj::from_matrix(Array2::zeros((2, 2))).unwrap();
//! let c_ops = vec![CollapseOperator::amplitude_damping(0.5, "q0").unwrap()];
//! let times: Vec<f64> = (0..=20).map(|i| 0.25 * i as f64).collect();
//! let opts = EnsembleOptions { ntraj: 1000, seed: Some(7), ..Default::default() };
//!
//! let result = mcsolve(
//!     &h,
//!     &basis(2, 1).unwrap(),
//!     &c_ops,
//!     &times,
//!     &[sigmaz().unwrap()],
//!     &SolverOptions::default(),
//!     &opts,
//!     None,
//! )
//! .unwrap();
//! println!("{}", result.status);
//! ```

pub mod executor;
pub mod options;
pub mod result;
pub mod seed;
pub mod stats;

pub use executor::{mcsolve, run_ensemble, Progress, ProgressFn};
pub use options::{EnsembleOptions, Shard};
pub use result::{EnsembleResult, EnsembleStatus, FailureKind, JumpLog, TrajectoryFailure};
pub use seed::{shard_range, trajectory_seed};
pub use stats::RunningStats;
