// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic time evolution.
//!
//! - [`Propagator`]: one-step-at-a-time integrator with dense output
//! - [`evolve`]: generic driver over any [`LinearOperator`](crate::linalg::LinearOperator)
//! - [`sesolve`] / [`mesolve`]: closed- and open-system entry points

pub mod evolve;
pub mod integrator;
pub mod options;

pub use evolve::{
    evolve, mesolve, sesolve, DensitySampler, EvolutionResult, KetSampler, Sampler, StepHook,
};
pub use integrator::{ExpmPlan, Propagator};
pub use options::{Method, SolverOptions, SolverStats};
