// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Solver options and statistics.

use serde::{Deserialize, Serialize};

use crate::linalg::Backend;

/// Integration method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Dormand–Prince 5(4), adaptive, for non-stiff generators
    #[default]
    Dopri5,
    /// Padé exponential propagator with fixed steps, for stiff generators
    Expm,
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dopri5" | "nonstiff" => Ok(Method::Dopri5),
            "expm" | "stiff" => Ok(Method::Expm),
            other => Err(format!("unknown integration method '{}'", other)),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Dopri5 => write!(f, "dopri5"),
            Method::Expm => write!(f, "expm"),
        }
    }
}

/// Options shared by the deterministic and stochastic solvers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Integration method
    #[serde(default)]
    pub method: Method,

    /// Absolute tolerance
    #[serde(default = "default_atol")]
    pub atol: f64,

    /// Relative tolerance
    #[serde(default = "default_rtol")]
    pub rtol: f64,

    /// Largest allowed step (fixed step for `Expm`)
    #[serde(default)]
    pub max_step: Option<f64>,

    /// Initial step; estimated when absent
    #[serde(default)]
    pub first_step: Option<f64>,

    /// Maximum accepted steps between consecutive output times
    #[serde(default = "default_nsteps")]
    pub nsteps: usize,

    /// Allowed drift of tr(ρ) for master-equation runs
    #[serde(default = "default_trace_tolerance")]
    pub trace_tolerance: f64,

    /// Width of the bracket the jump-time root search stops at
    #[serde(default = "default_jump_time_tolerance")]
    pub jump_time_tolerance: f64,

    /// Linear-algebra backend for generators built by the solvers
    #[serde(default)]
    pub backend: Backend,

    /// Keep the state at every output time
    #[serde(default)]
    pub store_states: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: Method::default(),
            atol: default_atol(),
            rtol: default_rtol(),
            max_step: None,
            first_step: None,
            nsteps: default_nsteps(),
            trace_tolerance: default_trace_tolerance(),
            jump_time_tolerance: default_jump_time_tolerance(),
            backend: Backend::default(),
            store_states: false,
        }
    }
}

fn default_atol() -> f64 {
    1e-8
}

fn default_rtol() -> f64 {
    1e-6
}

fn default_nsteps() -> usize {
    10_000
}

fn default_trace_tolerance() -> f64 {
    1e-6
}

fn default_jump_time_tolerance() -> f64 {
    1e-9
}

/// Integrator work counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStats {
    /// Accepted steps
    pub steps: u64,
    /// Rejected step attempts
    pub rejected_steps: u64,
    /// Generator applications
    pub rhs_evaluations: u64,
}

impl std::ops::AddAssign for SolverStats {
    fn add_assign(&mut self, other: Self) {
        self.steps += other.steps;
        self.rejected_steps += other.rejected_steps;
        self.rhs_evaluations += other.rhs_evaluations;
    }
}
