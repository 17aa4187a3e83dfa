// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic evolution: Schrödinger and Lindblad master equations.
//!
//! Both reduce to dx/dt = G·x:
//!
//! - closed systems: G = −iH acting on a ket,
//! - open systems: G = 𝓛 acting on vec(ρ).
//!
//! The integrator steps freely; observables are read at the requested
//! times from the dense output.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::integrator::Propagator;
use super::options::{Method, SolverOptions, SolverStats};
use crate::error::{Diagnostic, Error, Result, ValidationError};
use crate::linalg::{Backend, CsrMatrix, LinearOperator};
use crate::lindblad::{check_hamiltonian, CollapseOperator, Liouvillian};
use crate::qobj::{vectorize, QObj, QObjKind};
use crate::validation::{
    validate_initial_ket, validate_observables, validate_solver_options, validate_times,
};

/// Callback run between accepted steps. It may rewrite the state but not
/// change its length.
pub type StepHook<'a> = &'a mut dyn FnMut(f64, &mut Array1<Complex64>);

/// Reads observables off the evolved vector.
pub trait Sampler {
    /// Number of observables produced per sample.
    fn num_observables(&self) -> usize;

    /// Write one value per observable into `out`.
    fn sample(&self, x: &Array1<Complex64>, out: &mut [Complex64]);

    /// tr(unvec(x)) for vectorized density matrices; `None` for kets.
    fn trace(&self, _x: &Array1<Complex64>) -> Option<Complex64> {
        None
    }
}

/// ⟨ψ|O|ψ⟩ on kets, optionally divided by ⟨ψ|ψ⟩.
#[derive(Debug, Clone)]
pub struct KetSampler {
    ops: Vec<Array2<Complex64>>,
    normalize: bool,
}

impl KetSampler {
    /// Build from observables on a system with the given dims.
    pub fn new(e_ops: &[QObj], dims: &[usize], normalize: bool) -> Result<Self> {
        validate_observables(e_ops, dims)?;
        Ok(Self {
            ops: e_ops.iter().map(|op| op.data().clone()).collect(),
            normalize,
        })
    }
}

impl Sampler for KetSampler {
    fn num_observables(&self) -> usize {
        self.ops.len()
    }

    fn sample(&self, x: &Array1<Complex64>, out: &mut [Complex64]) {
        let scale = if self.normalize {
            let n: f64 = x.iter().map(|z| z.norm_sqr()).sum();
            if n > 0.0 {
                1.0 / n
            } else {
                1.0
            }
        } else {
            1.0
        };
        for (op, slot) in self.ops.iter().zip(out.iter_mut()) {
            let o_x = op.dot(x);
            let value: Complex64 = x.iter().zip(o_x.iter()).map(|(a, b)| a.conj() * b).sum();
            *slot = value * scale;
        }
    }
}

/// tr(O·ρ) on column-stacked density matrices.
#[derive(Debug, Clone)]
pub struct DensitySampler {
    ops: Vec<Array2<Complex64>>,
    n: usize,
}

impl DensitySampler {
    /// Build from observables on a system with the given dims.
    pub fn new(e_ops: &[QObj], dims: &[usize]) -> Result<Self> {
        validate_observables(e_ops, dims)?;
        Ok(Self {
            ops: e_ops.iter().map(|op| op.data().clone()).collect(),
            n: dims.iter().product(),
        })
    }
}

impl Sampler for DensitySampler {
    fn num_observables(&self) -> usize {
        self.ops.len()
    }

    fn sample(&self, x: &Array1<Complex64>, out: &mut [Complex64]) {
        // tr(Oρ) = Σ_ij O_ij ρ_ji and ρ_ji sits at x[i·n + j]
        for (op, slot) in self.ops.iter().zip(out.iter_mut()) {
            *slot = op.iter().zip(x.iter()).map(|(o, r)| o * r).sum();
        }
    }

    fn trace(&self, x: &Array1<Complex64>) -> Option<Complex64> {
        Some((0..self.n).map(|i| x[i * (self.n + 1)]).sum())
    }
}

/// Output of a deterministic run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Output times
    pub times: Vec<f64>,
    /// Expectation values, shape (observables, times)
    pub expect: Array2<Complex64>,
    /// State at every output time (kets or vec(ρ)), if requested
    pub states: Option<Vec<Array1<Complex64>>>,
    /// State at the last output time
    pub final_state: Array1<Complex64>,
    /// Integrator work
    pub stats: SolverStats,
    /// Non-fatal findings
    pub diagnostics: Vec<Diagnostic>,
}

impl EvolutionResult {
    /// Real parts of one observable's row.
    pub fn expect_real(&self, observable: usize) -> Vec<f64> {
        self.expect.row(observable).iter().map(|z| z.re).collect()
    }
}

/// Integrate dx/dt = G·x from `times[0]` and sample at every entry of
/// `times`.
pub fn evolve<G: LinearOperator, S: Sampler + ?Sized>(
    generator: &G,
    x0: Array1<Complex64>,
    times: &[f64],
    sampler: &S,
    options: &SolverOptions,
    mut hook: Option<StepHook<'_>>,
) -> Result<EvolutionResult> {
    validate_times(times)?;
    validate_solver_options(options)?;

    let n_obs = sampler.num_observables();
    let t_final = times[times.len() - 1];
    let mut expect = Array2::zeros((n_obs, times.len()));
    let mut states = options.store_states.then(Vec::new);
    let mut buf = vec![Complex64::new(0.0, 0.0); n_obs];

    let mut prop = Propagator::new(generator, x0, times[0], options)?;
    let trace0 = sampler.trace(prop.state());

    let mut record = |idx: usize, x: &Array1<Complex64>| {
        sampler.sample(x, &mut buf);
        for (k, v) in buf.iter().enumerate() {
            expect[[k, idx]] = *v;
        }
        if let Some(states) = states.as_mut() {
            states.push(x.clone());
        }
    };

    record(0, prop.state());
    let mut next = 1;
    while next < times.len() {
        let limit = match prop.method() {
            Method::Dopri5 => t_final,
            Method::Expm => times[next],
        };
        prop.step(limit)?;
        check_trace(sampler, trace0, prop.time(), prop.state(), options.trace_tolerance)?;

        while next < times.len() && times[next] <= prop.time() {
            let x = prop.state_at(times[next])?;
            check_trace(sampler, trace0, times[next], &x, options.trace_tolerance)?;
            record(next, &x);
            prop.mark();
            next += 1;
        }

        if let Some(hook) = hook.as_mut() {
            if next < times.len() {
                let t = prop.time();
                let mut x = prop.state().clone();
                hook(t, &mut x);
                if x.len() != prop.state().len() {
                    return Err(Error::dims("step hook state", prop.state().len(), x.len()));
                }
                prop.reset(t, x)?;
            }
        }
    }

    let stats = prop.stats();
    debug!(
        method = %prop.method(),
        steps = stats.steps,
        rejected = stats.rejected_steps,
        rhs_evaluations = stats.rhs_evaluations,
        "Evolution finished"
    );

    Ok(EvolutionResult {
        times: times.to_vec(),
        expect,
        states,
        final_state: prop.state().clone(),
        stats,
        diagnostics: Vec::new(),
    })
}

fn check_trace<S: Sampler + ?Sized>(
    sampler: &S,
    trace0: Option<Complex64>,
    t: f64,
    x: &Array1<Complex64>,
    tolerance: f64,
) -> Result<()> {
    if let (Some(tr0), Some(tr)) = (trace0, sampler.trace(x)) {
        let drift = (tr - tr0).norm();
        if !(drift <= tolerance) {
            return Err(Error::integration(
                format!("trace drifted by {:.3e} (tolerance {:.1e})", drift, tolerance),
                t,
                &x.to_vec(),
            ));
        }
    }
    Ok(())
}

/// Schrödinger equation dψ/dt = −iHψ.
pub fn sesolve(
    hamiltonian: &QObj,
    psi0: &QObj,
    times: &[f64],
    e_ops: &[QObj],
    options: &SolverOptions,
) -> Result<EvolutionResult> {
    if !psi0.is_ket() {
        return Err(Error::dims("sesolve initial state", QObjKind::Ket, psi0.kind()));
    }
    if psi0.dims() != hamiltonian.dims() {
        return Err(Error::dims("sesolve initial state", hamiltonian.dims(), psi0.dims()));
    }
    validate_initial_ket(psi0)?;
    let diagnostics: Vec<Diagnostic> = check_hamiltonian(hamiltonian)?.into_iter().collect();
    let sampler = KetSampler::new(e_ops, hamiltonian.dims(), false)?;
    let generator = hamiltonian.data() * Complex64::new(0.0, -1.0);
    let x0 = psi0.to_vector()?;

    let mut result = match options.backend {
        Backend::Dense => evolve(&generator, x0, times, &sampler, options, None)?,
        Backend::Sparse => {
            let sparse = CsrMatrix::from_dense(&generator);
            evolve(&sparse, x0, times, &sampler, options, None)?
        }
    };
    result.diagnostics = diagnostics;
    Ok(result)
}

/// Lindblad master equation on vec(ρ).
///
/// A ket initial state is converted to |ψ⟩⟨ψ|. The master equation is
/// integrated even without collapse operators.
pub fn mesolve(
    hamiltonian: &QObj,
    rho0: &QObj,
    c_ops: &[CollapseOperator],
    times: &[f64],
    e_ops: &[QObj],
    options: &SolverOptions,
) -> Result<EvolutionResult> {
    let rho = match rho0.kind() {
        QObjKind::Ket => rho0.ket2dm()?,
        QObjKind::Operator => rho0.clone(),
        other => return Err(Error::dims("mesolve initial state", "ket or oper", other)),
    };
    if rho.dims() != hamiltonian.dims() {
        return Err(Error::dims("mesolve initial state", hamiltonian.dims(), rho.dims()));
    }
    let trace = rho.trace()?;
    if (trace - Complex64::new(1.0, 0.0)).norm() > options.trace_tolerance {
        return Err(ValidationError::PhysicsConstraint(format!(
            "initial density matrix has trace {} (expected 1)",
            trace
        ))
        .into());
    }

    let liouvillian = Liouvillian::build(hamiltonian, c_ops)?;
    let sampler = DensitySampler::new(e_ops, hamiltonian.dims())?;
    let x0 = vectorize(rho.data());

    let mut result = match options.backend {
        Backend::Dense => evolve(liouvillian.data(), x0, times, &sampler, options, None)?,
        Backend::Sparse => evolve(&liouvillian.to_sparse(), x0, times, &sampler, options, None)?,
    };
    result.diagnostics = liouvillian.diagnostics().to_vec();
    Ok(result)
}
