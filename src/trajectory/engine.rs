// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-trajectory integration with jump detection.

use std::time::{Duration, Instant};

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::distributions::Open01;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Diagnostic, Error, Result};
use crate::linalg::{norm_sqr, LinearOperator};
use crate::lindblad::{check_hamiltonian, effective_hamiltonian, CollapseOperator};
use crate::qobj::{QObj, QObjKind};
use crate::solver::{ExpmPlan, KetSampler, Method, Propagator, Sampler, SolverOptions, SolverStats};
use crate::validation::{validate_initial_ket, validate_solver_options, validate_times};

/// Total channel weight below which a jump is declared invalid, relative to
/// the squared norm of the state.
const INVALID_JUMP_WEIGHT: f64 = 1e-14;

/// Cap on root-finding iterations when locating a jump.
const MAX_ROOT_ITERATIONS: usize = 100;

/// One quantum jump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpRecord {
    /// Time of the jump
    pub time: f64,
    /// Index of the collapse channel that fired
    pub channel: usize,
}

/// Observable record and jump log of one trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryResult {
    /// Trajectory index within the ensemble
    pub index: u64,
    /// Seed the trajectory was run with
    pub seed: u64,
    /// ⟨ψ|O|ψ⟩/⟨ψ|ψ⟩, shape (observables, times)
    pub expect: Array2<Complex64>,
    /// Jumps in time order
    pub jumps: Vec<JumpRecord>,
    /// Invalid-jump events
    pub diagnostics: Vec<Diagnostic>,
    /// Integrator work
    pub stats: SolverStats,
}

impl TrajectoryResult {
    /// Number of threshold crossings with no viable channel.
    pub fn invalid_jumps(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::InvalidJumpOperator { .. }))
            .count()
    }
}

/// Wall-clock budget for one trajectory, checked between steps.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    /// Budget starting now.
    pub fn after(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// Fail with `TrajectoryTimeout` once the budget is spent.
    pub fn check(&self, reached_time: f64) -> Result<()> {
        let elapsed = self.start.elapsed();
        if elapsed >= self.budget {
            return Err(Error::TrajectoryTimeout {
                elapsed_ms: elapsed.as_millis() as u64,
                reached_time,
            });
        }
        Ok(())
    }
}

/// Read-only inputs shared by every trajectory of an ensemble.
#[derive(Debug, Clone)]
pub struct TrajectoryProblem<G: LinearOperator> {
    /// −i·H_eff
    generator: G,
    /// Effective jump operators √γ_k·L_k
    jump_ops: Vec<G>,
    /// Shared exponentials for [`Method::Expm`]
    expm: Option<ExpmPlan>,
    sampler: KetSampler,
    psi0: Array1<Complex64>,
    times: Vec<f64>,
    options: SolverOptions,
    diagnostics: Vec<Diagnostic>,
}

impl<G: LinearOperator> TrajectoryProblem<G> {
    /// Validate inputs and build H_eff and the jump operators.
    pub fn new(
        hamiltonian: &QObj,
        psi0: &QObj,
        c_ops: &[CollapseOperator],
        times: &[f64],
        e_ops: &[QObj],
        options: &SolverOptions,
    ) -> Result<Self> {
        validate_times(times)?;
        validate_solver_options(options)?;
        if !psi0.is_ket() {
            return Err(Error::dims("trajectory initial state", QObjKind::Ket, psi0.kind()));
        }
        if psi0.dims() != hamiltonian.dims() {
            return Err(Error::dims(
                "trajectory initial state",
                hamiltonian.dims(),
                psi0.dims(),
            ));
        }
        validate_initial_ket(psi0)?;

        let diagnostics = check_hamiltonian(hamiltonian)?.into_iter().collect();
        let h_eff = effective_hamiltonian(hamiltonian, c_ops)?;
        let generator = G::from_dense(&(h_eff.data() * Complex64::new(0.0, -1.0)));
        let jump_ops = c_ops
            .iter()
            .map(|c| G::from_dense(c.jump_operator().data()))
            .collect();
        let expm = match options.method {
            Method::Expm => Some(ExpmPlan::new(&generator, fixed_step(times, options))?),
            Method::Dopri5 => None,
        };

        Ok(Self {
            generator,
            jump_ops,
            expm,
            sampler: KetSampler::new(e_ops, hamiltonian.dims(), true)?,
            psi0: psi0.unit().to_vector()?,
            times: times.to_vec(),
            options: options.clone(),
            diagnostics,
        })
    }

    /// Output times.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of collapse channels.
    pub fn num_channels(&self) -> usize {
        self.jump_ops.len()
    }

    /// Number of observables sampled.
    pub fn num_observables(&self) -> usize {
        self.sampler.num_observables()
    }

    /// Findings from construction (e.g. a non-Hermitian Hamiltonian).
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Run one trajectory.
    pub fn run(&self, index: u64, seed: u64, deadline: Option<Deadline>) -> Result<TrajectoryResult> {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_times = self.times.len();
        let t_final = self.times[n_times - 1];
        let mut expect = Array2::zeros((self.num_observables(), n_times));
        let mut buf = vec![Complex64::new(0.0, 0.0); self.num_observables()];
        let mut jumps = Vec::new();
        let mut diagnostics = Vec::new();
        let detect = !self.jump_ops.is_empty();
        let mut threshold: f64 = rng.sample(Open01);

        let psi0 = self.psi0.clone();
        let mut prop = match &self.expm {
            Some(plan) => Propagator::with_plan(&self.generator, psi0, self.times[0], &self.options, plan)?,
            None => Propagator::new(&self.generator, psi0, self.times[0], &self.options)?,
        };
        record(&self.sampler, 0, prop.state(), &mut expect, &mut buf);

        let mut next = 1;
        while next < n_times {
            if let Some(deadline) = &deadline {
                deadline.check(prop.time())?;
            }
            let limit = match prop.method() {
                Method::Dopri5 => t_final,
                Method::Expm => self.times[next],
            };
            prop.step(limit)?;

            let jump_at = if detect && norm_sqr(prop.state()) <= threshold {
                let t_start = prop.segment_start().unwrap_or_else(|| prop.time());
                Some(self.locate_jump(&mut prop, t_start, threshold)?)
            } else {
                None
            };

            let horizon = jump_at.unwrap_or_else(|| prop.time());
            while next < n_times && self.times[next] <= horizon {
                let x = prop.state_at(self.times[next])?;
                record(&self.sampler, next, &x, &mut expect, &mut buf);
                prop.mark();
                next += 1;
            }

            if let Some(t_jump) = jump_at {
                let psi = prop.state_at(t_jump)?;
                let psi = match self.apply_jump(&psi, rng.gen::<f64>()) {
                    Some((channel, jumped)) => {
                        jumps.push(JumpRecord {
                            time: t_jump,
                            channel,
                        });
                        jumped
                    }
                    None => {
                        warn!(
                            trajectory = index,
                            time = t_jump,
                            "No viable collapse channel at jump; renormalizing"
                        );
                        diagnostics.push(Diagnostic::InvalidJumpOperator {
                            trajectory: index,
                            time: t_jump,
                        });
                        normalized(psi)
                    }
                };
                prop.reset(t_jump, psi)?;
                threshold = rng.sample(Open01);
            }
        }

        Ok(TrajectoryResult {
            index,
            seed,
            expect,
            jumps,
            diagnostics,
            stats: prop.stats(),
        })
    }

    /// Locate ‖ψ(t)‖² = r inside the last step by Illinois regula falsi.
    fn locate_jump(&self, prop: &mut Propagator<'_, G>, t_start: f64, threshold: f64) -> Result<f64> {
        let tol = self.options.jump_time_tolerance;
        let mut lo = t_start;
        let mut hi = prop.time();
        let mut f_lo = norm_sqr(&prop.state_at(lo)?) - threshold;
        let mut f_hi = norm_sqr(prop.state()) - threshold;
        if f_lo <= 0.0 {
            return Ok(lo);
        }

        let mut retained = 0i8;
        for _ in 0..MAX_ROOT_ITERATIONS {
            if hi - lo <= tol {
                break;
            }
            let mut t = hi - f_hi * (hi - lo) / (f_hi - f_lo);
            if !(t > lo && t < hi) {
                t = 0.5 * (lo + hi);
            }
            let f = norm_sqr(&prop.state_at(t)?) - threshold;
            if f == 0.0 {
                return Ok(t);
            }
            if f > 0.0 {
                lo = t;
                f_lo = f;
                if retained == 1 {
                    f_hi *= 0.5;
                }
                retained = 1;
            } else {
                hi = t;
                f_hi = f;
                if retained == -1 {
                    f_lo *= 0.5;
                }
                retained = -1;
            }
        }
        Ok(hi)
    }

    /// Pick a channel with a uniform draw `u ∈ [0, 1)` and return the
    /// normalized post-jump state. `None` when no channel has weight.
    fn apply_jump(&self, psi: &Array1<Complex64>, u: f64) -> Option<(usize, Array1<Complex64>)> {
        let probabilities = jump_probabilities(&self.jump_ops, psi)?;

        let mut acc = 0.0;
        let mut chosen = probabilities.iter().rposition(|p| *p > 0.0)?;
        for (k, p) in probabilities.iter().enumerate() {
            acc += p;
            if u < acc {
                chosen = k;
                break;
            }
        }
        Some((chosen, normalized(self.jump_ops[chosen].apply(psi))))
    }
}

/// p_k = ‖L_kψ‖² / Σ_m ‖L_mψ‖², or `None` when every channel is silent.
pub fn jump_probabilities<G: LinearOperator>(jump_ops: &[G], psi: &Array1<Complex64>) -> Option<Vec<f64>> {
    let weights: Vec<f64> = jump_ops.iter().map(|l| norm_sqr(&l.apply(psi))).collect();
    let total: f64 = weights.iter().sum();
    if !(total > INVALID_JUMP_WEIGHT * norm_sqr(psi)) {
        return None;
    }
    Some(weights.into_iter().map(|w| w / total).collect())
}

/// Length of the first regular step: the first output interval, capped
/// by `max_step`.
fn fixed_step(times: &[f64], options: &SolverOptions) -> Option<f64> {
    let interval = times.get(1).map(|t1| t1 - times[0]);
    match (interval, options.max_step) {
        (Some(dt), Some(h)) => Some(dt.min(h)),
        (Some(dt), None) => Some(dt),
        (None, _) => None,
    }
}

fn normalized(psi: Array1<Complex64>) -> Array1<Complex64> {
    let n = norm_sqr(&psi).sqrt();
    if n > 0.0 {
        psi * Complex64::new(1.0 / n, 0.0)
    } else {
        psi
    }
}

fn record(
    sampler: &KetSampler,
    idx: usize,
    x: &Array1<Complex64>,
    expect: &mut Array2<Complex64>,
    buf: &mut [Complex64],
) {
    sampler.sample(x, buf);
    for (k, v) in buf.iter().enumerate() {
        expect[[k, idx]] = *v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qobj::{basis, destroy, num, sigmam, sigmap, sigmaz};
    use crate::solver::sesolve;
    use approx::assert_relative_eq;

    type Dense = Array2<Complex64>;

    fn zero_h() -> QObj {
        QObj::from_matrix(Array2::zeros((2, 2))).unwrap()
    }

    fn decay_problem(gamma: f64, times: &[f64], options: &SolverOptions) -> TrajectoryProblem<Dense> {
        let c_ops = vec![CollapseOperator::amplitude_damping(gamma, "q0").unwrap()];
        TrajectoryProblem::new(
            &zero_h(),
            &basis(2, 1).unwrap(),
            &c_ops,
            times,
            &[sigmaz().unwrap()],
            options,
        )
        .unwrap()
    }

    #[test]
    fn test_no_collapse_matches_unitary_solver() {
        let n = 5;
        let h = num(n).unwrap();
        let psi0 = basis(n, 2).unwrap().add(&basis(n, 3).unwrap()).unwrap().unit();
        let x = destroy(n).unwrap().add(&destroy(n).unwrap().dag()).unwrap();
        let times: Vec<f64> = (0..21).map(|i| 0.25 * i as f64).collect();
        let opts = SolverOptions::default();

        let problem = TrajectoryProblem::<Dense>::new(&h, &psi0, &[], &times, &[x.clone()], &opts).unwrap();
        let traj = problem.run(0, 7, None).unwrap();
        let unitary = sesolve(&h, &psi0, &times, &[x], &opts).unwrap();

        assert!(traj.jumps.is_empty());
        for (a, b) in traj.expect.iter().zip(unitary.expect.iter()) {
            assert_relative_eq!((a - b).norm(), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_single_jump_at_threshold_crossing() {
        // ‖ψ‖² = e^{−γt}, so the jump happens at −ln(r)/γ
        let gamma = 0.7;
        let seed = 1234;
        let opts = SolverOptions {
            atol: 1e-12,
            rtol: 1e-10,
            ..Default::default()
        };
        let problem = decay_problem(gamma, &[0.0, 80.0], &opts);
        let traj = problem.run(0, seed, None).unwrap();

        let r: f64 = StdRng::seed_from_u64(seed).sample(Open01);
        let expected = -r.ln() / gamma;
        assert_eq!(traj.jumps.len(), 1);
        assert_eq!(traj.jumps[0].channel, 0);
        assert_relative_eq!(traj.jumps[0].time, expected, epsilon = 1e-6);

        // ⟨σz⟩ starts excited and ends in the ground state
        assert_relative_eq!(traj.expect[[0, 0]].re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(traj.expect[[0, 1]].re, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let times: Vec<f64> = (0..11).map(|i| 0.5 * i as f64).collect();
        let problem = decay_problem(1.0, &times, &SolverOptions::default());
        let a = problem.run(3, 99, None).unwrap();
        let b = problem.run(3, 99, None).unwrap();
        assert_eq!(a.jumps, b.jumps);
        assert_eq!(a.expect, b.expect);

        let c = problem.run(4, 100, None).unwrap();
        assert_ne!(a.jumps, c.jumps);
    }

    #[test]
    fn test_jump_probabilities_sum_to_one() {
        let ops: Vec<Dense> = vec![
            sigmam().unwrap().into_data(),
            sigmaz().unwrap().scale(Complex64::new(0.5, 0.0)).into_data(),
            sigmap().unwrap().scale(Complex64::new(0.3, 0.0)).into_data(),
        ];
        let psi = Array1::from(vec![Complex64::new(0.6, 0.1), Complex64::new(-0.2, 0.7)]);
        let p = jump_probabilities(&ops, &psi).unwrap();
        assert_eq!(p.len(), 3);
        assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        assert!(p.iter().all(|x| *x >= 0.0));

        // σ⁻|0⟩ = 0
        let ground = Array1::from(vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)]);
        assert!(jump_probabilities(&ops[..1], &ground).is_none());
    }

    #[test]
    fn test_jump_channel_follows_probabilities() {
        // (|0⟩ + |1⟩)/√2 with σ⁻ and σz at rate 1: p = [1/3, 2/3]
        let c_ops = vec![
            CollapseOperator::new(sigmam().unwrap(), 1.0, "decay").unwrap(),
            CollapseOperator::new(sigmaz().unwrap(), 1.0, "phase").unwrap(),
        ];
        let psi0 = basis(2, 0).unwrap().add(&basis(2, 1).unwrap()).unwrap().unit();
        let problem = TrajectoryProblem::<Dense>::new(
            &zero_h(),
            &psi0,
            &c_ops,
            &[0.0, 1.0],
            &[],
            &SolverOptions::default(),
        )
        .unwrap();
        let psi = psi0.to_vector().unwrap();

        let p = jump_probabilities(&problem.jump_ops, &psi).unwrap();
        assert_relative_eq!(p[0], 1.0 / 3.0, epsilon = 1e-14);

        let (channel, after) = problem.apply_jump(&psi, 0.3).unwrap();
        assert_eq!(channel, 0);
        assert_relative_eq!(after[0].norm(), 1.0, epsilon = 1e-14);

        let (channel, after) = problem.apply_jump(&psi, 0.34).unwrap();
        assert_eq!(channel, 1);
        assert_relative_eq!(norm_sqr(&after), 1.0, epsilon = 1e-14);
        assert_relative_eq!((after[0] + after[1]).norm(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_zero_initial_state_rejected() {
        let c_ops = vec![CollapseOperator::amplitude_damping(1.0, "q0").unwrap()];
        let zero = basis(2, 1).unwrap().scale(Complex64::new(0.0, 0.0));
        let err = TrajectoryProblem::<Dense>::new(
            &zero_h(),
            &zero,
            &c_ops,
            &[0.0, 1.0],
            &[],
            &SolverOptions::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            Error::Validation(crate::error::ValidationError::PhysicsConstraint(_))
        ));
    }

    #[test]
    fn test_invalid_jump_is_recovered() {
        // Anti-Hermitian H drains |1⟩ while the only channel, σ⁺, is blind to it
        let mut h = Array2::zeros((2, 2));
        h[[1, 1]] = Complex64::new(0.0, -1.0);
        let h = QObj::from_matrix(h).unwrap();
        let c_ops = vec![CollapseOperator::from(sigmap().unwrap())];
        let times: Vec<f64> = (0..11).map(|i| 0.5 * i as f64).collect();
        let problem = TrajectoryProblem::<Dense>::new(
            &h,
            &basis(2, 1).unwrap(),
            &c_ops,
            &times,
            &[sigmaz().unwrap()],
            &SolverOptions::default(),
        )
        .unwrap();
        assert!(matches!(problem.diagnostics(), [Diagnostic::NonHermitian { .. }]));

        let traj = problem.run(5, 11, None).unwrap();
        assert!(traj.jumps.is_empty());
        assert!(traj.invalid_jumps() >= 1);
        for v in traj.expect.row(0) {
            assert_relative_eq!(v.re, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_deadline_produces_timeout() {
        let problem = decay_problem(1.0, &[0.0, 1.0], &SolverOptions::default());
        let err = problem
            .run(0, 1, Some(Deadline::after(Duration::ZERO)))
            .unwrap_err();
        assert!(matches!(err, Error::TrajectoryTimeout { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_expm_plan_built_once_for_first_interval() {
        let opts = SolverOptions {
            method: Method::Expm,
            max_step: Some(0.1),
            ..Default::default()
        };
        let problem = decay_problem(1.0, &[0.0, 0.5, 1.0], &opts);
        assert_eq!(problem.expm.as_ref().and_then(ExpmPlan::step), Some(0.1));

        let coarse = SolverOptions {
            max_step: Some(2.0),
            ..opts
        };
        let problem = decay_problem(1.0, &[0.0, 0.5, 1.0], &coarse);
        assert_eq!(problem.expm.as_ref().and_then(ExpmPlan::step), Some(0.5));

        let problem = decay_problem(1.0, &[0.0, 0.5], &SolverOptions::default());
        assert!(problem.expm.is_none());
    }

    #[test]
    fn test_expm_method_detects_jumps() {
        let opts = SolverOptions {
            method: Method::Expm,
            max_step: Some(0.05),
            ..Default::default()
        };
        let problem = decay_problem(0.7, &[0.0, 80.0], &opts);
        let traj = problem.run(0, 1234, None).unwrap();
        let r: f64 = StdRng::seed_from_u64(1234).sample(Open01);
        assert_eq!(traj.jumps.len(), 1);
        assert_relative_eq!(traj.jumps[0].time, -r.ln() / 0.7, epsilon = 1e-6);
    }
}
