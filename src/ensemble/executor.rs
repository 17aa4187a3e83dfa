// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Parallel trajectory scheduling and online aggregation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use ndarray::Array2;
use num_complex::Complex64;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use super::options::EnsembleOptions;
use super::result::{silent_channels, EnsembleResult, EnsembleStatus, FailureKind, JumpLog, TrajectoryFailure};
use super::seed::{shard_range, trajectory_seed};
use super::stats::RunningStats;
use crate::error::{Diagnostic, Error, Result};
use crate::linalg::{Backend, CsrMatrix, LinearOperator};
use crate::lindblad::CollapseOperator;
use crate::qobj::QObj;
use crate::solver::{SolverOptions, SolverStats};
use crate::trajectory::{Deadline, TrajectoryProblem, TrajectoryResult};
use crate::validation::validate_ensemble_options;

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Completed trajectories
    pub completed: usize,
    /// Failed trajectories
    pub failed: usize,
    /// Trajectories this run is responsible for
    pub planned: usize,
    /// Partial averages
    pub stats: RunningStats,
}

/// Streaming callback, invoked from worker threads.
pub type ProgressFn<'a> = &'a (dyn Fn(&Progress) + Sync);

/// What the executor needs to know about the problem beyond how to run it.
struct Layout<'a> {
    times: &'a [f64],
    num_observables: usize,
    num_channels: usize,
    diagnostics: &'a [Diagnostic],
}

/// State guarded by the aggregator lock.
struct Aggregate {
    stats: RunningStats,
    jump_counts: Vec<u64>,
    jump_logs: Vec<JumpLog>,
    invalid: Vec<Diagnostic>,
    failures: Vec<TrajectoryFailure>,
    solver_stats: SolverStats,
}

impl Aggregate {
    fn absorb(&mut self, traj: TrajectoryResult, keep_jump_logs: bool) -> Result<()> {
        self.stats.push(&traj.expect)?;
        for jump in &traj.jumps {
            if let Some(count) = self.jump_counts.get_mut(jump.channel) {
                *count += 1;
            }
        }
        self.invalid.extend(traj.diagnostics);
        self.solver_stats += traj.stats;
        if keep_jump_logs {
            self.jump_logs.push(JumpLog {
                index: traj.index,
                seed: traj.seed,
                jumps: traj.jumps,
            });
        }
        Ok(())
    }

    fn finished(&self) -> usize {
        self.stats.count() as usize + self.failures.len()
    }
}

/// Run the ensemble described by `options` over a prepared problem.
pub fn run_ensemble<G: LinearOperator>(
    problem: &TrajectoryProblem<G>,
    options: &EnsembleOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<EnsembleResult> {
    let layout = Layout {
        times: problem.times(),
        num_observables: problem.num_observables(),
        num_channels: problem.num_channels(),
        diagnostics: problem.diagnostics(),
    };
    execute(&layout, options, progress, |index, seed, deadline| {
        problem.run(index, seed, deadline)
    })
}

/// Monte-Carlo wavefunction solver: build the problem on the configured
/// backend and run the ensemble.
#[allow(clippy::too_many_arguments)]
pub fn mcsolve(
    hamiltonian: &QObj,
    psi0: &QObj,
    c_ops: &[CollapseOperator],
    times: &[f64],
    e_ops: &[QObj],
    solver: &SolverOptions,
    ensemble: &EnsembleOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<EnsembleResult> {
    validate_ensemble_options(ensemble)?;
    match solver.backend {
        Backend::Dense => {
            let problem =
                TrajectoryProblem::<Array2<Complex64>>::new(hamiltonian, psi0, c_ops, times, e_ops, solver)?;
            run_ensemble(&problem, ensemble, progress)
        }
        Backend::Sparse => {
            let problem = TrajectoryProblem::<CsrMatrix>::new(hamiltonian, psi0, c_ops, times, e_ops, solver)?;
            run_ensemble(&problem, ensemble, progress)
        }
    }
}

fn execute<F>(
    layout: &Layout<'_>,
    options: &EnsembleOptions,
    progress: Option<ProgressFn<'_>>,
    run: F,
) -> Result<EnsembleResult>
where
    F: Fn(u64, u64, Option<Deadline>) -> Result<TrajectoryResult> + Sync,
{
    validate_ensemble_options(options)?;
    let started = Instant::now();
    let master_seed = options.seed.unwrap_or_else(rand::random);
    let range = shard_range(options.ntraj, options.shard);
    let planned = range.len();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.unwrap_or(0))
        .thread_name(|i| format!("mcwf-worker-{}", i))
        .build()
        .map_err(|e| Error::EnsembleWorkerFailure(format!("thread pool: {}", e)))?;

    info!(
        ntraj = options.ntraj,
        planned,
        shard = ?options.shard,
        seed = master_seed,
        workers = pool.current_num_threads(),
        "Starting trajectory ensemble"
    );

    let aggregate = Mutex::new(Aggregate {
        stats: RunningStats::new(layout.num_observables, layout.times.len()),
        jump_counts: vec![0; layout.num_channels],
        jump_logs: Vec::new(),
        invalid: Vec::new(),
        failures: Vec::new(),
        solver_stats: SolverStats::default(),
    });
    let stop = AtomicBool::new(false);

    let outcome: Result<()> = pool.install(|| {
        range.into_par_iter().try_for_each(|i| {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }
            let index = i as u64;
            let seed = trajectory_seed(master_seed, index);
            let attempt = run_with_retries(&run, index, seed, options);

            let snapshot = {
                let mut agg = aggregate.lock();
                match attempt {
                    Ok(traj) => {
                        agg.absorb(traj, options.keep_jump_logs)?;
                        if let Some(target) = options.target_std_error {
                            let completed = agg.stats.count() as usize;
                            if completed >= options.min_trajectories
                                && agg.stats.max_std_error() <= target
                                && !stop.swap(true, Ordering::Relaxed)
                            {
                                info!(completed, target, "Ensemble converged");
                            }
                        }
                    }
                    Err(failure) => {
                        warn!(
                            trajectory = failure.index,
                            seed = failure.seed,
                            attempts = failure.attempts,
                            kind = ?failure.kind,
                            "Trajectory failed: {}",
                            failure.message
                        );
                        agg.failures.push(failure);
                    }
                }
                match options.report_every {
                    Some(every) if agg.finished() % every == 0 => Some(Progress {
                        completed: agg.stats.count() as usize,
                        failed: agg.failures.len(),
                        planned,
                        stats: agg.stats.clone(),
                    }),
                    _ => None,
                }
            };
            if let (Some(callback), Some(snapshot)) = (progress, snapshot) {
                callback(&snapshot);
            }
            Ok(())
        })
    });
    outcome?;

    let agg = aggregate.into_inner();
    let completed = agg.stats.count() as usize;
    let failed = agg.failures.len();
    if completed == 0 {
        let first = agg
            .failures
            .first()
            .map(|f| f.message.clone())
            .unwrap_or_else(|| "no trajectory ran".into());
        error!(failed, "Every trajectory failed");
        return Err(Error::EnsembleWorkerFailure(format!(
            "all {} trajectories failed; first error: {}",
            failed, first
        )));
    }

    let mut failures = agg.failures;
    failures.sort_by_key(|f| f.index);
    let mut jump_logs = agg.jump_logs;
    jump_logs.sort_by_key(|log| log.index);
    let invalid_jumps = agg.invalid.len() as u64;

    let mut diagnostics = layout.diagnostics.to_vec();
    diagnostics.extend(agg.invalid);
    diagnostics.extend(silent_channels(&agg.jump_counts));
    for d in &diagnostics {
        if matches!(d, Diagnostic::SilentChannel { .. }) {
            warn!("{}", d);
        }
    }

    let status = EnsembleStatus::from_counts(completed, failed, planned);
    info!(
        completed,
        failed,
        %status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Trajectory ensemble finished"
    );
    debug!(
        steps = agg.solver_stats.steps,
        rejected = agg.solver_stats.rejected_steps,
        rhs_evaluations = agg.solver_stats.rhs_evaluations,
        "Ensemble solver statistics"
    );

    Ok(EnsembleResult {
        times: layout.times.to_vec(),
        seed: master_seed,
        ntraj: options.ntraj,
        planned,
        shards: options.shard.into_iter().collect(),
        stats: agg.stats,
        status,
        failures,
        jump_logs: options.keep_jump_logs.then_some(jump_logs),
        jump_counts: agg.jump_counts,
        invalid_jumps,
        diagnostics,
        solver_stats: agg.solver_stats,
    })
}

/// Run one trajectory, retrying with the same seed after a failure.
fn run_with_retries<F>(
    run: &F,
    index: u64,
    seed: u64,
    options: &EnsembleOptions,
) -> std::result::Result<TrajectoryResult, TrajectoryFailure>
where
    F: Fn(u64, u64, Option<Deadline>) -> Result<TrajectoryResult> + Sync,
{
    let attempts = options.retries.saturating_add(1);
    let mut last = (FailureKind::Integration, String::new());
    for attempt in 1..=attempts {
        let deadline = options.trajectory_timeout.map(Deadline::after);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(index, seed, deadline)));
        last = match outcome {
            Ok(Ok(traj)) => return Ok(traj),
            Ok(Err(e @ Error::TrajectoryTimeout { .. })) => (FailureKind::Timeout, e.to_string()),
            Ok(Err(e)) => (FailureKind::Integration, e.to_string()),
            Err(payload) => (FailureKind::Panicked, panic_message(payload.as_ref())),
        };
        debug!(trajectory = index, attempt, "Trajectory attempt failed: {}", last.1);
    }
    Err(TrajectoryFailure {
        index,
        seed,
        kind: last.0,
        message: last.1,
        attempts,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
