// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ensemble results and shard merging.

use std::fmt;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::options::Shard;
use super::seed::shard_range;
use super::stats::RunningStats;
use crate::error::{Diagnostic, Error, Result, ValidationError};
use crate::solver::SolverStats;
use crate::trajectory::JumpRecord;

/// Whether an ensemble delivered everything it was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnsembleStatus {
    /// Every planned trajectory completed
    Complete,
    /// The convergence target was met before all trajectories ran
    ConvergedEarly { completed: usize },
    /// Some trajectories failed, or belong to shards not merged in
    Partial { completed: usize, failed: usize },
}

impl EnsembleStatus {
    /// Classify a run from its counts.
    pub fn from_counts(completed: usize, failed: usize, planned: usize) -> Self {
        if failed > 0 {
            EnsembleStatus::Partial { completed, failed }
        } else if completed < planned {
            EnsembleStatus::ConvergedEarly { completed }
        } else {
            EnsembleStatus::Complete
        }
    }
}

impl fmt::Display for EnsembleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsembleStatus::Complete => write!(f, "complete"),
            EnsembleStatus::ConvergedEarly { completed } => {
                write!(f, "converged early after {} trajectories", completed)
            }
            EnsembleStatus::Partial { completed, failed } => {
                write!(f, "partial ({} completed, {} failed)", completed, failed)
            }
        }
    }
}

/// Why a trajectory was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Exceeded its wall-clock budget
    Timeout,
    /// Integrator error
    Integration,
    /// Worker panicked
    Panicked,
}

/// A trajectory that failed on every attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryFailure {
    pub index: u64,
    pub seed: u64,
    pub kind: FailureKind,
    /// Message from the last attempt
    pub message: String,
    pub attempts: u32,
}

/// Jump log of one completed trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JumpLog {
    pub index: u64,
    pub seed: u64,
    pub jumps: Vec<JumpRecord>,
}

/// Aggregated output of a trajectory ensemble (or one shard of it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleResult {
    /// Output times
    pub times: Vec<f64>,
    /// Master seed every trajectory seed was derived from
    pub seed: u64,
    /// Size of the full ensemble across all shards
    pub ntraj: usize,
    /// Trajectories this result was responsible for
    pub planned: usize,
    /// Shards this result covers, ordered by index; empty for an unsharded run
    pub shards: Vec<Shard>,
    /// Per-cell mean and variance
    pub stats: RunningStats,
    pub status: EnsembleStatus,
    pub failures: Vec<TrajectoryFailure>,
    /// Per-trajectory jump logs, ordered by index, when requested
    pub jump_logs: Option<Vec<JumpLog>>,
    /// Jumps per collapse channel
    pub jump_counts: Vec<u64>,
    /// Threshold crossings with no viable channel
    pub invalid_jumps: u64,
    pub diagnostics: Vec<Diagnostic>,
    /// Integrator work summed over completed trajectories
    pub solver_stats: SolverStats,
}

impl EnsembleResult {
    /// Completed trajectories.
    pub fn completed(&self) -> usize {
        self.stats.count() as usize
    }

    /// Ensemble-mean expectation values, shape (observables, times).
    pub fn expect(&self) -> &Array2<Complex64> {
        self.stats.mean()
    }

    /// Real part of one observable's mean.
    pub fn expect_real(&self, observable: usize) -> Vec<f64> {
        self.stats.mean().row(observable).iter().map(|z| z.re).collect()
    }

    /// Per-cell standard error of the mean.
    pub fn std_error(&self) -> Array2<f64> {
        self.stats.std_error()
    }

    /// True unless trajectories failed.
    pub fn is_complete(&self) -> bool {
        !matches!(self.status, EnsembleStatus::Partial { .. })
    }

    /// Combine two results of the same ensemble (e.g. two shards).
    pub fn merge(mut self, other: EnsembleResult) -> Result<EnsembleResult> {
        if self.seed != other.seed {
            return Err(mismatch(format!(
                "master seeds differ ({} vs {})",
                self.seed, other.seed
            )));
        }
        if self.ntraj != other.ntraj {
            return Err(mismatch(format!(
                "ensemble sizes differ ({} vs {})",
                self.ntraj, other.ntraj
            )));
        }
        if self.times != other.times {
            return Err(mismatch("output times differ".into()));
        }
        if self.jump_counts.len() != other.jump_counts.len() {
            return Err(Error::dims(
                "merged collapse channels",
                self.jump_counts.len(),
                other.jump_counts.len(),
            ));
        }
        if self.shards.is_empty() || other.shards.is_empty() {
            return Err(mismatch(
                "an unsharded result already covers the whole ensemble".into(),
            ));
        }
        let (count, other_count) = (self.shards[0].count, other.shards[0].count);
        if count != other_count {
            return Err(mismatch(format!(
                "shard counts differ ({} vs {})",
                count, other_count
            )));
        }
        if let Some(shard) = other.shards.iter().find(|s| self.shards.contains(s)) {
            return Err(mismatch(format!("shard {} merged twice", shard)));
        }

        self.stats.merge(&other.stats)?;
        self.planned += other.planned;
        self.shards.extend(other.shards);
        self.shards.sort_by_key(|s| s.index);
        self.failures.extend(other.failures);
        self.failures.sort_by_key(|f| f.index);
        self.jump_logs = match (self.jump_logs.take(), other.jump_logs) {
            (Some(mut a), Some(b)) => {
                a.extend(b);
                a.sort_by_key(|log| log.index);
                Some(a)
            }
            _ => None,
        };
        for (a, b) in self.jump_counts.iter_mut().zip(&other.jump_counts) {
            *a += b;
        }
        self.invalid_jumps += other.invalid_jumps;
        self.solver_stats += other.solver_stats;

        let mut diagnostics: Vec<Diagnostic> = self
            .diagnostics
            .into_iter()
            .chain(other.diagnostics)
            .filter(|d| !matches!(d, Diagnostic::SilentChannel { .. }))
            .collect();
        dedup_non_hermitian(&mut diagnostics);
        diagnostics.extend(silent_channels(&self.jump_counts));
        self.diagnostics = diagnostics;

        let missing = self.missing();
        self.status = if missing > 0 {
            EnsembleStatus::Partial {
                completed: self.completed(),
                failed: self.failures.len() + missing,
            }
        } else {
            EnsembleStatus::from_counts(self.completed(), self.failures.len(), self.planned)
        };
        Ok(self)
    }

    /// Trajectories of the ensemble that no covered shard is responsible for.
    ///
    /// Zero for an unsharded run and for a single shard, which only answers
    /// for its own slice; nonzero once merged shards leave gaps.
    pub fn missing(&self) -> usize {
        if self.shards.len() < 2 {
            return 0;
        }
        let covered: usize = self
            .shards
            .iter()
            .map(|s| shard_range(self.ntraj, Some(*s)).len())
            .sum();
        self.ntraj.saturating_sub(covered)
    }
}

/// Channels that never fired while at least one other channel did.
pub(crate) fn silent_channels(jump_counts: &[u64]) -> Vec<Diagnostic> {
    if jump_counts.iter().all(|c| *c == 0) {
        return Vec::new();
    }
    jump_counts
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == 0)
        .map(|(channel, _)| Diagnostic::SilentChannel { channel })
        .collect()
}

fn dedup_non_hermitian(diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = false;
    diagnostics.retain(|d| match d {
        Diagnostic::NonHermitian { .. } if seen => false,
        Diagnostic::NonHermitian { .. } => {
            seen = true;
            true
        }
        _ => true,
    });
}

fn mismatch(message: String) -> Error {
    ValidationError::Field {
        field: "merge".into(),
        message,
    }
    .into()
}
