// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ensemble execution options.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One slice of a distributed ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    /// Zero-based shard index
    pub index: usize,
    /// Total number of shards
    pub count: usize,
}

impl FromStr for Shard {
    type Err = String;

    /// Parse `index/count`, e.g. `2/8`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index, count) = s
            .split_once('/')
            .ok_or_else(|| format!("shard '{}' is not of the form index/count", s))?;
        let index = index
            .trim()
            .parse()
            .map_err(|e| format!("shard index '{}': {}", index, e))?;
        let count = count
            .trim()
            .parse()
            .map_err(|e| format!("shard count '{}': {}", count, e))?;
        Ok(Shard { index, count })
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}

/// How many trajectories to run, where, and when to stop.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleOptions {
    /// Trajectories in the full ensemble (across all shards)
    pub ntraj: usize,
    /// Worker threads; rayon's default when `None`
    pub workers: Option<usize>,
    /// Master seed; drawn from entropy and recorded when `None`
    pub seed: Option<u64>,
    /// Run only this slice of the index range
    pub shard: Option<Shard>,
    /// Stop once every cell's standard error is at or below this
    pub target_std_error: Option<f64>,
    /// Completions required before the convergence test applies
    pub min_trajectories: usize,
    /// Wall-clock budget per trajectory attempt
    pub trajectory_timeout: Option<Duration>,
    /// Extra attempts, with the same seed, after a failure
    pub retries: u32,
    /// Keep every trajectory's jump log in the result
    pub keep_jump_logs: bool,
    /// Invoke the progress callback every this many finished trajectories
    pub report_every: Option<usize>,
}

impl Default for EnsembleOptions {
    fn default() -> Self {
        Self {
            ntraj: 500,
            workers: None,
            seed: None,
            shard: None,
            target_std_error: None,
            min_trajectories: 100,
            trajectory_timeout: None,
            retries: 1,
            keep_jump_logs: false,
            report_every: None,
        }
    }
}
