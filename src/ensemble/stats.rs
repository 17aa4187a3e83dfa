// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Online mean and variance over (observable, time) cells.
//!
//! `push` is Welford's update; `merge` is Chan's pairwise combination, so
//! partial aggregates from any number of workers or shards can be folded in
//! any order.

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Running statistics of complex samples.
///
/// Variance is E|x − μ|², which for Hermitian observables is the variance
/// of the real expectation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    count: u64,
    mean: Array2<Complex64>,
    m2: Array2<f64>,
}

impl RunningStats {
    /// Empty aggregate for `observables × times` cells.
    pub fn new(observables: usize, times: usize) -> Self {
        Self {
            count: 0,
            mean: Array2::zeros((observables, times)),
            m2: Array2::zeros((observables, times)),
        }
    }

    /// Samples absorbed so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// (observables, times).
    pub fn shape(&self) -> (usize, usize) {
        self.mean.dim()
    }

    /// Per-cell mean.
    pub fn mean(&self) -> &Array2<Complex64> {
        &self.mean
    }

    /// Add one sample.
    pub fn push(&mut self, sample: &Array2<Complex64>) -> Result<()> {
        self.check_shape(sample.dim())?;
        self.count += 1;
        let n = self.count as f64;
        for ((mean, m2), x) in self.mean.iter_mut().zip(self.m2.iter_mut()).zip(sample.iter()) {
            let delta = x - *mean;
            *mean += delta / n;
            *m2 += (delta.conj() * (x - *mean)).re;
        }
        Ok(())
    }

    /// Fold another aggregate into this one.
    pub fn merge(&mut self, other: &RunningStats) -> Result<()> {
        self.check_shape(other.shape())?;
        if other.count == 0 {
            return Ok(());
        }
        if self.count == 0 {
            *self = other.clone();
            return Ok(());
        }
        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        for (((mean, m2), mean_b), m2_b) in self
            .mean
            .iter_mut()
            .zip(self.m2.iter_mut())
            .zip(other.mean.iter())
            .zip(other.m2.iter())
        {
            let delta = mean_b - *mean;
            *mean += delta * (nb / n);
            *m2 += m2_b + delta.norm_sqr() * na * nb / n;
        }
        self.count += other.count;
        Ok(())
    }

    /// Sample variance m2/(n−1); zero with fewer than two samples.
    pub fn variance(&self) -> Array2<f64> {
        if self.count < 2 {
            return Array2::zeros(self.mean.dim());
        }
        let denom = (self.count - 1) as f64;
        self.m2.mapv(|m| m / denom)
    }

    /// Standard error of the mean, √(var/n).
    pub fn std_error(&self) -> Array2<f64> {
        let n = self.count.max(1) as f64;
        self.variance().mapv(|v| (v / n).sqrt())
    }

    /// Largest standard error over all cells; infinite with fewer than two
    /// samples.
    pub fn max_std_error(&self) -> f64 {
        if self.count < 2 {
            return f64::INFINITY;
        }
        self.std_error().iter().copied().fold(0.0, f64::max)
    }

    fn check_shape(&self, shape: (usize, usize)) -> Result<()> {
        if shape != self.mean.dim() {
            return Err(Error::dims("ensemble statistics", self.mean.dim(), shape));
        }
        Ok(())
    }
}
