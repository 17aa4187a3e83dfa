// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Step-wise propagator for linear ODEs dx/dt = G·x.
//!
//! Two methods share one interface:
//!
//! - [`Method::Dopri5`]: Dormand–Prince 5(4) with FSAL, standard
//!   error-per-step control and Hairer's 5th-order continuous extension.
//! - [`Method::Expm`]: x(t+h) = exp(G·h)·x(t) with fixed steps. Dense output
//!   is exact: x(t₀+θ) = exp(G·θ)·x(t₀).
//!
//! The caller drives the loop one accepted step at a time and may query the
//! state anywhere inside the last step, which is what output sampling and
//! jump-time root finding need.
//!
//! Ref: Hairer, Nørsett & Wanner, "Solving Ordinary Differential Equations I"
//! (1993), §II.4–II.6.

use std::borrow::Cow;

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use super::options::{Method, SolverOptions, SolverStats};
use crate::error::{Error, Result};
use crate::linalg::{all_finite, matrix_exp, LinearOperator};

// Dormand–Prince tableau (autonomous, so the nodes c_i are not needed)
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// b − b̂
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// Continuous extension
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Step exponentials kept per propagator (short steps before output times
/// and after resets).
const EXPM_CACHE_SIZE: usize = 4;

/// Dense generator and its fixed-step exponential exp(G·h), built once and
/// shared by every [`Method::Expm`] propagator over the same generator.
#[derive(Debug, Clone)]
pub struct ExpmPlan {
    generator: Array2<Complex64>,
    step: Option<(f64, Array2<Complex64>)>,
}

impl ExpmPlan {
    /// Densify `generator` and, when `step` is given, precompute exp(G·step).
    pub fn new<G: LinearOperator>(generator: &G, step: Option<f64>) -> Result<Self> {
        let generator = generator.to_dense();
        let step = match step {
            Some(h) => Some((h, matrix_exp(&(&generator * Complex64::new(h, 0.0)))?)),
            None => None,
        };
        Ok(Self { generator, step })
    }

    /// Step length of the precomputed exponential.
    pub fn step(&self) -> Option<f64> {
        self.step.as_ref().map(|(h, _)| *h)
    }

    fn exponential(&self, dt: f64) -> Result<Array2<Complex64>> {
        matrix_exp(&(&self.generator * Complex64::new(dt, 0.0)))
    }
}

/// Interpolation data for the most recent accepted step.
#[derive(Debug, Clone)]
enum Segment {
    Dopri {
        t0: f64,
        h: f64,
        rcont: [Array1<Complex64>; 5],
    },
    Expm {
        t0: f64,
        x0: Array1<Complex64>,
    },
}

/// Single-trajectory integrator state. Owns its workspace; borrows the
/// generator read-only.
pub struct Propagator<'g, G: LinearOperator> {
    generator: &'g G,
    expm: Option<Cow<'g, ExpmPlan>>,
    method: Method,
    atol: f64,
    rtol: f64,
    max_step: f64,
    nsteps: usize,
    t: f64,
    x: Array1<Complex64>,
    /// G·x at `t` (FSAL)
    dx: Array1<Complex64>,
    h: f64,
    last_rejected: bool,
    segment: Option<Segment>,
    since_mark: usize,
    stats: SolverStats,
    expm_cache: Vec<(f64, Array2<Complex64>)>,
}

impl<'g, G: LinearOperator> Propagator<'g, G> {
    /// Start at `(t0, x0)`.
    pub fn new(generator: &'g G, x0: Array1<Complex64>, t0: f64, options: &SolverOptions) -> Result<Self> {
        Self::build(generator, x0, t0, options, None)
    }

    /// Start at `(t0, x0)`, borrowing a prepared plan for [`Method::Expm`].
    /// The plan is ignored by other methods.
    pub fn with_plan(
        generator: &'g G,
        x0: Array1<Complex64>,
        t0: f64,
        options: &SolverOptions,
        plan: &'g ExpmPlan,
    ) -> Result<Self> {
        Self::build(generator, x0, t0, options, Some(plan))
    }

    fn build(
        generator: &'g G,
        x0: Array1<Complex64>,
        t0: f64,
        options: &SolverOptions,
        plan: Option<&'g ExpmPlan>,
    ) -> Result<Self> {
        if generator.nrows() != generator.ncols() || x0.len() != generator.ncols() {
            return Err(Error::dims(
                "propagator state",
                (generator.nrows(), generator.ncols()),
                x0.len(),
            ));
        }
        if !all_finite(&x0) {
            return Err(Error::integration("non-finite initial state", t0, &x0.to_vec()));
        }

        let expm = match (options.method, plan) {
            (Method::Expm, Some(plan)) => Some(Cow::Borrowed(plan)),
            (Method::Expm, None) => Some(Cow::Owned(ExpmPlan::new(generator, None)?)),
            (Method::Dopri5, _) => None,
        };

        let mut prop = Self {
            generator,
            expm,
            method: options.method,
            atol: options.atol,
            rtol: options.rtol,
            max_step: options.max_step.unwrap_or(f64::INFINITY),
            nsteps: options.nsteps,
            t: t0,
            dx: Array1::zeros(x0.len()),
            x: x0,
            h: 0.0,
            last_rejected: false,
            segment: None,
            since_mark: 0,
            stats: SolverStats::default(),
            expm_cache: Vec::new(),
        };

        if prop.method == Method::Dopri5 {
            prop.refresh_derivative();
            prop.h = match options.first_step {
                Some(h) => h.min(prop.max_step),
                None => prop.initial_step(),
            };
        }
        Ok(prop)
    }

    /// Current time.
    pub fn time(&self) -> f64 {
        self.t
    }

    /// Current state.
    pub fn state(&self) -> &Array1<Complex64> {
        &self.x
    }

    /// Integration method in use.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Start of the last accepted step, if any.
    pub fn segment_start(&self) -> Option<f64> {
        match &self.segment {
            Some(Segment::Dopri { t0, .. }) | Some(Segment::Expm { t0, .. }) => Some(*t0),
            None => None,
        }
    }

    /// Work counters so far.
    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Reset the step budget; called after each output time.
    pub fn mark(&mut self) {
        self.since_mark = 0;
    }

    /// Replace the state (after a jump or a step hook). Interpolation data
    /// for the previous step is discarded.
    pub fn reset(&mut self, t: f64, x: Array1<Complex64>) -> Result<()> {
        if x.len() != self.x.len() {
            return Err(Error::dims("propagator reset", self.x.len(), x.len()));
        }
        self.t = t;
        self.x = x;
        self.segment = None;
        if self.method == Method::Dopri5 {
            self.refresh_derivative();
        }
        Ok(())
    }

    /// Take one accepted step toward `t_limit`, never past it.
    pub fn step(&mut self, t_limit: f64) -> Result<()> {
        let span = t_limit - self.t;
        if span <= 0.0 {
            return Ok(());
        }
        if self.since_mark >= self.nsteps {
            return Err(self.failure(format!(
                "step budget exhausted ({} steps without reaching an output time)",
                self.nsteps
            )));
        }
        match self.method {
            Method::Dopri5 => self.dopri_step(t_limit)?,
            Method::Expm => self.expm_step(t_limit)?,
        }
        self.since_mark += 1;
        self.stats.steps += 1;
        Ok(())
    }

    /// State at `t` inside the last accepted step.
    pub fn state_at(&mut self, t: f64) -> Result<Array1<Complex64>> {
        if t == self.t {
            return Ok(self.x.clone());
        }
        let slack = 1e-12 * self.t.abs().max(1.0);
        match self.segment.take() {
            Some(Segment::Dopri { t0, h, rcont }) => {
                if t < t0 - slack || t > t0 + h + slack {
                    self.segment = Some(Segment::Dopri { t0, h, rcont });
                    return Err(self.failure(format!("dense output requested at t={} outside last step", t)));
                }
                let theta = (t - t0) / h;
                let theta1 = 1.0 - theta;
                let th = Complex64::new(theta, 0.0);
                let th1 = Complex64::new(theta1, 0.0);
                let [r1, r2, r3, r4, r5] = &rcont;
                let inner = r4 + &(r5 * th1);
                let inner = r3 + &(inner * th);
                let inner = r2 + &(inner * th1);
                let y = r1 + &(inner * th);
                self.segment = Some(Segment::Dopri { t0, h, rcont });
                Ok(y)
            }
            Some(Segment::Expm { t0, x0 }) => {
                let result = if t < t0 - slack || t > self.t + slack {
                    Err(self.failure(format!("dense output requested at t={} outside last step", t)))
                } else if t == t0 {
                    Ok(x0.clone())
                } else {
                    self.plan().and_then(|plan| plan.exponential(t - t0)).map(|u| u.dot(&x0))
                };
                self.segment = Some(Segment::Expm { t0, x0 });
                result
            }
            None => Err(self.failure(format!("no step to interpolate at t={}", t))),
        }
    }

    fn rhs(&mut self, x: &Array1<Complex64>) -> Array1<Complex64> {
        self.stats.rhs_evaluations += 1;
        self.generator.apply(x)
    }

    fn refresh_derivative(&mut self) {
        self.stats.rhs_evaluations += 1;
        self.dx = self.generator.apply(&self.x);
    }

    fn failure(&self, reason: String) -> Error {
        Error::integration(reason, self.t, &self.x.to_vec())
    }

    fn min_step(&self) -> f64 {
        16.0 * f64::EPSILON * self.t.abs().max(1.0)
    }

    /// Weighted RMS norm with scale atol + rtol·max(|a|, |b|).
    fn error_norm(&self, err: &Array1<Complex64>, a: &Array1<Complex64>, b: &Array1<Complex64>) -> f64 {
        let n = err.len().max(1) as f64;
        let sum: f64 = err
            .iter()
            .zip(a.iter().zip(b.iter()))
            .map(|(e, (ya, yb))| {
                let sc = self.atol + self.rtol * ya.norm().max(yb.norm());
                (e.norm() / sc).powi(2)
            })
            .sum();
        (sum / n).sqrt()
    }

    /// Hairer's starting-step heuristic.
    fn initial_step(&mut self) -> f64 {
        let x0 = self.x.clone();
        let f0 = self.dx.clone();
        let d0 = self.error_norm(&x0, &x0, &x0);
        let d1 = self.error_norm(&f0, &x0, &x0);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
        let h0 = h0.min(self.max_step);

        let x1 = &x0 + &(&f0 * Complex64::new(h0, 0.0));
        let f1 = self.rhs(&x1);
        let d2 = self.error_norm(&(&f1 - &f0), &x0, &x0) / h0;

        let h1 = if d1.max(d2) <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / 5.0)
        };
        (100.0 * h0).min(h1).min(self.max_step)
    }

    fn dopri_step(&mut self, t_limit: f64) -> Result<()> {
        let span = t_limit - self.t;
        let mut nonfinite = false;
        loop {
            if self.h < self.min_step() {
                let reason = if nonfinite {
                    "non-finite state"
                } else {
                    "step size underflow"
                };
                return Err(self.failure(reason.to_string()));
            }
            let mut h = self.h.min(self.max_step);
            let clamped = h >= span;
            if clamped {
                h = span;
            }

            let hc = |a: f64| Complex64::new(h * a, 0.0);
            let generator = self.generator;
            let stats = &mut self.stats;
            let mut eval = |y: &Array1<Complex64>| {
                stats.rhs_evaluations += 1;
                generator.apply(y)
            };
            let x = &self.x;
            let k1 = &self.dx;

            let k2 = eval(&(x + &(k1 * hc(A21))));
            let k3 = eval(&(x + &(k1 * hc(A31)) + &(&k2 * hc(A32))));
            let k4 = eval(&(x + &(k1 * hc(A41)) + &(&k2 * hc(A42)) + &(&k3 * hc(A43))));
            let k5 = eval(
                &(x + &(k1 * hc(A51)) + &(&k2 * hc(A52)) + &(&k3 * hc(A53)) + &(&k4 * hc(A54))),
            );
            let k6 = eval(
                &(x + &(k1 * hc(A61))
                    + &(&k2 * hc(A62))
                    + &(&k3 * hc(A63))
                    + &(&k4 * hc(A64))
                    + &(&k5 * hc(A65))),
            );
            let y1 = x
                + &(k1 * hc(A71))
                + &(&k3 * hc(A73))
                + &(&k4 * hc(A74))
                + &(&k5 * hc(A75))
                + &(&k6 * hc(A76));
            let k7 = eval(&y1);

            let k1 = &self.dx;
            let err = k1 * hc(E1)
                + &(&k3 * hc(E3))
                + &(&k4 * hc(E4))
                + &(&k5 * hc(E5))
                + &(&k6 * hc(E6))
                + &(&k7 * hc(E7));
            let err_norm = self.error_norm(&err, &self.x, &y1);

            if !err_norm.is_finite() || !all_finite(&y1) {
                nonfinite = true;
                self.h = h * MIN_FACTOR;
                self.last_rejected = true;
                self.stats.rejected_steps += 1;
                continue;
            }

            if err_norm > 1.0 {
                let factor = (SAFETY * err_norm.powf(-0.2)).max(MIN_FACTOR);
                self.h = h * factor;
                self.last_rejected = true;
                self.stats.rejected_steps += 1;
                continue;
            }

            // accepted
            let mut factor = if err_norm == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            if self.last_rejected {
                factor = factor.min(1.0);
            }
            let next = h * factor;
            self.h = if clamped { next.max(self.h) } else { next };
            self.last_rejected = false;

            let k1 = &self.dx;
            let ydiff = &y1 - &self.x;
            let bspl = &(k1 * hc(1.0)) - &ydiff;
            let rcont4 = &ydiff - &(&k7 * hc(1.0)) - &bspl;
            let rcont5 = k1 * hc(D1)
                + &(&k3 * hc(D3))
                + &(&k4 * hc(D4))
                + &(&k5 * hc(D5))
                + &(&k6 * hc(D6))
                + &(&k7 * hc(D7));
            let t0 = self.t;
            let x0 = std::mem::replace(&mut self.x, y1);
            self.segment = Some(Segment::Dopri {
                t0,
                h,
                rcont: [x0, ydiff, bspl, rcont4, rcont5],
            });
            self.t = if clamped { t_limit } else { t0 + h };
            self.dx = k7;
            return Ok(());
        }
    }

    fn expm_step(&mut self, t_limit: f64) -> Result<()> {
        let span = t_limit - self.t;
        let h = if self.max_step < span { self.max_step } else { span };
        let x1 = self.step_exponential(h)?;
        if !all_finite(&x1) {
            return Err(self.failure("non-finite state".to_string()));
        }
        let t0 = self.t;
        let x0 = std::mem::replace(&mut self.x, x1);
        self.segment = Some(Segment::Expm { t0, x0 });
        self.t = if h == span { t_limit } else { t0 + h };
        Ok(())
    }

    /// exp(G·dt)·x for a regular step. Step exponentials are cached;
    /// dense-output ones are not.
    fn step_exponential(&mut self, dt: f64) -> Result<Array1<Complex64>> {
        let plan = self.plan()?;
        if let Some((h, u)) = &plan.step {
            if *h == dt {
                return Ok(u.dot(&self.x));
            }
        }
        if let Some((_, u)) = self.expm_cache.iter().find(|(h, _)| *h == dt) {
            return Ok(u.dot(&self.x));
        }
        let u = plan.exponential(dt)?;
        let x1 = u.dot(&self.x);
        if self.expm_cache.len() >= EXPM_CACHE_SIZE {
            self.expm_cache.remove(0);
        }
        self.expm_cache.push((dt, u));
        Ok(x1)
    }

    fn plan(&self) -> Result<&ExpmPlan> {
        match &self.expm {
            Some(plan) => Ok(&**plan),
            None => Err(self.failure("exponential step without a prepared generator".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::CsrMatrix;
    use approx::assert_relative_eq;

    /// Generator of a harmonic rotation: x'' = -ω² x written as a complex
    /// 2-vector with G = -iω σz.
    fn rotation(omega: f64) -> Array2<Complex64> {
        let mut g = Array2::zeros((2, 2));
        g[[0, 0]] = Complex64::new(0.0, -omega);
        g[[1, 1]] = Complex64::new(0.0, omega);
        g
    }

    fn decay(gamma: f64) -> Array2<Complex64> {
        Array2::from_diag_elem(1, Complex64::new(-gamma, 0.0))
    }

    fn run_to<G: LinearOperator>(p: &mut Propagator<'_, G>, t: f64) {
        while p.time() < t {
            p.step(t).unwrap();
        }
    }

    #[test]
    fn test_dopri_exponential_decay() {
        let g = decay(1.5);
        let opts = SolverOptions {
            atol: 1e-10,
            rtol: 1e-10,
            ..Default::default()
        };
        let x0 = Array1::from(vec![Complex64::new(1.0, 0.0)]);
        let mut p = Propagator::new(&g, x0, 0.0, &opts).unwrap();
        run_to(&mut p, 2.0);
        assert_relative_eq!(p.time(), 2.0);
        assert_relative_eq!(p.state()[0].re, (-3.0_f64).exp(), epsilon = 1e-8);
        let stats = p.stats();
        assert!(stats.steps > 0);
        // FSAL: six evaluations per attempted step plus the start-up ones
        assert!(stats.rhs_evaluations >= 6 * stats.steps);
    }

    #[test]
    fn test_dopri_dense_output_is_accurate() {
        let omega = 2.0;
        let g = rotation(omega);
        let opts = SolverOptions {
            atol: 1e-10,
            rtol: 1e-10,
            ..Default::default()
        };
        let x0 = Array1::from(vec![Complex64::new(1.0, 0.0), Complex64::new(1.0, 0.0)]);
        let mut p = Propagator::new(&g, x0, 0.0, &opts).unwrap();
        p.step(10.0).unwrap();
        p.step(10.0).unwrap();
        let t0 = p.segment_start().unwrap();
        let t1 = p.time();
        for frac in [0.1, 0.37, 0.5, 0.93] {
            let t = t0 + frac * (t1 - t0);
            let y = p.state_at(t).unwrap();
            let expected = Complex64::new(0.0, -omega * t).exp();
            assert_relative_eq!((y[0] - expected).norm(), 0.0, epsilon = 1e-7);
        }
        assert!(p.state_at(t1 + 1.0).is_err());
    }

    #[test]
    fn test_expm_matches_exact_and_dopri() {
        let g = rotation(1.0);
        let x0 = Array1::from(vec![Complex64::new(0.6, 0.0), Complex64::new(0.0, 0.8)]);
        let expm_opts = SolverOptions {
            method: Method::Expm,
            max_step: Some(0.25),
            ..Default::default()
        };
        let mut p = Propagator::new(&g, x0.clone(), 0.0, &expm_opts).unwrap();
        run_to(&mut p, 3.0);
        assert_eq!(p.stats().steps, 12);
        let exact = Complex64::new(0.0, -3.0).exp() * 0.6;
        assert_relative_eq!((p.state()[0] - exact).norm(), 0.0, epsilon = 1e-12);

        let mid = p.state_at(2.9).unwrap();
        let exact_mid = Complex64::new(0.0, -2.9).exp() * 0.6;
        assert_relative_eq!((mid[0] - exact_mid).norm(), 0.0, epsilon = 1e-12);

        let mut q = Propagator::new(&g, x0, 0.0, &SolverOptions::default()).unwrap();
        run_to(&mut q, 3.0);
        assert_relative_eq!((q.state()[0] - p.state()[0]).norm(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_expm_plan_shared_and_dense_output_uncached() {
        let g = rotation(1.0);
        let x0 = Array1::from(vec![Complex64::new(0.6, 0.0), Complex64::new(0.0, 0.8)]);
        let opts = SolverOptions {
            method: Method::Expm,
            max_step: Some(0.25),
            ..Default::default()
        };
        let plan = ExpmPlan::new(&g, Some(0.25)).unwrap();
        assert_eq!(plan.step(), Some(0.25));

        let mut p = Propagator::with_plan(&g, x0.clone(), 0.0, &opts, &plan).unwrap();
        let mut q = Propagator::new(&g, x0, 0.0, &opts).unwrap();
        run_to(&mut p, 1.0);
        run_to(&mut q, 1.0);
        assert_eq!(p.state(), q.state());
        // Every step used the shared exponential
        assert!(p.expm_cache.is_empty());

        for frac in [0.1, 0.2, 0.3, 0.4, 0.5, 0.6] {
            p.state_at(0.75 + 0.25 * frac).unwrap();
        }
        assert!(p.expm_cache.is_empty());
    }

    #[test]
    fn test_sparse_backend_matches_dense() {
        let dense = rotation(0.7);
        let sparse = CsrMatrix::from_dense(&dense);
        let x0 = Array1::from(vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0)]);
        let opts = SolverOptions::default();
        let mut a = Propagator::new(&dense, x0.clone(), 0.0, &opts).unwrap();
        let mut b = Propagator::new(&sparse, x0, 0.0, &opts).unwrap();
        run_to(&mut a, 1.0);
        run_to(&mut b, 1.0);
        for (u, v) in a.state().iter().zip(b.state().iter()) {
            assert_relative_eq!((u - v).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_step_never_passes_limit() {
        let g = decay(0.1);
        let x0 = Array1::from(vec![Complex64::new(1.0, 0.0)]);
        let mut p = Propagator::new(&g, x0, 0.0, &SolverOptions::default()).unwrap();
        p.step(1e-3).unwrap();
        assert_eq!(p.time(), 1e-3);
        // already there
        p.step(1e-3).unwrap();
        assert_eq!(p.stats().steps, 1);
    }

    #[test]
    fn test_step_budget_exhausted() {
        let g = rotation(1.0);
        let opts = SolverOptions {
            nsteps: 3,
            max_step: Some(0.01),
            ..Default::default()
        };
        let x0 = Array1::from(vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)]);
        let mut p = Propagator::new(&g, x0, 0.0, &opts).unwrap();
        let err = loop {
            if let Err(e) = p.step(1.0) {
                break e;
            }
        };
        match err {
            Error::IntegrationFailure(f) => {
                assert!(f.reason.contains("step budget"));
                assert_relative_eq!(f.last_time, 0.03, epsilon = 1e-12);
                assert_eq!(f.last_state.len(), 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        p.mark();
        assert!(p.step(1.0).is_ok());
    }

    #[test]
    fn test_non_finite_initial_state_rejected() {
        let g = decay(1.0);
        let x0 = Array1::from(vec![Complex64::new(f64::NAN, 0.0)]);
        assert!(matches!(
            Propagator::new(&g, x0, 0.0, &SolverOptions::default()),
            Err(Error::IntegrationFailure(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let g = decay(1.0);
        let x0 = Array1::zeros(3);
        assert!(matches!(
            Propagator::new(&g, x0, 0.0, &SolverOptions::default()),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_reset_discards_segment() {
        let g = decay(1.0);
        let x0 = Array1::from(vec![Complex64::new(1.0, 0.0)]);
        let mut p = Propagator::new(&g, x0, 0.0, &SolverOptions::default()).unwrap();
        p.step(0.5).unwrap();
        let t = p.time();
        p.reset(t, Array1::from(vec![Complex64::new(2.0, 0.0)])).unwrap();
        assert!(p.segment_start().is_none());
        assert!(p.state_at(t * 0.5).is_err());
        assert!(p.reset(t, Array1::zeros(2)).is_err());
    }
}
