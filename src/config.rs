// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the dynamics engine.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. dynamics.yaml file
//! 3. Environment variables (QUBITOS_DYN_*)
//! 4. CLI arguments

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::ensemble::{EnsembleOptions, Shard};
use crate::error::{Error, Result};
use crate::solver::SolverOptions;
use crate::validation::{validate_ensemble_options, validate_solver_options};

/// Files searched, in order, when no explicit path is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "dynamics.yaml",
    "dynamics.yml",
    "/etc/qubitos/dynamics.yaml",
];

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Integrator settings
    #[serde(default)]
    pub solver: SolverOptions,

    /// Trajectory ensemble settings
    #[serde(default)]
    pub ensemble: EnsembleConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                config = serde_yaml::from_str(&content)?;
            } else {
                warn!(path = %path.display(), "Config file not found, using defaults");
            }
        } else {
            for path in DEFAULT_CONFIG_PATHS {
                let path = Path::new(path);
                if path.exists() {
                    let content = std::fs::read_to_string(path)?;
                    config = serde_yaml::from_str(&content)?;
                    break;
                }
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("QUBITOS_DYN_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(ntraj) = env_parse("QUBITOS_DYN_NTRAJ")? {
            self.ensemble.ntraj = ntraj;
        }
        if let Some(workers) = env_parse("QUBITOS_DYN_WORKERS")? {
            self.ensemble.workers = Some(workers);
        }
        if let Some(seed) = env_parse("QUBITOS_DYN_SEED")? {
            self.ensemble.seed = Some(seed);
        }
        if let Some(shard) = env_parse::<Shard>("QUBITOS_DYN_SHARD")? {
            self.ensemble.shard = Some(shard);
        }
        if let Some(timeout) = env_parse("QUBITOS_DYN_TRAJECTORY_TIMEOUT_SEC")? {
            self.ensemble.trajectory_timeout_sec = Some(timeout);
        }
        if let Some(method) = env_parse("QUBITOS_DYN_METHOD")? {
            self.solver.method = method;
        }
        if let Some(atol) = env_parse("QUBITOS_DYN_ATOL")? {
            self.solver.atol = atol;
        }
        if let Some(rtol) = env_parse("QUBITOS_DYN_RTOL")? {
            self.solver.rtol = rtol;
        }
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        validate_solver_options(&self.solver)?;
        validate_ensemble_options(&self.to_ensemble_options()?)?;

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(Error::Config(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }
        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(Error::Config(format!(
                "unknown log format '{}' (expected json or pretty)",
                self.logging.format
            )));
        }
        if self.ensemble.target_std_error.is_some() && self.ensemble.min_trajectories < 2 {
            return Err(Error::Config(
                "min_trajectories must be at least 2 when target_std_error is set".into(),
            ));
        }
        Ok(())
    }

    /// Integrator options.
    pub fn to_solver_options(&self) -> SolverOptions {
        self.solver.clone()
    }

    /// Ensemble options.
    pub fn to_ensemble_options(&self) -> Result<EnsembleOptions> {
        let e = &self.ensemble;
        let trajectory_timeout = match e.trajectory_timeout_sec {
            Some(secs) => Some(
                Duration::try_from_secs_f64(secs)
                    .map_err(|err| Error::Config(format!("trajectory_timeout_sec {}: {}", secs, err)))?,
            ),
            None => None,
        };
        Ok(EnsembleOptions {
            ntraj: e.ntraj,
            workers: e.workers,
            seed: e.seed,
            shard: e.shard,
            target_std_error: e.target_std_error,
            min_trajectories: e.min_trajectories,
            trajectory_timeout,
            retries: e.retries,
            keep_jump_logs: e.keep_jump_logs,
            report_every: e.report_every,
        })
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}='{}': {}", name, val, e))),
        Err(_) => Ok(None),
    }
}

/// Trajectory ensemble configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Trajectories in the full ensemble
    #[serde(default = "default_ntraj")]
    pub ntraj: usize,

    /// Worker threads (all cores when unset)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Master seed (random when unset)
    #[serde(default)]
    pub seed: Option<u64>,

    /// Shard of a distributed run
    #[serde(default)]
    pub shard: Option<Shard>,

    /// Stop when every standard error is at or below this
    #[serde(default)]
    pub target_std_error: Option<f64>,

    /// Completions before the convergence test applies
    #[serde(default = "default_min_trajectories")]
    pub min_trajectories: usize,

    /// Wall-clock budget per trajectory in seconds
    #[serde(default)]
    pub trajectory_timeout_sec: Option<f64>,

    /// Retries per failed trajectory
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Keep per-trajectory jump logs
    #[serde(default)]
    pub keep_jump_logs: bool,

    /// Progress report cadence in trajectories
    #[serde(default)]
    pub report_every: Option<usize>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            ntraj: default_ntraj(),
            workers: None,
            seed: None,
            shard: None,
            target_std_error: None,
            min_trajectories: default_min_trajectories(),
            trajectory_timeout_sec: None,
            retries: default_retries(),
            keep_jump_logs: false,
            report_every: None,
        }
    }
}

fn default_ntraj() -> usize {
    500
}

fn default_min_trajectories() -> usize {
    100
}

fn default_retries() -> u32 {
    1
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}
