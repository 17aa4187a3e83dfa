// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS Dynamics CLI
//!
//! Runs the reference scenarios and manages sharded ensemble results.
//!
//! # Usage
//!
//! ```bash
//! # Qubit decay: trajectories vs master equation vs exact
//! qubit-os-dyn decay --gamma 0.5 --ntraj 10000 --seed 7
//!
//! # One shard of a distributed run, written to JSON
//! qubit-os-dyn decay --ntraj 10000 --seed 7 --shard 0/4 --output shard0.json
//!
//! # Merge shard results
//! qubit-os-dyn merge shard*.json --output merged.json
//!
//! # Harmonic oscillator, unitary solver vs trajectory engine
//! qubit-os-dyn oscillator --levels 8 --omega 1.0
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ndarray::Array2;
use num_complex::Complex64;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qubit_os_dynamics::ensemble::{mcsolve, EnsembleResult, Progress, Shard};
use qubit_os_dynamics::qobj::{basis, destroy, num, sigmaz};
use qubit_os_dynamics::{config::Config, CollapseOperator, Error, Method, QObj, Result, VERSION};
use qubit_os_dynamics::{mesolve, sesolve};

/// QubitOS open quantum system dynamics
#[derive(Parser)]
#[command(name = "qubit-os-dyn")]
#[command(author = "QubitOS Contributors")]
#[command(version = VERSION)]
#[command(about = "Lindblad master equation and Monte-Carlo trajectory solver")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Ensemble flags shared by the scenario commands.
#[derive(clap::Args)]
struct EnsembleArgs {
    /// Number of trajectories
    #[arg(long)]
    ntraj: Option<usize>,

    /// Master seed
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Run one shard, as index/count
    #[arg(long)]
    shard: Option<Shard>,

    /// Integration method (dopri5, expm)
    #[arg(long)]
    method: Option<Method>,

    /// Log progress every N trajectories
    #[arg(long)]
    progress: Option<usize>,

    /// Write the full result as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Spontaneous emission of an excited qubit
    Decay {
        /// Decay rate γ
        #[arg(long, default_value_t = 1.0)]
        gamma: f64,

        /// Final time
        #[arg(long, default_value_t = 5.0)]
        t_final: f64,

        /// Number of output intervals
        #[arg(long, default_value_t = 20)]
        steps: usize,

        #[command(flatten)]
        ensemble: EnsembleArgs,
    },

    /// Closed harmonic oscillator in a superposition of Fock states
    Oscillator {
        /// Fock-space truncation
        #[arg(long, default_value_t = 8)]
        levels: usize,

        /// Oscillator frequency ω₀
        #[arg(long, default_value_t = 1.0)]
        omega: f64,

        /// Final time
        #[arg(long, default_value_t = 10.0)]
        t_final: f64,

        /// Number of output intervals
        #[arg(long, default_value_t = 40)]
        steps: usize,

        #[command(flatten)]
        ensemble: EnsembleArgs,
    },

    /// Merge shard results written with --output
    Merge {
        /// Shard result files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Where to write the merged result
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show effective configuration
    Config,

    /// Validate configuration file
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging.level, &config.logging.format);
    // Config::load ran before a subscriber existed
    if let Some(path) = cli.config.as_deref().filter(|p| !p.exists()) {
        warn!(path = %path.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Decay {
            gamma,
            t_final,
            steps,
            ensemble,
        } => {
            apply_ensemble_args(&mut config, &ensemble);
            config.validate()?;
            run_decay(&config, gamma, t_final, steps, &ensemble)?;
        }

        Commands::Oscillator {
            levels,
            omega,
            t_final,
            steps,
            ensemble,
        } => {
            apply_ensemble_args(&mut config, &ensemble);
            config.validate()?;
            run_oscillator(&config, levels, omega, t_final, steps, &ensemble)?;
        }

        Commands::Merge { files, output } => {
            let mut merged: Option<EnsembleResult> = None;
            for path in &files {
                let part: EnsembleResult = serde_json::from_reader(File::open(path)?)?;
                info!(file = %path.display(), shards = ?part.shards, completed = part.completed(), "Read shard");
                merged = Some(match merged {
                    None => part,
                    Some(acc) => acc.merge(part)?,
                });
            }
            let merged = merged.ok_or_else(|| Error::Config("no shard files given".into()))?;

            println!(
                "Merged {} files: {} of {} trajectories, {}",
                files.len(),
                merged.completed(),
                merged.ntraj,
                merged.status
            );
            for d in &merged.diagnostics {
                println!("  diagnostic: {}", d);
            }
            if let Some(path) = output {
                write_json(&path, &merged)?;
            }
        }

        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
        }

        Commands::Validate => match config.validate() {
            Ok(()) => {
                println!("Configuration is valid");
            }
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

/// Initialize logging with tracing.
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Override config with CLI args.
fn apply_ensemble_args(config: &mut Config, args: &EnsembleArgs) {
    if let Some(ntraj) = args.ntraj {
        config.ensemble.ntraj = ntraj;
    }
    if let Some(seed) = args.seed {
        config.ensemble.seed = Some(seed);
    }
    if let Some(workers) = args.workers {
        config.ensemble.workers = Some(workers);
    }
    if let Some(shard) = args.shard {
        config.ensemble.shard = Some(shard);
    }
    if let Some(method) = args.method {
        config.solver.method = method;
    }
    if let Some(every) = args.progress {
        config.ensemble.report_every = Some(every);
    }
}

fn run_decay(config: &Config, gamma: f64, t_final: f64, steps: usize, args: &EnsembleArgs) -> Result<()> {
    let times = time_grid(t_final, steps);
    let h = QObj::from_matrix(Array2::zeros((2, 2)))?;
    let psi0 = basis(2, 1)?;
    let c_ops = vec![CollapseOperator::amplitude_damping(gamma, "q0")?];
    let e_ops = vec![sigmaz()?];
    let solver = config.to_solver_options();
    let ensemble = config.to_ensemble_options()?;

    let report = |p: &Progress| {
        info!(
            completed = p.completed,
            failed = p.failed,
            planned = p.planned,
            max_std_error = p.stats.max_std_error(),
            "Ensemble progress"
        );
    };
    let trajectories = mcsolve(&h, &psi0, &c_ops, &times, &e_ops, &solver, &ensemble, Some(&report))?;
    let master = mesolve(&h, &psi0, &c_ops, &times, &e_ops, &solver)?;

    println!(
        "Decay γ={}: {} trajectories (seed {}), {}",
        gamma,
        trajectories.completed(),
        trajectories.seed,
        trajectories.status
    );
    println!(
        "{:>8} {:>12} {:>10} {:>12} {:>12}",
        "t", "<sz> mcwf", "stderr", "<sz> me", "exact"
    );
    let mcwf = trajectories.expect_real(0);
    let stderr = trajectories.std_error();
    let me = master.expect_real(0);
    for (i, t) in times.iter().enumerate() {
        println!(
            "{:>8.3} {:>12.6} {:>10.2e} {:>12.6} {:>12.6}",
            t,
            mcwf[i],
            stderr[[0, i]],
            me[i],
            2.0 * (-gamma * t).exp() - 1.0
        );
    }

    if let Some(path) = &args.output {
        write_json(path, &trajectories)?;
    }
    Ok(())
}

fn run_oscillator(
    config: &Config,
    levels: usize,
    omega: f64,
    t_final: f64,
    steps: usize,
    args: &EnsembleArgs,
) -> Result<()> {
    if levels < 4 {
        return Err(Error::Config(format!(
            "levels must be at least 4 to hold |3⟩, got {}",
            levels
        )));
    }
    let times = time_grid(t_final, steps);
    let h = num(levels)?.scale(Complex64::new(omega, 0.0));
    let psi0 = basis(levels, 2)?.add(&basis(levels, 3)?)?.unit();
    let a = destroy(levels)?;
    let x = a.add(&a.dag())?;
    let solver = config.to_solver_options();
    let mut ensemble = config.to_ensemble_options()?;
    // Without collapse operators every trajectory is identical
    ensemble.ntraj = 1;
    ensemble.shard = None;

    let unitary = sesolve(&h, &psi0, &times, &[x.clone()], &solver)?;
    let trajectories = mcsolve(&h, &psi0, &[], &times, &[x], &solver, &ensemble, None)?;

    println!("Oscillator ω₀={}, {} levels", omega, levels);
    println!("{:>8} {:>12} {:>12} {:>12}", "t", "<x> se", "<x> mcwf", "exact");
    let se = unitary.expect_real(0);
    let mcwf = trajectories.expect_real(0);
    for (i, t) in times.iter().enumerate() {
        println!(
            "{:>8.3} {:>12.6} {:>12.6} {:>12.6}",
            t,
            se[i],
            mcwf[i],
            3f64.sqrt() * (omega * t).cos()
        );
    }

    if let Some(path) = &args.output {
        write_json(path, &unitary)?;
    }
    Ok(())
}

fn time_grid(t_final: f64, steps: usize) -> Vec<f64> {
    let steps = steps.max(1);
    (0..=steps).map(|i| t_final * i as f64 / steps as f64).collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    info!(file = %path.display(), "Wrote result");
    Ok(())
}
