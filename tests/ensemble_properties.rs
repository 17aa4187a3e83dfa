// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

use approx::assert_relative_eq;
use ndarray::Array2;
use qubit_os_dynamics::ensemble::{mcsolve, EnsembleOptions, EnsembleResult, EnsembleStatus, Shard};
use qubit_os_dynamics::error::ValidationError;
use qubit_os_dynamics::qobj::{basis, sigmaz};
use qubit_os_dynamics::{mesolve, CollapseOperator, Error, QObj, SolverOptions};

fn decay(ensemble: &EnsembleOptions, times: &[f64]) -> EnsembleResult {
    let h = QObj::from_matrix(Array2::zeros((2, 2))).unwrap();
    let c_ops = vec![CollapseOperator::amplitude_damping(1.0, "q0").unwrap()];
    mcsolve(
        &h,
        &basis(2, 1).unwrap(),
        &c_ops,
        times,
        &[sigmaz().unwrap()],
        &SolverOptions::default(),
        ensemble,
        None,
    )
    .unwrap()
}

fn times() -> Vec<f64> {
    (0..=8).map(|i| 0.25 * i as f64).collect()
}

#[test]
fn same_seed_reproduces_jump_logs_across_worker_counts() {
    let base = EnsembleOptions {
        ntraj: 200,
        seed: Some(17),
        keep_jump_logs: true,
        ..Default::default()
    };
    let serial = decay(
        &EnsembleOptions {
            workers: Some(1),
            ..base.clone()
        },
        &times(),
    );
    let parallel = decay(
        &EnsembleOptions {
            workers: Some(4),
            ..base
        },
        &times(),
    );

    assert_eq!(serial.jump_logs, parallel.jump_logs);
    assert_eq!(serial.jump_counts, parallel.jump_counts);
    for (a, b) in serial.expect().iter().zip(parallel.expect().iter()) {
        assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
    }
}

#[test]
fn standard_error_scales_as_inverse_sqrt_n() {
    // Cell at t = 1, where ⟨σz⟩ is far from ±1
    let cell = 4;
    let errors: Vec<f64> = [250usize, 1000, 4000]
        .iter()
        .map(|n| {
            let result = decay(
                &EnsembleOptions {
                    ntraj: *n,
                    seed: Some(*n as u64),
                    ..Default::default()
                },
                &times(),
            );
            result.std_error()[[0, cell]]
        })
        .collect();

    let r1 = errors[1] / errors[0];
    let r2 = errors[2] / errors[0];
    assert!((r1 - 0.5).abs() < 0.1, "ratio N→4N = {}", r1);
    assert!((r2 - 0.25).abs() < 0.05, "ratio N→16N = {}", r2);
}

#[test]
fn merged_shards_equal_single_run() {
    let whole = decay(
        &EnsembleOptions {
            ntraj: 90,
            seed: Some(5),
            keep_jump_logs: true,
            ..Default::default()
        },
        &times(),
    );

    let shards: Vec<EnsembleResult> = (0..3)
        .map(|index| {
            decay(
                &EnsembleOptions {
                    ntraj: 90,
                    seed: Some(5),
                    shard: Some(Shard { index, count: 3 }),
                    keep_jump_logs: true,
                    ..Default::default()
                },
                &times(),
            )
        })
        .collect();

    // Shards travel between processes as JSON
    let mut merged: Option<EnsembleResult> = None;
    for shard in shards.into_iter().rev() {
        let json = serde_json::to_string(&shard).unwrap();
        let shard: EnsembleResult = serde_json::from_str(&json).unwrap();
        merged = Some(match merged {
            None => shard,
            Some(acc) => acc.merge(shard).unwrap(),
        });
    }
    let merged = merged.unwrap();

    assert_eq!(merged.completed(), 90);
    assert_eq!(merged.status, EnsembleStatus::Complete);
    assert_eq!(merged.jump_logs, whole.jump_logs);
    assert_eq!(merged.jump_counts, whole.jump_counts);
    for (a, b) in merged.expect().iter().zip(whole.expect().iter()) {
        assert_relative_eq!(a.re, b.re, epsilon = 1e-9);
    }
    for (a, b) in merged.std_error().iter().zip(whole.std_error().iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-9);
    }
}

#[test]
fn convergence_target_stops_early() {
    let result = decay(
        &EnsembleOptions {
            ntraj: 100_000,
            seed: Some(3),
            target_std_error: Some(0.03),
            min_trajectories: 200,
            ..Default::default()
        },
        &times(),
    );
    assert!(matches!(result.status, EnsembleStatus::ConvergedEarly { .. }));
    assert!(result.completed() >= 200);
    assert!(result.completed() < 100_000);
}

#[test]
fn non_increasing_time_grid_fails_fast() {
    let h = QObj::from_matrix(Array2::zeros((2, 2))).unwrap();
    let c_ops = vec![CollapseOperator::amplitude_damping(1.0, "q0").unwrap()];
    let bad = [0.0, 0.5, 0.5, 1.0];

    let err = mcsolve(
        &h,
        &basis(2, 1).unwrap(),
        &c_ops,
        &bad,
        &[sigmaz().unwrap()],
        &SolverOptions::default(),
        &EnsembleOptions::default(),
        None,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::TimeGrid { index: 2, .. })
    ));

    let err = mesolve(
        &h,
        &basis(2, 1).unwrap(),
        &c_ops,
        &bad,
        &[sigmaz().unwrap()],
        &SolverOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::TimeGrid { .. })));
}

#[test]
fn silent_channel_is_reported() {
    // A zero-rate channel has no weight in any state
    let h = QObj::from_matrix(Array2::zeros((2, 2))).unwrap();
    let c_ops = vec![
        CollapseOperator::amplitude_damping(1.0, "q0").unwrap(),
        CollapseOperator::new(qubit_os_dynamics::qobj::sigmap().unwrap(), 0.0, "pump").unwrap(),
    ];
    let result = mcsolve(
        &h,
        &basis(2, 1).unwrap(),
        &c_ops,
        &times(),
        &[sigmaz().unwrap()],
        &SolverOptions::default(),
        &EnsembleOptions {
            ntraj: 50,
            seed: Some(8),
            ..Default::default()
        },
        None,
    )
    .unwrap();

    assert!(result.jump_counts[0] > 0);
    assert!(result
        .diagnostics
        .contains(&qubit_os_dynamics::Diagnostic::SilentChannel { channel: 1 }));
}

#[test]
fn re_merging_a_shard_is_rejected() {
    let shard = |index| {
        decay(
            &EnsembleOptions {
                ntraj: 30,
                seed: Some(5),
                shard: Some(Shard { index, count: 3 }),
                ..Default::default()
            },
            &times(),
        )
    };

    let partial = shard(0).merge(shard(1)).unwrap();
    assert_eq!(partial.missing(), 10);
    assert!(matches!(partial.status, EnsembleStatus::Partial { completed: 20, failed: 10 }));

    let err = partial.clone().merge(shard(0)).unwrap_err();
    assert!(err.to_string().contains("merged twice"));

    let whole = partial.merge(shard(2)).unwrap();
    assert_eq!(whole.completed(), 30);
    assert_eq!(whole.status, EnsembleStatus::Complete);
}
