// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Quantum-trajectory (Monte-Carlo wavefunction) engine.
//!
//! A trajectory evolves an unnormalized ket under the effective Hamiltonian
//! H_eff = H − (i/2)·Σ_k L_k†L_k. The squared norm decays monotonically; when
//! it falls to a uniformly drawn threshold r a quantum jump occurs:
//!
//! 1. the crossing time is located on the dense output,
//! 2. channel k is chosen with probability ‖L_kψ‖² / Σ_m ‖L_mψ‖²,
//! 3. ψ ← L_kψ / ‖L_kψ‖ and a fresh threshold is drawn.
//!
//! Every random draw comes from an RNG seeded only by the trajectory seed,
//! so a seed reproduces its jump log and samples bit for bit.
//!
//! Ref: Dalibard, Castin & Mølmer (1992), Phys. Rev. Lett. 68, 580.

pub mod engine;

pub use engine::{jump_probabilities, Deadline, JumpRecord, TrajectoryProblem, TrajectoryResult};
