// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic per-trajectory seeds and shard partitioning.

use std::hash::Hasher;
use std::ops::Range;

use siphasher::sip::SipHasher13;

use super::options::Shard;

/// Seed of trajectory `index` under `master_seed`.
///
/// Depends only on the pair, so any worker or shard computing the same
/// index runs the same trajectory.
pub fn trajectory_seed(master_seed: u64, index: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(index);
    hasher.finish()
}

/// Contiguous index block `[s·N/S, (s+1)·N/S)` owned by a shard.
pub fn shard_range(ntraj: usize, shard: Option<Shard>) -> Range<usize> {
    match shard {
        None => 0..ntraj,
        Some(Shard { index, count }) => {
            let n = ntraj as u128;
            let s = count as u128;
            let start = (index as u128 * n / s) as usize;
            let end = ((index as u128 + 1) * n / s) as usize;
            start..end
        }
    }
}
