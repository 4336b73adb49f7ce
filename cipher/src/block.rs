// SPDX-License-Identifier: CC0-1.0

//! Batched keystream block generation.
//!
//! A [`Strategy`] turns the current [`State`] into a batch of consecutive
//! 64-byte keystream blocks and moves the state's block counter past them.
//! Every strategy produces identical bytes, they only differ in how many
//! blocks are computed per call and how the permutation is evaluated.

use core::fmt;

use crate::permutation::{
    double_round, double_round_lanes, double_round_scalar, rows, Rows, U32x4,
};
use crate::state::{Rounds, State, STATE_WORDS};
use crate::Error;

/// The cipher's block size is 64 bytes.
pub const BLOCK_SIZE: usize = 64;

/// A block generation implementation.
pub trait Strategy {
    /// Number of blocks produced per batch.
    const BLOCKS: usize;
    /// Storage for one batch of keystream, `BLOCKS * BLOCK_SIZE` bytes.
    type Batch: AsRef<[u8]> + AsMut<[u8]> + Copy + fmt::Debug;
    /// A zeroed batch.
    const EMPTY: Self::Batch;

    /// Fill `batch` with the keystream blocks starting at the state's counter
    /// and advance the counter by [`Strategy::BLOCKS`].
    fn generate(state: &mut State, rounds: Rounds, batch: &mut Self::Batch);
}

/// One block per batch, rounds evaluated word by word.
#[derive(Clone, Copy, Debug, Default)]
pub struct Scalar;

/// One block per batch, rounds evaluated a matrix row at a time.
#[derive(Clone, Copy, Debug, Default)]
pub struct Single;

/// Four blocks per batch, the four block states advanced side by side.
#[derive(Clone, Copy, Debug, Default)]
pub struct Quad;

/// The strategy picked for the build target.
///
/// Targets with 128-bit vector registers get [`Quad`], everything else runs
/// the [`Scalar`] schedule.
#[cfg(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "aarch64",
    all(target_arch = "arm", target_feature = "neon"),
    all(target_arch = "wasm32", target_feature = "simd128"),
))]
pub type Auto = Quad;

/// The strategy picked for the build target.
///
/// Targets with 128-bit vector registers get [`Quad`], everything else runs
/// the [`Scalar`] schedule.
#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "aarch64",
    all(target_arch = "arm", target_feature = "neon"),
    all(target_arch = "wasm32", target_feature = "simd128"),
)))]
pub type Auto = Scalar;

impl Strategy for Scalar {
    const BLOCKS: usize = 1;
    type Batch = [u8; BLOCK_SIZE];
    const EMPTY: Self::Batch = [0u8; BLOCK_SIZE];

    fn generate(state: &mut State, rounds: Rounds, batch: &mut Self::Batch) {
        let mut working: [u32; STATE_WORDS] = *state.words();
        for _ in 0..rounds.double_rounds() {
            double_round_scalar(&mut working);
        }

        for (out, (modified, initial)) in batch
            .chunks_exact_mut(4)
            .zip(working.iter().zip(state.words().iter()))
        {
            out.copy_from_slice(&modified.wrapping_add(*initial).to_le_bytes());
        }

        state.advance(1);
    }
}

impl Strategy for Single {
    const BLOCKS: usize = 1;
    type Batch = [u8; BLOCK_SIZE];
    const EMPTY: Self::Batch = [0u8; BLOCK_SIZE];

    fn generate(state: &mut State, rounds: Rounds, batch: &mut Self::Batch) {
        let initial = rows(state.words());
        let mut working = initial;
        for _ in 0..rounds.double_rounds() {
            working = double_round(working);
        }

        finalize(&initial, &working, batch);

        state.advance(1);
    }
}

impl Strategy for Quad {
    const BLOCKS: usize = 4;
    type Batch = [u8; 4 * BLOCK_SIZE];
    const EMPTY: Self::Batch = [0u8; 4 * BLOCK_SIZE];

    fn generate(state: &mut State, rounds: Rounds, batch: &mut Self::Batch) {
        // Each lane gets its own counter, the carry is resolved per lane.
        let initial: [Rows; 4] = [0u64, 1, 2, 3].map(|i| rows(state.with_counter_offset(i).words()));
        let mut working = initial;
        for _ in 0..rounds.double_rounds() {
            double_round_lanes(&mut working);
        }

        for ((out, initial), working) in batch
            .chunks_exact_mut(BLOCK_SIZE)
            .zip(initial.iter())
            .zip(working.iter())
        {
            finalize(initial, working, out);
        }

        state.advance(4);
    }
}

/// Add the initial state back into the permuted state and serialize the
/// block little-endian.
#[inline(always)]
fn finalize(initial: &Rows, working: &Rows, out: &mut [u8]) {
    debug_assert_eq!(out.len(), BLOCK_SIZE);
    for (chunk, (modified, initial)) in out
        .chunks_exact_mut(16)
        .zip(working.iter().zip(initial.iter()))
    {
        let row: U32x4 = modified.wrapping_add(*initial);
        chunk.copy_from_slice(&row.to_le_bytes());
    }
}

/// Fill `out` with keystream blocks using strategy `S`, advancing the state
/// by one block per 64 bytes written.
///
/// Whole batches go through `S`, a trailing run of fewer than
/// [`Strategy::BLOCKS`] blocks is produced one block at a time.
///
/// # Errors
///
/// [`Error::PartialBlock`] if `out` is not a whole number of blocks, in which
/// case nothing is written and the state is untouched.
pub fn fill_keystream<S: Strategy>(
    state: &mut State,
    rounds: Rounds,
    out: &mut [u8],
) -> Result<(), Error> {
    if out.len() % BLOCK_SIZE != 0 {
        return Err(Error::PartialBlock { len: out.len() });
    }

    let mut batch = S::EMPTY;
    let mut chunks = out.chunks_exact_mut(S::BLOCKS * BLOCK_SIZE);
    for chunk in &mut chunks {
        S::generate(state, rounds, &mut batch);
        chunk.copy_from_slice(batch.as_ref());
    }

    let mut block = Single::EMPTY;
    for chunk in chunks.into_remainder().chunks_exact_mut(BLOCK_SIZE) {
        Single::generate(state, rounds, &mut block);
        chunk.copy_from_slice(&block);
    }

    Ok(())
}
