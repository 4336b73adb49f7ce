// SPDX-License-Identifier: CC0-1.0

//! The ChaCha permutation: quarter rounds and the double round schedule.
//!
//! Two equivalent renditions live here. The vectorized one holds a row of the
//! 4x4 state matrix per [`U32x4`], so one call to [`quarter_round`] performs the
//! four column (or diagonal) quarter rounds at once. The scalar one indexes
//! straight into the 16 words.

use core::ops::BitXor;

use crate::state::STATE_WORDS;

/// Each quarter round of ChaCha scrambles 4 words (32-bit) of the state
/// using some Addition (mod 2^32), Rotation, and XOR (ARX). 8 quarter
/// rounds make up a double round. A block is broken up into 16 32-bit words
/// and each quarter round takes 4 words as input.
const CHACHA_ROUND_INDICIES: [(usize, usize, usize, usize); 8] = [
    // The first 4 rounds are columns of a 4x4 matrix
    // of the block broken up into 32-bit words.
    (0, 4, 8, 12),
    (1, 5, 9, 13),
    (2, 6, 10, 14),
    (3, 7, 11, 15),
    // The last 4 rounds are diagonals of the matrix.
    (0, 5, 10, 15),
    (1, 6, 11, 12),
    (2, 7, 8, 13),
    (3, 4, 9, 14),
];

/// A SIMD-friendly structure which holds 25% of the cipher state.
///
/// Kept as close as possible to the experimental `core::simd::u32x4` so the
/// compiler recognizes the vectorizable sections:
///    * Heavy use of inline functions.
///    * For-each loops over the lanes.
///    * Array based instead of a tuple, since heterogeneous tuples can
///      convince the compiler the data is not vectorizable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct U32x4(pub(crate) [u32; 4]);

impl U32x4 {
    #[cfg(test)]
    pub(crate) const fn splat(word: u32) -> Self {
        U32x4([word; 4])
    }

    #[inline(always)]
    pub(crate) fn wrapping_add(self, rhs: Self) -> Self {
        let mut result = [0u32; 4];
        (0..4).for_each(|i| {
            result[i] = self.0[i].wrapping_add(rhs.0[i]);
        });
        U32x4(result)
    }

    /// Rotate the bits of every lane.
    #[inline(always)]
    pub(crate) fn rotate_left(self, n: u32) -> Self {
        let mut result = [0u32; 4];
        (0..4).for_each(|i| {
            result[i] = self.0[i].rotate_left(n);
        });
        U32x4(result)
    }

    /// Cyclically shift the lanes, lane `N` moves into lane 0.
    #[inline(always)]
    pub(crate) fn rotate_lanes_left<const N: usize>(self) -> Self {
        let [w0, w1, w2, w3] = self.0;
        match N % 4 {
            1 => U32x4([w1, w2, w3, w0]),
            2 => U32x4([w2, w3, w0, w1]),
            3 => U32x4([w3, w0, w1, w2]),
            _ => self,
        }
    }

    #[inline(always)]
    pub(crate) fn to_le_bytes(self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        (0..4).for_each(|i| {
            bytes[i * 4..(i + 1) * 4].copy_from_slice(&self.0[i].to_le_bytes());
        });
        bytes
    }
}

impl BitXor for U32x4 {
    type Output = Self;

    #[inline(always)]
    fn bitxor(self, rhs: Self) -> Self {
        let mut result = [0u32; 4];
        (0..4).for_each(|i| {
            result[i] = self.0[i] ^ rhs.0[i];
        });
        U32x4(result)
    }
}

/// The state as four rows of the 4x4 matrix.
pub(crate) type Rows = [U32x4; 4];

/// Split 16 words into matrix rows.
#[inline(always)]
pub(crate) fn rows(words: &[u32; STATE_WORDS]) -> Rows {
    let mut rows = [U32x4([0; 4]); 4];
    for (row, chunk) in rows.iter_mut().zip(words.chunks_exact(4)) {
        row.0.copy_from_slice(chunk);
    }
    rows
}

/// Four quarter rounds performed on the entire state of the cipher in a vectorized SIMD friendly fashion.
#[inline(always)]
pub(crate) fn quarter_round(a: U32x4, b: U32x4, c: U32x4, d: U32x4) -> Rows {
    let a = a.wrapping_add(b);
    let d = d.bitxor(a).rotate_left(16);

    let c = c.wrapping_add(d);
    let b = b.bitxor(c).rotate_left(12);

    let a = a.wrapping_add(b);
    let d = d.bitxor(a).rotate_left(8);

    let c = c.wrapping_add(d);
    let b = b.bitxor(c).rotate_left(7);

    [a, b, c, d]
}

/// Performs a round on "columns" and then "diagonals" of the state.
///
/// Shifting row `b` one lane, `c` two lanes and `d` three lanes lines the
/// diagonals up as columns, so the same vectorized quarter round handles both.
/// The final shifts put every word back into its column.
#[inline(always)]
pub(crate) fn double_round(state: Rows) -> Rows {
    let [mut a, mut b, mut c, mut d] = state;

    // Column round.
    [a, b, c, d] = quarter_round(a, b, c, d);

    // Diagonal round.
    b = b.rotate_lanes_left::<1>();
    c = c.rotate_lanes_left::<2>();
    d = d.rotate_lanes_left::<3>();
    [a, b, c, d] = quarter_round(a, b, c, d);
    b = b.rotate_lanes_left::<3>();
    c = c.rotate_lanes_left::<2>();
    d = d.rotate_lanes_left::<1>();

    [a, b, c, d]
}

/// Advance several independent states through the same double round.
///
/// There is no data flow between the states, which leaves the CPU free to
/// overlap their instructions.
#[inline(always)]
pub(crate) fn double_round_lanes<const N: usize>(states: &mut [Rows; N]) {
    for state in states.iter_mut() {
        *state = double_round(*state);
    }
}

#[inline(always)]
pub(crate) fn quarter_round_scalar(
    state: &mut [u32; STATE_WORDS],
    a: usize,
    b: usize,
    c: usize,
    d: usize,
) {
    state[a] = state[a].wrapping_add(state[b]);
    state[d] = (state[d] ^ state[a]).rotate_left(16);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] = (state[b] ^ state[c]).rotate_left(12);
    state[a] = state[a].wrapping_add(state[b]);
    state[d] = (state[d] ^ state[a]).rotate_left(8);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] = (state[b] ^ state[c]).rotate_left(7);
}

pub(crate) fn double_round_scalar(state: &mut [u32; STATE_WORDS]) {
    for (a, b, c, d) in CHACHA_ROUND_INDICIES {
        quarter_round_scalar(state, a, b, c, d);
    }
}
