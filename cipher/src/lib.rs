// SPDX-License-Identifier: CC0-1.0

//! The ChaCha stream cipher with a resumable keystream.
//!
//! This crate implements the original ChaCha layout: a 256-bit key, a 64-bit
//! nonce and a 64-bit block counter. Keystream is generated a batch of blocks
//! at a time and consumed through an offset cursor, so callers can feed data
//! in chunks of any size, aligned to nothing.
//!
//! # Quick Start
//!
//! ```
//! use chacha_stream::{CipherStream, Key, Nonce};
//!
//! let key = Key::new([0x42; 32]);
//! let nonce = Nonce::new([0x24; 8]);
//!
//! let mut message = *b"Attack at dawn, and bring snacks.";
//! let mut cipher = CipherStream::new(key, nonce);
//! // Chunk boundaries do not matter.
//! for chunk in message.chunks_mut(5) {
//!     cipher.apply_keystream(chunk);
//! }
//!
//! // XOR is its own inverse, a fresh stream decrypts.
//! let mut cipher = CipherStream::new(key, nonce);
//! cipher.apply_keystream(&mut message);
//! assert_eq!(&message, b"Attack at dawn, and bring snacks.");
//! ```
//!
//! # Layout
//!
//! | Words | Contents |
//! |-------|----------|
//! | 0-3 | Constants, `"expand 32-byte k"` |
//! | 4-11 | Key, little-endian |
//! | 12-13 | Block counter, low word first |
//! | 14-15 | Nonce, little-endian |
//!
//! # Block generation
//!
//! Blocks are produced by a [`Strategy`]. [`Scalar`] and [`Single`] produce
//! one block per batch, [`Quad`] produces four with the block states advanced
//! side by side. [`Auto`] selects one at build time. All of them produce
//! identical keystream.
//!
//! # Security
//!
//! This crate does not authenticate ciphertexts. The block counter silently
//! wraps after 2^64 blocks, repeating keystream; a key and nonce pair must
//! never be reused.
#![no_std]

#[cfg(any(feature = "std", test))]
extern crate std;

mod block;
#[cfg(feature = "tokio")]
pub mod futures;
#[cfg(feature = "std")]
pub mod io;
mod permutation;
mod state;
mod stream;

use core::fmt;

pub use block::{fill_keystream, Auto, Quad, Scalar, Single, Strategy, BLOCK_SIZE};
pub use state::{Key, Nonce, Rounds, State, NUM_KEY_BYTES, NUM_NONCE_BYTES, STATE_WORDS};
pub use stream::CipherStream;

/// Errors raised when building or driving a cipher stream.
///
/// Steady state keystream application never fails, these only guard the
/// shapes of the inputs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Keys are exactly 32 bytes.
    InvalidKeyLength { actual: usize },
    /// Nonces are exactly 8 bytes.
    InvalidNonceLength { actual: usize },
    /// Rounds are applied in pairs, so the count must be even and non-zero.
    InvalidRounds { rounds: u8 },
    /// Raw keystream generation only deals in whole 64-byte blocks.
    PartialBlock { len: usize },
    /// Input and output buffers must be the same length.
    LengthMismatch { input: usize, output: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidKeyLength { actual } => {
                write!(f, "Key must be {NUM_KEY_BYTES} bytes, got {actual}.")
            }
            Error::InvalidNonceLength { actual } => {
                write!(f, "Nonce must be {NUM_NONCE_BYTES} bytes, got {actual}.")
            }
            Error::InvalidRounds { rounds } => {
                write!(f, "Round count must be even and non-zero, got {rounds}.")
            }
            Error::PartialBlock { len } => write!(
                f,
                "Keystream buffer must be a multiple of {BLOCK_SIZE} bytes, got {len}."
            ),
            Error::LengthMismatch { input, output } => write!(
                f,
                "Input is {input} bytes but output is {output} bytes."
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidKeyLength { .. } => None,
            Error::InvalidNonceLength { .. } => None,
            Error::InvalidRounds { .. } => None,
            Error::PartialBlock { .. } => None,
            Error::LengthMismatch { .. } => None,
        }
    }
}
