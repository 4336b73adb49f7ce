// SPDX-License-Identifier: CC0-1.0

//! The 512-bit ChaCha state and the values it is built from.

use core::fmt;

use rand::{CryptoRng, RngCore};

use crate::Error;

/// The first four words (32-bit) of the ChaCha stream cipher state are constants.
const WORD_1: u32 = 0x61707865;
const WORD_2: u32 = 0x3320646e;
const WORD_3: u32 = 0x79622d32;
const WORD_4: u32 = 0x6b206574;

/// Number of 32-bit words in the state.
pub const STATE_WORDS: usize = 16;
/// Number of bytes in a key.
pub const NUM_KEY_BYTES: usize = 32;
/// Number of bytes in a nonce.
pub const NUM_NONCE_BYTES: usize = 8;

// Word positions of each field.
const CONSTANTS: usize = 0;
const KEY: usize = 4;
const COUNTER_LOW: usize = 12;
const COUNTER_HIGH: usize = 13;
const NONCE: usize = 14;

/// A 256-bit secret key shared by the parties communicating.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Key([u8; NUM_KEY_BYTES]);

impl Key {
    /// Constructs a new key.
    pub const fn new(key: [u8; NUM_KEY_BYTES]) -> Self {
        Key(key)
    }

    /// Draw a fresh key from a cryptographically secure generator.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut key = [0u8; NUM_KEY_BYTES];
        rng.fill_bytes(&mut key);
        Key(key)
    }

    /// Draw a fresh key from the thread local generator.
    #[cfg(feature = "std")]
    pub fn random() -> Self {
        Self::generate(&mut rand::thread_rng())
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; NUM_KEY_BYTES] {
        &self.0
    }
}

impl From<[u8; NUM_KEY_BYTES]> for Key {
    fn from(key: [u8; NUM_KEY_BYTES]) -> Self {
        Key(key)
    }
}

impl TryFrom<&[u8]> for Key {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let key: [u8; NUM_KEY_BYTES] = bytes.try_into().map_err(|_| Error::InvalidKeyLength {
            actual: bytes.len(),
        })?;
        Ok(Key(key))
    }
}

// Keep key material out of logs.
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// A 64-bit nonce. A key and nonce pair should only be used once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NUM_NONCE_BYTES]);

impl Nonce {
    /// Constructs a new nonce.
    pub const fn new(nonce: [u8; NUM_NONCE_BYTES]) -> Self {
        Nonce(nonce)
    }

    /// Draw a fresh nonce from a cryptographically secure generator.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut nonce = [0u8; NUM_NONCE_BYTES];
        rng.fill_bytes(&mut nonce);
        Nonce(nonce)
    }

    /// The raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NUM_NONCE_BYTES] {
        &self.0
    }
}

impl From<[u8; NUM_NONCE_BYTES]> for Nonce {
    fn from(nonce: [u8; NUM_NONCE_BYTES]) -> Self {
        Nonce(nonce)
    }
}

impl TryFrom<&[u8]> for Nonce {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let nonce: [u8; NUM_NONCE_BYTES] =
            bytes.try_into().map_err(|_| Error::InvalidNonceLength {
                actual: bytes.len(),
            })?;
        Ok(Nonce(nonce))
    }
}

/// Number of rounds applied per block.
///
/// Rounds are applied as column/diagonal pairs, so the count is always even.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rounds(u8);

impl Rounds {
    /// ChaCha8, reduced-round variant.
    pub const R8: Rounds = Rounds(8);
    /// ChaCha12, reduced-round variant.
    pub const R12: Rounds = Rounds(12);
    /// ChaCha20, the conventional variant.
    pub const R20: Rounds = Rounds(20);

    /// Validate a round count, it must be even and non-zero.
    pub const fn new(rounds: u8) -> Result<Self, Error> {
        if rounds == 0 || rounds % 2 != 0 {
            return Err(Error::InvalidRounds { rounds });
        }
        Ok(Rounds(rounds))
    }

    /// The number of single rounds.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The number of double rounds (column round plus diagonal round).
    pub const fn double_rounds(self) -> usize {
        (self.0 / 2) as usize
    }
}

impl Default for Rounds {
    fn default() -> Self {
        Rounds::R20
    }
}

impl TryFrom<u8> for Rounds {
    type Error = Error;

    fn try_from(rounds: u8) -> Result<Self, Self::Error> {
        Rounds::new(rounds)
    }
}

/// The 512-bit cipher state is chunk'd up into 16 32-bit words.
///
/// The 16 words can be visualized as a 4x4 matrix:
///
/// ```text
///   constant  constant  constant  constant
///   key       key       key       key
///   key       key       key       key
///   counter   counter   nonce     nonce
/// ```
///
/// The two counter words hold a single 64-bit little-endian block counter,
/// low word first.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct State([u32; STATE_WORDS]);

impl State {
    /// Initial state for a key and nonce, block counter at zero.
    pub const fn new(key: &Key, nonce: &Nonce) -> Self {
        // Hardcoding indexes to keep the function const.
        let k = &key.0;
        let n = &nonce.0;
        State([
            WORD_1,
            WORD_2,
            WORD_3,
            WORD_4,
            u32::from_le_bytes([k[0], k[1], k[2], k[3]]),
            u32::from_le_bytes([k[4], k[5], k[6], k[7]]),
            u32::from_le_bytes([k[8], k[9], k[10], k[11]]),
            u32::from_le_bytes([k[12], k[13], k[14], k[15]]),
            u32::from_le_bytes([k[16], k[17], k[18], k[19]]),
            u32::from_le_bytes([k[20], k[21], k[22], k[23]]),
            u32::from_le_bytes([k[24], k[25], k[26], k[27]]),
            u32::from_le_bytes([k[28], k[29], k[30], k[31]]),
            0,
            0,
            u32::from_le_bytes([n[0], n[1], n[2], n[3]]),
            u32::from_le_bytes([n[4], n[5], n[6], n[7]]),
        ])
    }

    /// Wrap raw words, no validation is performed on the constant words.
    pub const fn from_words(words: [u32; STATE_WORDS]) -> Self {
        State(words)
    }

    /// All sixteen words in role order.
    pub const fn words(&self) -> &[u32; STATE_WORDS] {
        &self.0
    }

    /// The four constant words.
    pub fn constants(&self) -> [u32; 4] {
        [
            self.0[CONSTANTS],
            self.0[CONSTANTS + 1],
            self.0[CONSTANTS + 2],
            self.0[CONSTANTS + 3],
        ]
    }

    /// The eight key words.
    pub fn key_words(&self) -> [u32; 8] {
        let mut words = [0u32; 8];
        words.copy_from_slice(&self.0[KEY..KEY + 8]);
        words
    }

    /// The two nonce words.
    pub fn nonce_words(&self) -> [u32; 2] {
        [self.0[NONCE], self.0[NONCE + 1]]
    }

    /// The block counter as its `(low, high)` words.
    pub fn counter_words(&self) -> (u32, u32) {
        (self.0[COUNTER_LOW], self.0[COUNTER_HIGH])
    }

    /// The 64-bit block counter.
    pub fn counter(&self) -> u64 {
        u64::from(self.0[COUNTER_LOW]) | (u64::from(self.0[COUNTER_HIGH]) << 32)
    }

    /// Set the 64-bit block counter.
    pub fn set_counter(&mut self, counter: u64) {
        self.0[COUNTER_LOW] = counter as u32;
        self.0[COUNTER_HIGH] = (counter >> 32) as u32;
    }

    /// Copy of this state positioned `blocks` blocks further along.
    pub(crate) fn with_counter_offset(&self, blocks: u64) -> Self {
        let mut state = *self;
        state.set_counter(self.counter().wrapping_add(blocks));
        state
    }

    /// Move the block counter forward, carrying from the low into the high word.
    ///
    /// Running past 2^64 blocks wraps the counter back to zero, which repeats
    /// keystream. The wrap is not an error, but it is logged.
    pub fn advance(&mut self, blocks: u64) {
        let (counter, wrapped) = self.counter().overflowing_add(blocks);
        if wrapped {
            log::warn!("ChaCha block counter wrapped, keystream is repeating.");
        }
        self.set_counter(counter);
    }

    /// Serialize the words little-endian.
    pub fn to_le_bytes(&self) -> [u8; STATE_WORDS * 4] {
        let mut bytes = [0u8; STATE_WORDS * 4];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.0.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}

// The key words are secret.
impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("counter", &self.counter())
            .field("nonce", &self.nonce_words())
            .finish_non_exhaustive()
    }
}
