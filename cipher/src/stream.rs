// SPDX-License-Identifier: CC0-1.0

//! Streaming XOR against a buffered keystream.

use core::{fmt, mem};

use crate::block::{Auto, Strategy, BLOCK_SIZE};
use crate::state::{Key, Nonce, Rounds, State};
use crate::Error;

/// Width of the XOR lanes, remainders are handled byte by byte.
const XOR_LANE_BYTES: usize = 16;

/// An open ChaCha keystream.
///
/// Holds the cipher state, one batch of generated keystream and a cursor
/// into it. Bytes are consumed from the batch in order and a new batch is
/// generated as soon as the current one is used up, so any sequence of
/// calls sees the same keystream no matter how the data is chunked.
///
/// A stream is mutated in place on every call. Share it across threads
/// behind a lock, or give each connection its own stream.
#[derive(Clone)]
pub struct CipherStream<S: Strategy = Auto> {
    state: State,
    rounds: Rounds,
    /// The most recently generated batch.
    buffer: S::Batch,
    /// Bytes of `buffer` already consumed.
    offset: usize,
}

impl CipherStream {
    /// Make a new ChaCha20 stream positioned at the start of the keystream.
    pub fn new(key: Key, nonce: Nonce) -> Self {
        Self::init(key, nonce, Rounds::R20)
    }

    /// Make a new stream with a custom round count.
    pub fn with_rounds(key: Key, nonce: Nonce, rounds: Rounds) -> Self {
        Self::init(key, nonce, rounds)
    }
}

impl<S: Strategy> CipherStream<S> {
    /// Bytes of keystream generated per batch.
    pub const CAPACITY: usize = S::BLOCKS * BLOCK_SIZE;

    /// Make a new stream for an explicit strategy.
    ///
    /// The keystream buffer starts out exhausted, the first non-empty call
    /// generates the first batch.
    pub fn init(key: Key, nonce: Nonce, rounds: Rounds) -> Self {
        Self::from_state(State::new(&key, &nonce), rounds)
    }

    /// Resume from a raw state, the next byte is the first byte of the
    /// state's current block.
    pub fn from_state(state: State, rounds: Rounds) -> Self {
        CipherStream {
            state,
            rounds,
            buffer: S::EMPTY,
            offset: Self::CAPACITY,
        }
    }

    /// The configured round count.
    pub fn rounds(&self) -> Rounds {
        self.rounds
    }

    /// Absolute byte position of the next keystream byte, modulo 2^64.
    pub fn position(&self) -> u64 {
        let unused = (Self::CAPACITY - self.offset) as u64;
        self.state
            .counter()
            .wrapping_mul(BLOCK_SIZE as u64)
            .wrapping_sub(unused)
    }

    /// Update the index of the keystream to the given byte.
    pub fn seek(&mut self, position: u64) {
        log::trace!("Seeking keystream to byte {}.", position);
        self.state.set_counter(position / BLOCK_SIZE as u64);
        self.refill();
        self.offset = (position % BLOCK_SIZE as u64) as usize;
    }

    /// Update the index of the keystream to the start of a block.
    pub fn block(&mut self, block: u64) {
        log::trace!("Seeking keystream to block {}.", block);
        self.state.set_counter(block);
        self.refill();
    }

    /// Apply the keystream to a buffer in place.
    pub fn apply_keystream(&mut self, mut buffer: &mut [u8]) {
        if buffer.is_empty() {
            return;
        }

        while !buffer.is_empty() {
            let keystream = self.take_keystream(buffer.len());
            let (chunk, rest) = mem::take(&mut buffer).split_at_mut(keystream.len());
            xor_in_place(chunk, keystream);
            buffer = rest;
        }

        self.refill_if_exhausted();
    }

    /// Apply the keystream to `input`, writing the result to `output`.
    ///
    /// # Errors
    ///
    /// [`Error::LengthMismatch`] if the buffers differ in length, in which
    /// case no keystream is consumed.
    pub fn apply_keystream_b2b(&mut self, input: &[u8], output: &mut [u8]) -> Result<(), Error> {
        if input.len() != output.len() {
            return Err(Error::LengthMismatch {
                input: input.len(),
                output: output.len(),
            });
        }
        if input.is_empty() {
            return Ok(());
        }

        let mut input = input;
        let mut output = output;
        while !input.is_empty() {
            let keystream = self.take_keystream(input.len());
            let step = keystream.len();
            let (chunk, rest) = mem::take(&mut output).split_at_mut(step);
            xor_into(chunk, &input[..step], keystream);
            input = &input[step..];
            output = rest;
        }

        self.refill_if_exhausted();
        Ok(())
    }

    /// Write raw keystream into `out`, consuming it.
    pub fn keystream(&mut self, out: &mut [u8]) {
        out.fill(0);
        self.apply_keystream(out);
    }

    /// Hand out up to `max` bytes of buffered keystream, generating a new
    /// batch first if the current one is used up.
    fn take_keystream(&mut self, max: usize) -> &[u8] {
        if self.offset == Self::CAPACITY {
            self.refill();
        }
        let start = self.offset;
        let step = (Self::CAPACITY - start).min(max);
        self.offset += step;
        &self.buffer.as_ref()[start..start + step]
    }

    fn refill_if_exhausted(&mut self) {
        if self.offset == Self::CAPACITY {
            self.refill();
        }
    }

    fn refill(&mut self) {
        S::generate(&mut self.state, self.rounds, &mut self.buffer);
        self.offset = 0;
    }
}

impl<S: Strategy> fmt::Debug for CipherStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherStream")
            .field("state", &self.state)
            .field("rounds", &self.rounds)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// XOR `keystream` into `buffer`, 16 bytes at a time.
#[inline]
fn xor_in_place(buffer: &mut [u8], keystream: &[u8]) {
    debug_assert_eq!(buffer.len(), keystream.len());
    let mut lanes = buffer.chunks_exact_mut(XOR_LANE_BYTES);
    let mut keystream_lanes = keystream.chunks_exact(XOR_LANE_BYTES);
    for (lane, key_lane) in (&mut lanes).zip(&mut keystream_lanes) {
        let xored = load(lane) ^ load(key_lane);
        lane.copy_from_slice(&xored.to_ne_bytes());
    }
    for (byte, key_byte) in lanes
        .into_remainder()
        .iter_mut()
        .zip(keystream_lanes.remainder())
    {
        *byte ^= *key_byte;
    }
}

/// XOR `input` with `keystream` into `output`, 16 bytes at a time.
#[inline]
fn xor_into(output: &mut [u8], input: &[u8], keystream: &[u8]) {
    debug_assert_eq!(output.len(), input.len());
    debug_assert_eq!(input.len(), keystream.len());
    let mut lanes = output.chunks_exact_mut(XOR_LANE_BYTES);
    let mut input_lanes = input.chunks_exact(XOR_LANE_BYTES);
    let mut keystream_lanes = keystream.chunks_exact(XOR_LANE_BYTES);
    for ((lane, in_lane), key_lane) in (&mut lanes)
        .zip(&mut input_lanes)
        .zip(&mut keystream_lanes)
    {
        let xored = load(in_lane) ^ load(key_lane);
        lane.copy_from_slice(&xored.to_ne_bytes());
    }
    for ((byte, in_byte), key_byte) in lanes
        .into_remainder()
        .iter_mut()
        .zip(input_lanes.remainder())
        .zip(keystream_lanes.remainder())
    {
        *byte = *in_byte ^ *key_byte;
    }
}

#[inline(always)]
fn load(lane: &[u8]) -> u128 {
    u128::from_ne_bytes(lane.try_into().expect("chunks_exact yields 16 byte lanes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{fill_keystream, Quad, Scalar, Single};
    use hex::prelude::*;
    use rand::Rng;
    use std::vec;
    use std::vec::Vec;

    const SUNSCREEN: &[u8; 114] = b"Ladies and Gentlemen of the class of '99: If I could offer you only one tip for the future, sunscreen would be it.";

    fn rfc_key() -> Key {
        Key::try_from(
            Vec::from_hex("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f")
                .unwrap()
                .as_slice(),
        )
        .unwrap()
    }

    fn rfc_nonce() -> Nonce {
        Nonce::try_from(Vec::from_hex("0000004a00000000").unwrap().as_slice()).unwrap()
    }

    fn gen_garbage(len: usize) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.gen()).collect()
    }

    fn random_splits(len: usize) -> Vec<usize> {
        let mut rng = rand::thread_rng();
        let mut sizes = Vec::new();
        let mut left = len;
        while left > 0 {
            let size = rng.gen_range(1..=left.min(300));
            sizes.push(size);
            left -= size;
        }
        sizes
    }

    #[test]
    fn test_rfc_standard() {
        let mut chacha = CipherStream::new(rfc_key(), rfc_nonce());
        chacha.block(1);
        let mut binding = *SUNSCREEN;
        chacha.apply_keystream(&mut binding[..]);
        assert_eq!(binding[..], Vec::from_hex("6e2e359a2568f98041ba0728dd0d6981e97e7aec1d4360c20a27afccfd9fae0bf91b65c5524733ab8f593dabcd62b3571639d624e65152ab8f530c359f0861d807ca0dbf500d6a6156a38e088a22b65e52bc514d16ccf806818ce91ab77937365af90bbf74a35be6b40b8eedf2785e42874d").unwrap());

        let mut chacha = CipherStream::new(rfc_key(), rfc_nonce());
        chacha.seek(64);
        chacha.apply_keystream(&mut binding[..]);
        assert_eq!(&binding, SUNSCREEN);
    }

    #[test]
    fn test_small_plaintext() {
        let mut chacha = CipherStream::new(rfc_key(), rfc_nonce());
        let mut binding = [8; 3];
        chacha.apply_keystream(&mut binding[..]);
        let mut chacha = CipherStream::new(rfc_key(), rfc_nonce());
        chacha.apply_keystream(&mut binding[..]);
        assert_eq!([8; 3], binding);
    }

    #[test]
    fn test_modulo_64() {
        let mut chacha = CipherStream::new(rfc_key(), rfc_nonce());
        let mut binding = [8; 64];
        chacha.apply_keystream(&mut binding[..]);
        let mut chacha = CipherStream::new(rfc_key(), rfc_nonce());
        chacha.apply_keystream(&mut binding[..]);
        assert_eq!([8; 64], binding);
    }

    fn chunking_is_transparent<S: Strategy>() {
        let key = Key::generate(&mut rand::thread_rng());
        let nonce = Nonce::generate(&mut rand::thread_rng());
        for len in [0, 1, 15, 16, 17, 63, 64, 65, 255, 256, 257, 1000, 4099] {
            let message = gen_garbage(len);

            let mut whole = message.clone();
            CipherStream::<S>::init(key, nonce, Rounds::R20).apply_keystream(&mut whole);

            let mut chunked = message.clone();
            let mut chacha = CipherStream::<S>::init(key, nonce, Rounds::R20);
            let mut start = 0;
            for size in random_splits(len) {
                chacha.apply_keystream(&mut chunked[start..start + size]);
                start += size;
            }
            assert_eq!(whole, chunked);

            let mut bytewise = message.clone();
            let mut chacha = CipherStream::<S>::init(key, nonce, Rounds::R20);
            for byte in bytewise.chunks_mut(1) {
                chacha.apply_keystream(byte);
            }
            assert_eq!(whole, bytewise);
        }
    }

    #[test]
    fn test_chunking_is_transparent() {
        chunking_is_transparent::<Scalar>();
        chunking_is_transparent::<Single>();
        chunking_is_transparent::<Quad>();
    }

    #[test]
    fn test_multiple_partial_applies() {
        let mut chacha_full = CipherStream::<Quad>::init(rfc_key(), rfc_nonce(), Rounds::R20);
        let mut chacha_chunked = CipherStream::<Quad>::init(rfc_key(), rfc_nonce(), Rounds::R20);

        let mut full_buffer = [0u8; 600];
        for (i, byte) in full_buffer.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let mut chunked_buffer = full_buffer;

        chacha_full.apply_keystream(&mut full_buffer);
        // Partial batch, across a batch boundary, then a tail.
        chacha_chunked.apply_keystream(&mut chunked_buffer[..30]);
        chacha_chunked.apply_keystream(&mut chunked_buffer[30..282]);
        chacha_chunked.apply_keystream(&mut chunked_buffer[282..]);

        assert_eq!(full_buffer, chunked_buffer);
    }

    #[test]
    fn test_round_trip() {
        for _ in 0..50 {
            let key = Key::generate(&mut rand::thread_rng());
            let nonce = Nonce::generate(&mut rand::thread_rng());
            let message = gen_garbage(rand::thread_rng().gen_range(0..2048));

            let mut buffer = message.clone();
            CipherStream::new(key, nonce).apply_keystream(&mut buffer);
            if message.len() > 32 {
                assert_ne!(buffer, message);
            }
            CipherStream::new(key, nonce).apply_keystream(&mut buffer);
            assert_eq!(buffer, message);
        }
    }

    #[test]
    fn test_refill_on_batch_boundary() {
        let start = State::new(&rfc_key(), &rfc_nonce());
        let mut chacha = CipherStream::<Quad>::from_state(start, Rounds::R20);
        let capacity = CipherStream::<Quad>::CAPACITY;

        let mut first = vec![0u8; capacity];
        chacha.apply_keystream(&mut first);
        // One batch to serve the bytes, one eager refill once it ran dry.
        assert_eq!(chacha.state.counter(), 8);
        assert_eq!(chacha.offset, 0);

        let mut extra = [0u8; 1];
        chacha.apply_keystream(&mut extra);
        assert_eq!(chacha.state.counter(), 8);
        assert_eq!(chacha.offset, 1);

        let mut next_block = start;
        next_block.set_counter(4);
        let mut expected = Single::EMPTY;
        Single::generate(&mut next_block, Rounds::R20, &mut expected);
        assert_eq!(extra[0], expected[0]);
    }

    #[test]
    fn test_counter_carry_through_stream() {
        let mut start = State::new(&rfc_key(), &rfc_nonce());
        start.set_counter(0x0000_0007_ffff_ffff);
        let mut chacha = CipherStream::<Single>::from_state(start, Rounds::R20);
        let mut skipped = [0u8; 64];
        chacha.apply_keystream(&mut skipped);
        assert_eq!(chacha.state.counter_words(), (1, 8));

        let mut after_carry = [0u8; 64];
        chacha.apply_keystream(&mut after_carry);

        let mut carried = start;
        carried.set_counter(0x0000_0008_0000_0000);
        let mut expected = [0u8; 64];
        fill_keystream::<Scalar>(&mut carried, Rounds::R20, &mut expected).unwrap();
        assert_eq!(after_carry, expected);
    }

    #[test]
    fn test_seek_matches_discarded_prefix() {
        let key = Key::generate(&mut rand::thread_rng());
        let nonce = Nonce::generate(&mut rand::thread_rng());
        let mut reference = vec![0u8; 2048];
        CipherStream::new(key, nonce).keystream(&mut reference);

        for position in [0u64, 1, 63, 64, 65, 255, 256, 1000, 1500] {
            let mut chacha = CipherStream::new(key, nonce);
            chacha.seek(position);
            assert_eq!(chacha.position(), position);
            let mut out = vec![0u8; 300];
            chacha.keystream(&mut out);
            let start = position as usize;
            assert_eq!(out[..], reference[start..start + 300]);
            assert_eq!(chacha.position(), position + 300);
        }
    }

    #[test]
    fn test_position_tracks_consumption() {
        let key = Key::generate(&mut rand::thread_rng());
        let mut chacha = CipherStream::<Quad>::init(key, Nonce::new([0; 8]), Rounds::R8);
        assert_eq!(chacha.position(), 0);
        let mut total = 0u64;
        for size in random_splits(3000) {
            let mut chunk = vec![0u8; size];
            chacha.apply_keystream(&mut chunk);
            total += size as u64;
            assert_eq!(chacha.position(), total);
        }
    }

    #[test]
    fn test_keystream_matches_block_generator() {
        let mut chacha = CipherStream::<Quad>::init(rfc_key(), rfc_nonce(), Rounds::R20);
        let mut streamed = vec![0u8; 640];
        chacha.keystream(&mut streamed);

        let mut state = State::new(&rfc_key(), &rfc_nonce());
        let mut generated = vec![0u8; 640];
        fill_keystream::<Scalar>(&mut state, Rounds::R20, &mut generated).unwrap();
        assert_eq!(streamed, generated);
    }

    #[test]
    fn test_b2b_matches_in_place() {
        let key = Key::generate(&mut rand::thread_rng());
        let nonce = Nonce::generate(&mut rand::thread_rng());
        let message = gen_garbage(1234);

        let mut in_place = message.clone();
        let mut chacha = CipherStream::new(key, nonce);
        chacha.apply_keystream(&mut in_place[..100]);
        chacha.apply_keystream(&mut in_place[100..]);

        let mut output = vec![0u8; message.len()];
        let mut chacha = CipherStream::new(key, nonce);
        chacha
            .apply_keystream_b2b(&message[..100], &mut output[..100])
            .unwrap();
        chacha
            .apply_keystream_b2b(&message[100..], &mut output[100..])
            .unwrap();

        assert_eq!(in_place, output);
    }

    #[test]
    fn test_b2b_length_mismatch() {
        let mut chacha = CipherStream::new(rfc_key(), rfc_nonce());
        let mut output = [0u8; 10];
        assert_eq!(
            chacha.apply_keystream_b2b(&[0u8; 11], &mut output),
            Err(Error::LengthMismatch {
                input: 11,
                output: 10
            })
        );
        assert_eq!(chacha.position(), 0);
    }

    #[test]
    fn test_empty_input_generates_nothing() {
        let mut chacha = CipherStream::<Single>::init(rfc_key(), rfc_nonce(), Rounds::R20);
        chacha.apply_keystream(&mut []);
        assert_eq!(chacha.state.counter(), 0);
        assert_eq!(chacha.offset, CipherStream::<Single>::CAPACITY);
    }

    #[test]
    fn test_wide_xor_matches_bytewise() {
        for len in [0, 1, 15, 16, 17, 31, 32, 33, 100] {
            let input = gen_garbage(len);
            let keystream = gen_garbage(len);
            let expected: Vec<u8> = input.iter().zip(&keystream).map(|(a, b)| a ^ b).collect();

            let mut in_place = input.clone();
            xor_in_place(&mut in_place, &keystream);
            assert_eq!(in_place, expected);

            let mut output = vec![0u8; len];
            xor_into(&mut output, &input, &keystream);
            assert_eq!(output, expected);
        }
    }
}
