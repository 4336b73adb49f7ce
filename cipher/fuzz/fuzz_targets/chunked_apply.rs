// SPDX-License-Identifier: CC0-1.0

//! Fuzz test for chunked keystream application.
//!
//! The first bytes pick a key, nonce and starting block, the rest is split
//! into chunks at fuzzer chosen boundaries. Applying the keystream chunk by
//! chunk must match applying it in one call.

#![no_main]
use chacha_stream::{CipherStream, Key, Nonce};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 42 {
        return;
    }
    let (params, rest) = data.split_at(42);
    let key = Key::try_from(&params[..32]).unwrap();
    let nonce = Nonce::try_from(&params[32..40]).unwrap();
    // A small chunk size keeps the fuzzer crossing batch boundaries.
    let chunk = usize::from(params[40] % 97) + 1;
    let start = u64::from(params[41]) * 64 + u64::from(params[40]);

    let mut expected = rest.to_vec();
    let mut whole = CipherStream::new(key, nonce);
    whole.seek(start);
    whole.apply_keystream(&mut expected);

    let mut actual = rest.to_vec();
    let mut chunked = CipherStream::new(key, nonce);
    chunked.seek(start);
    for piece in actual.chunks_mut(chunk) {
        chunked.apply_keystream(piece);
    }

    assert_eq!(actual, expected);
    assert_eq!(chunked.position(), whole.position());
});
