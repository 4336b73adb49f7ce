// SPDX-License-Identifier: CC0-1.0

//! Fuzz test comparing block strategies.
//!
//! Every strategy must produce the same keystream for any key, nonce,
//! counter and round count, including counters about to carry or wrap.

#![no_main]
use chacha_stream::{fill_keystream, Key, Nonce, Quad, Rounds, Scalar, Single, State};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 50 {
        return;
    }
    let key = Key::try_from(&data[..32]).unwrap();
    let nonce = Nonce::try_from(&data[32..40]).unwrap();
    let counter = u64::from_le_bytes(data[40..48].try_into().unwrap());
    let rounds = match Rounds::new((data[48] % 16 + 1) * 2) {
        Ok(rounds) => rounds,
        Err(_) => return,
    };
    let blocks = usize::from(data[49] % 9);

    let mut state = State::new(&key, &nonce);
    state.set_counter(counter);

    let mut scalar = vec![0u8; blocks * 64];
    let mut single = scalar.clone();
    let mut quad = scalar.clone();
    fill_keystream::<Scalar>(&mut { state }, rounds, &mut scalar).unwrap();
    fill_keystream::<Single>(&mut { state }, rounds, &mut single).unwrap();
    fill_keystream::<Quad>(&mut { state }, rounds, &mut quad).unwrap();

    assert_eq!(scalar, single);
    assert_eq!(scalar, quad);
});
