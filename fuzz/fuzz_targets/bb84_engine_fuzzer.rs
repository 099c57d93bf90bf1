//! Fuzz target for the BB84 engine
//!
//! Runs the engine over arbitrary run sizes, eavesdropper settings and RNG
//! seeds.
//!
//! # Invariants
//!
//! - Every per-qubit sequence has `bit_count` entries
//! - The sifted key is no longer than the qubit count
//! - Error count never exceeds the sifted key length
//! - QBER stays within 0..=100 and is 0 without an eavesdropper

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qkd_core::{Bb84Config, simulate};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Arbitrary)]
struct EngineInput {
    seed: u64,
    /// Capped so a single input stays fast
    bit_count: u16,
    eavesdropper: bool,
}

fuzz_target!(|input: EngineInput| {
    let bit_count = usize::from(input.bit_count % 2048);
    let config = Bb84Config::new(bit_count).with_eavesdropper(input.eavesdropper);
    let run = simulate(config, &mut ChaCha8Rng::seed_from_u64(input.seed));

    assert_eq!(run.alice_bits.len(), bit_count);
    assert_eq!(run.bob_results.len(), bit_count);
    assert!(run.sifted_key.len() <= bit_count);
    assert!(run.error_count <= run.sifted_key.len());
    assert!((0.0..=100.0).contains(&run.error_rate));

    if !input.eavesdropper {
        assert_eq!(run.error_count, 0);
    }
});
