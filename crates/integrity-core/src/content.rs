//! Deterministic content and its fingerprint.
//!
//! Content is drawn from ChaCha12 seeded with the file seed, one uppercase
//! letter per byte. The generator algorithm is part of the on-disk format
//! and stays pinned to ChaCha12 across `rand` upgrades.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

/// Symbols content is drawn from.
pub const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Produce `size` bytes of reproducible content for `seed`.
///
/// The stream is prefix-stable: `generate(s, n)` is a prefix of
/// `generate(s, m)` whenever `n <= m`.
pub fn generate(seed: i64, size: u64) -> Vec<u8> {
    let mut rng = ChaCha12Rng::seed_from_u64(seed as u64);
    (0..size)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())])
        .collect()
}

/// Lowercase hex BLAKE3 digest of `data`.
///
/// Detects corruption only; not a tamper-proof MAC.
#[inline]
pub fn digest(data: &[u8]) -> String {
    hex::encode(blake3::hash(data).as_bytes())
}
