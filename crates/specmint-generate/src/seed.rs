//! Per-field, per-record seed derivation.
//!
//! Every random draw in a generation run starts from [`derive_seed`], so the
//! same `(base_seed, path, record_index)` always yields the same stream.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;
const SIGN_MASK: u64 = 0x7fff_ffff_ffff_ffff;

/// FNV-1a over `path` followed by the low 32 bits of `record_index`
/// (little-endian), sign bit cleared, XORed with `base_seed`.
pub fn derive_seed(base_seed: i64, path: &str, record_index: u64) -> i64 {
    let index_bytes = (record_index as u32).to_le_bytes();
    let mut hash = FNV_OFFSET_BASIS;
    for byte in path.as_bytes().iter().chain(index_bytes.iter()) {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    ((hash & SIGN_MASK) as i64) ^ base_seed
}

/// Seeded source for a derived seed.
pub fn seeded_rng(seed: i64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed as u64)
}
