use std::hash::Hasher;

use rustc_hash::FxHasher;

/// Fx hash of exactly `bytes`, suitable as the `hash` argument of
/// [`StringPool::intern`](crate::StringPool::intern). Parsers that already
/// hash their tokens for other purposes can pass that value instead.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    hasher.finish()
}
