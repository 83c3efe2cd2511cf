//! Shared-secret check for the scheduler trigger.

use sha2::{Digest, Sha256};

/// Compare `presented` with `expected` in time independent of where they
/// differ. Both sides are hashed first so length does not leak either.
pub fn secret_matches(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
