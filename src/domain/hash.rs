//! Deterministic string hashing for rollout bucketing.
//!
//! The hash is a 31-multiplier rolling hash over the UTF-16 code units of the
//! input, wrapped to 32 bits. It is stable for the lifetime of the system and
//! must never be reseeded: changing it would move users between rollout
//! buckets.
//!
//! This is not a cryptographic hash and must not be used for anything other
//! than consistent bucketing.

/// `2^31 - 1`, the divisor used to map the hash into the unit interval.
const MODULUS: u32 = 2_147_483_647;

/// Maps a string to a value in `[0, 1)`.
///
/// The same input always yields the same output.
///
/// ```
/// use tiers::domain::hash::stable_hash;
///
/// let a = stable_hash("user-42");
/// assert_eq!(a, stable_hash("user-42"));
/// assert!((0.0..1.0).contains(&a));
/// ```
#[must_use]
pub fn stable_hash(input: &str) -> f64 {
    let hash = input
        .encode_utf16()
        .fold(0_i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)));

    // |i32::MIN| and i32::MAX would otherwise land on or above 1.0
    f64::from(hash.unsigned_abs() % MODULUS) / f64::from(MODULUS)
}

/// The rollout bucket of a string, in `[0, 100)`.
#[must_use]
pub fn bucket(input: &str) -> f64 {
    stable_hash(input) * 100.0
}
