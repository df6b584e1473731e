//! Common helper functions for Tandem.

use subtle::ConstantTimeEq;

/// Performs a constant-time comparison of two byte strings.
///
/// Slices of different lengths compare unequal; the length itself is not
/// treated as secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Returns true if any element of `set` equals `candidate`.
///
/// Every element is compared, so the time taken depends on the size of the
/// set and not on the position of a match.
pub fn constant_time_contains<T: AsRef<[u8]>>(set: &[T], candidate: &[u8]) -> bool {
    let mut found = subtle::Choice::from(0u8);
    for item in set {
        found |= item.as_ref().ct_eq(candidate);
    }
    found.into()
}
