//! Modular `w`-bit helpers shared by every lattice element.
//!
//! Everything in the domain is built on top of native `u64`/`i64` storage
//! with an explicit bit-width `w` (1..=64); these helpers mask, reinterpret
//! and wrap values the same way a real machine word would at that width.

use num_integer::Integer;

/// Maximum supported bit-width. Widths above this don't fit in a `u64`
/// lane; a wider backing type would be a straightforward but unneeded
/// extension for the machine integer widths VSA targets (8/16/32/64/128).
pub const MAX_WIDTH: u32 = 64;

/// All-ones mask for the low `w` bits.
#[must_use]
pub fn mask(w: u32) -> u64 {
    debug_assert!((1..=MAX_WIDTH).contains(&w));
    if w == 64 {
        u64::MAX
    } else {
        (1u64 << w) - 1
    }
}

/// Reduce `v` modulo `2^w`.
#[must_use]
pub fn wrap(w: u32, v: u64) -> u64 {
    v & mask(w)
}

/// Two's-complement reinterpretation of a `w`-bit unsigned value.
#[must_use]
pub fn to_signed(w: u32, v: u64) -> i64 {
    let v = wrap(w, v);
    if w == 64 {
        return v as i64;
    }
    let sign_bit = 1u64 << (w - 1);
    if v & sign_bit != 0 {
        (v as i64) - (1i64 << w)
    } else {
        v as i64
    }
}

/// Reduce a signed ring value back into its `w`-bit unsigned representation.
/// `v` must fit in `[-2^(w-1), 2^w)`; callers that compute a value via wider
/// (e.g. `i128`) arithmetic should check range/overflow themselves first.
#[must_use]
pub fn from_signed_wide(w: u32, v: i128) -> u64 {
    let modulus = 1i128 << w;
    let mut v = v % modulus;
    if v < 0 {
        v += modulus;
    }
    wrap(w, v as u64)
}

/// Arithmetic negation modulo `2^w` (`0 - v`).
#[must_use]
pub fn wrapping_negate(w: u32, v: u64) -> u64 {
    wrap(w, v.wrapping_neg())
}

/// Bitwise complement restricted to the low `w` bits.
#[must_use]
pub fn complement(w: u32, v: u64) -> u64 {
    mask(w) ^ wrap(w, v)
}

/// `gcd(0, x) == x`, matching the convention the strided-interval arithmetic
/// relies on for singleton operands.
#[must_use]
pub fn gcd(a: u64, b: u64) -> u64 {
    a.gcd(&b)
}

#[must_use]
pub fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        0
    } else {
        a.lcm(&b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_and_wrap() {
        assert_eq!(mask(8), 0xff);
        assert_eq!(mask(32), 0xffff_ffff);
        assert_eq!(mask(64), u64::MAX);
        assert_eq!(wrap(8, 0x1_23), 0x23);
    }

    #[test]
    fn signed_roundtrip() {
        assert_eq!(to_signed(8, 0xff), -1);
        assert_eq!(to_signed(8, 0x7f), 127);
        assert_eq!(to_signed(32, 0x8000_0000), i32::MIN as i64);
        assert_eq!(from_signed_wide(8, -1), 0xff);
        assert_eq!(from_signed_wide(32, -11), 0xffff_fff5);
    }

    #[test]
    fn complement_matches_not() {
        assert_eq!(complement(32, 10), 0xffff_fff5);
    }

    #[test]
    fn gcd_zero_identity() {
        assert_eq!(gcd(0, 7), 7);
        assert_eq!(gcd(0, 0), 0);
        assert_eq!(gcd(6, 9), 3);
    }
}
