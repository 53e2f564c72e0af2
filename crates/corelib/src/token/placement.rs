//! 31-bit placement token.

use siphasher::sip::SipHasher13;
use std::fmt;
use std::hash::Hasher;

/// Mask keeping the low 31 bits, so every placement is a non-negative `i32`.
const PLACEMENT_MASK: u32 = 0x7fff_ffff;

/// A position on the ring, in `0..=i32::MAX`.
///
/// Both nodes (hashed from the big-endian bytes of their id) and keys
/// (hashed from their marshalled bytes) map into this space. Only explicit
/// bytes are hashed, never a `std::hash::Hash` impl, and the hasher is keyed
/// with zeros, so every process derives the same placement for the same
/// bytes regardless of target or toolchain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Placement(u32);

impl Placement {
    /// Minimum placement value (start of ring).
    pub const MIN: Placement = Placement(0);
    /// Maximum placement value (end of ring).
    pub const MAX: Placement = Placement(PLACEMENT_MASK);

    /// Hashes a byte string onto the ring.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = SipHasher13::new();
        hasher.write(bytes);
        Self::from_hash(hasher.finish())
    }

    /// Folds a 64-bit hash into the 31-bit token space.
    pub fn from_hash(hash: u64) -> Self {
        let folded = (hash ^ (hash >> 32)) as u32;
        Placement(folded & PLACEMENT_MASK)
    }

    /// Builds a placement from a raw value, dropping the sign bit.
    pub fn from_raw(raw: u32) -> Self {
        Placement(raw & PLACEMENT_MASK)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// True if `self` lies in the half-open arc `(start, end]`.
    ///
    /// When `end < start` the arc wraps past the top of the ring and covers
    /// `(start, MAX] ∪ [MIN, end]`. When `start == end` the arc is the whole
    /// ring.
    pub fn in_arc(&self, start: Placement, end: Placement) -> bool {
        if start < end {
            *self > start && *self <= end
        } else {
            *self > start || *self <= end
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_is_deterministic() {
        assert_eq!(Placement::of_bytes(b"key1"), Placement::of_bytes(b"key1"));
        assert_ne!(Placement::of_bytes(b"key1"), Placement::of_bytes(b"key2"));
    }

    #[test]
    fn test_placement_is_pinned_to_the_bytes() {
        // SipHash-1-3 with zero keys over the empty input.
        let mut hasher = SipHasher13::new_with_keys(0, 0);
        hasher.write(&[]);
        assert_eq!(Placement::of_bytes(&[]), Placement::from_hash(hasher.finish()));

        let id = 0x0123_4567_89ab_cdef_0011_2233_4455_6677u128;
        assert_eq!(
            Placement::of_bytes(&id.to_be_bytes()),
            Placement::of_bytes(&[
                0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55,
                0x66, 0x77,
            ])
        );
    }

    #[test]
    fn test_placement_fits_31_bits() {
        for i in 0..1000u32 {
            let p = Placement::of_bytes(format!("key-{}", i).as_bytes());
            assert!(p <= Placement::MAX);
        }
        assert_eq!(Placement::from_raw(u32::MAX), Placement::MAX);
    }

    #[test]
    fn test_in_arc_plain() {
        let p = Placement::from_raw(150);
        assert!(p.in_arc(Placement::from_raw(100), Placement::from_raw(200)));
        assert!(Placement::from_raw(200).in_arc(Placement::from_raw(100), Placement::from_raw(200)));
        assert!(!Placement::from_raw(100).in_arc(Placement::from_raw(100), Placement::from_raw(200)));
        assert!(!Placement::from_raw(201).in_arc(Placement::from_raw(100), Placement::from_raw(200)));
    }

    #[test]
    fn test_in_arc_wraps() {
        let start = Placement::from_raw(900);
        let end = Placement::from_raw(100);
        assert!(Placement::from_raw(950).in_arc(start, end));
        assert!(Placement::from_raw(50).in_arc(start, end));
        assert!(Placement::from_raw(100).in_arc(start, end));
        assert!(!Placement::from_raw(500).in_arc(start, end));
        assert!(!Placement::from_raw(900).in_arc(start, end));
    }
}
