//! Range <-> prefix conversions.

use super::Address;
use crate::error::RangeError;

/// Whether `[start, end]` is exactly one CIDR block.
///
/// `start ^ end` must be a contiguous run of low one-bits and `start` must
/// have none of those bits set.
pub fn is_cidr_range<A: Address>(start: A, end: A) -> bool {
    if start > end {
        return false;
    }
    let mask = start ^ end;
    (mask & mask.wrapping_add(A::ONE)) == A::ZERO && (start & mask) == A::ZERO
}

/// Prefix length of a CIDR-aligned range.
///
/// The result is the number of leading zero bits of `start ^ end` counted in
/// numeric order. Passing a range that is not a single CIDR block is a caller
/// bug; use [`checked_range_to_prefix`] for untrusted input.
pub fn range_to_prefix<A: Address>(start: A, end: A) -> u8 {
    debug_assert!(
        is_cidr_range(start, end),
        "range {:?}-{:?} is not CIDR aligned",
        start,
        end
    );
    (start ^ end).leading_zeros() as u8
}

/// [`range_to_prefix`] with alignment validation.
pub fn checked_range_to_prefix<A: Address>(start: A, end: A) -> Result<u8, RangeError> {
    if start > end {
        return Err(RangeError::Inverted {
            start: start.to_ip().to_string(),
            end: end.to_ip().to_string(),
        });
    }
    if !is_cidr_range(start, end) {
        return Err(RangeError::NotCidrAligned {
            start: start.to_ip().to_string(),
            end: end.to_ip().to_string(),
        });
    }
    Ok(range_to_prefix(start, end))
}

/// Last address of the block starting at `start` with `prefix_len`.
///
/// Host bits are set to one, network bits are left as they are.
pub fn prefix_to_range_end<A: Address>(start: A, prefix_len: u8) -> A {
    debug_assert!(prefix_len <= A::BITS, "prefix /{} too long", prefix_len);
    start | A::host_mask(prefix_len)
}

/// [`prefix_to_range_end`] with prefix length validation.
pub fn checked_prefix_to_range_end<A: Address>(start: A, prefix_len: u8) -> Result<A, RangeError> {
    if prefix_len > A::BITS {
        return Err(RangeError::InvalidPrefixLength {
            prefix_len,
            bits: A::BITS,
        });
    }
    Ok(prefix_to_range_end(start, prefix_len))
}

/// `addr` with its host bits below `prefix_len` cleared.
pub fn network<A: Address>(addr: A, prefix_len: u8) -> A {
    addr & !A::host_mask(prefix_len)
}
