//! Minimal CIDR cover of a single range.

use crate::addr::{AddrRange, Address, CidrBlock};

/// Iterator over the fewest CIDR blocks that exactly cover one range.
///
/// Each step takes the largest block that is both aligned at the cursor and
/// no longer than what remains of the range.
#[derive(Debug, Clone)]
pub struct CidrBlocks<A> {
    cursor: A,
    end: A,
    done: bool,
}

impl<A: Address> CidrBlocks<A> {
    pub fn new(range: AddrRange<A>) -> Self {
        debug_assert!(range.start <= range.end, "inverted range {:?}", range);
        Self {
            cursor: range.start,
            end: range.end,
            done: range.start > range.end,
        }
    }
}

impl<A: Address> Iterator for CidrBlocks<A> {
    type Item = CidrBlock<A>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // length of [0, MAX] does not fit in A
        if self.cursor == A::ZERO && self.end == A::MAX {
            self.done = true;
            return Some(CidrBlock {
                addr: A::ZERO,
                prefix_len: 0,
            });
        }

        let bits = u32::from(A::BITS);
        let alignment_exp = if self.cursor == A::ZERO {
            bits
        } else {
            self.cursor.trailing_zeros()
        };
        let length = AddrRange {
            start: self.cursor,
            end: self.end,
        }
        .span()
        .wrapping_add(A::ONE);
        let span_exp = bits - 1 - length.leading_zeros();
        let exp = alignment_exp.min(span_exp);

        let block = CidrBlock {
            addr: self.cursor,
            prefix_len: (bits - exp) as u8,
        };
        let block_end = self.cursor | A::low_mask(exp);
        if block_end >= self.end {
            self.done = true;
        } else {
            self.cursor = block_end.wrapping_add(A::ONE);
        }
        Some(block)
    }
}

/// Decompose `range` into its minimal CIDR cover.
pub fn decompose<A: Address>(range: AddrRange<A>) -> CidrBlocks<A> {
    CidrBlocks::new(range)
}
