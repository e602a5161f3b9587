//! Range coalescing and CIDR decomposition.
//!
//! Together these turn a start-ordered stream of possibly overlapping ranges
//! into the minimal list of disjoint CIDR blocks with the same coverage.

mod coalesce;
mod cover;
mod decompose;

pub use coalesce::{coalesce, Coalesce, Coalescer};
pub use cover::{CoverCounts, CoverWriter};
pub use decompose::{decompose, CidrBlocks};

use crate::addr::{AddrRange, Address, CidrBlock};

/// Minimal CIDR cover of a start-ordered sequence of ranges.
pub fn minimal_cover<I, A>(ranges: I) -> impl Iterator<Item = CidrBlock<A>>
where
    I: IntoIterator<Item = AddrRange<A>>,
    A: Address,
{
    coalesce(ranges).flat_map(decompose)
}
