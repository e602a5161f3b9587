//! Address families and CIDR arithmetic.
//!
//! IPv4 addresses are handled as host-order `u32` and IPv6 addresses as
//! `u128`, both in plain numeric order. The address type *is* the family:
//! code that must work for both is generic over [`Address`]. Byte-order
//! concerns only appear where values cross into storage.

mod cidr;

pub use cidr::{
    checked_prefix_to_range_end, checked_range_to_prefix, is_cidr_range, network,
    prefix_to_range_end, range_to_prefix,
};

use std::fmt;
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::{BitAnd, BitOr, BitXor, Not, Shr};

use ipnet::IpNet;

use crate::error::RangeError;

/// A fixed-width unsigned address of one IP family.
pub trait Address:
    Copy
    + Ord
    + Eq
    + Hash
    + fmt::Debug
    + Send
    + Sync
    + 'static
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
    + Shr<u32, Output = Self>
{
    /// Width of the address in bits.
    const BITS: u8;
    const ZERO: Self;
    const ONE: Self;
    const MAX: Self;
    const FAMILY: Family;

    fn leading_zeros(self) -> u32;
    fn trailing_zeros(self) -> u32;
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;

    fn to_ip(self) -> IpAddr;
    fn from_ip(ip: IpAddr) -> Option<Self>;

    /// Value with the lowest `bits` bits set.
    fn low_mask(bits: u32) -> Self {
        if bits == 0 {
            Self::ZERO
        } else {
            Self::MAX >> (u32::from(Self::BITS) - bits.min(u32::from(Self::BITS)))
        }
    }

    /// Mask of the host bits below `prefix_len`.
    fn host_mask(prefix_len: u8) -> Self {
        Self::low_mask(u32::from(Self::BITS.saturating_sub(prefix_len)))
    }

    /// `self + 1`, or `None` at the top of the address space.
    fn checked_next(self) -> Option<Self> {
        if self == Self::MAX {
            None
        } else {
            Some(self.wrapping_add(Self::ONE))
        }
    }
}

macro_rules! impl_address {
    ($ty:ty, $family:expr, $ip:ident, $variant:ident) => {
        impl Address for $ty {
            const BITS: u8 = <$ty>::BITS as u8;
            const ZERO: Self = 0;
            const ONE: Self = 1;
            const MAX: Self = <$ty>::MAX;
            const FAMILY: Family = $family;

            fn leading_zeros(self) -> u32 {
                <$ty>::leading_zeros(self)
            }

            fn trailing_zeros(self) -> u32 {
                <$ty>::trailing_zeros(self)
            }

            fn wrapping_add(self, rhs: Self) -> Self {
                <$ty>::wrapping_add(self, rhs)
            }

            fn wrapping_sub(self, rhs: Self) -> Self {
                <$ty>::wrapping_sub(self, rhs)
            }

            fn to_ip(self) -> IpAddr {
                IpAddr::$variant($ip::from(self))
            }

            fn from_ip(ip: IpAddr) -> Option<Self> {
                match ip {
                    IpAddr::$variant(addr) => Some(<$ty>::from(addr)),
                    _ => None,
                }
            }
        }
    };
}

impl_address!(u32, Family::V4, Ipv4Addr, V4);
impl_address!(u128, Family::V6, Ipv6Addr, V6);

/// Runtime selector for one of the two address families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn of(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::V4 => "v4",
            Family::V6 => "v6",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive address range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddrRange<A> {
    pub start: A,
    pub end: A,
}

impl<A: Address> AddrRange<A> {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: A, end: A) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted {
                start: start.to_ip().to_string(),
                end: end.to_ip().to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// The whole address space of the family.
    pub fn full() -> Self {
        Self {
            start: A::ZERO,
            end: A::MAX,
        }
    }

    pub fn contains(&self, addr: A) -> bool {
        self.start <= addr && addr <= self.end
    }

    /// Number of addresses minus one; never overflows.
    pub fn span(&self) -> A {
        self.end.wrapping_sub(self.start)
    }

    /// The block this range describes, if it is CIDR aligned.
    pub fn to_cidr(&self) -> Result<CidrBlock<A>, RangeError> {
        let prefix_len = checked_range_to_prefix(self.start, self.end)?;
        Ok(CidrBlock {
            addr: self.start,
            prefix_len,
        })
    }
}

impl<A: Address> fmt::Display for AddrRange<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.to_ip(), self.end.to_ip())
    }
}

/// A CIDR block: base address plus prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CidrBlock<A> {
    pub addr: A,
    pub prefix_len: u8,
}

impl<A: Address> CidrBlock<A> {
    /// Create a block, rejecting over-long prefixes and set host bits.
    pub fn new(addr: A, prefix_len: u8) -> Result<Self, RangeError> {
        let end = checked_prefix_to_range_end(addr, prefix_len)?;
        if network(addr, prefix_len) != addr {
            return Err(RangeError::NotCidrAligned {
                start: addr.to_ip().to_string(),
                end: end.to_ip().to_string(),
            });
        }
        Ok(Self { addr, prefix_len })
    }

    /// Last address covered by the block.
    pub fn end(&self) -> A {
        prefix_to_range_end(self.addr, self.prefix_len)
    }

    pub fn range(&self) -> AddrRange<A> {
        AddrRange {
            start: self.addr,
            end: self.end(),
        }
    }

    pub fn contains(&self, addr: A) -> bool {
        network(addr, self.prefix_len) == self.addr
    }

    pub fn to_ipnet(&self) -> Result<IpNet, RangeError> {
        IpNet::new(self.addr.to_ip(), self.prefix_len).map_err(|_| {
            RangeError::InvalidPrefixLength {
                prefix_len: self.prefix_len,
                bits: A::BITS,
            }
        })
    }

    /// Convert from an `ipnet` network of the same family.
    ///
    /// Host bits are cleared, so `10.0.0.1/24` yields `10.0.0.0/24`.
    pub fn from_ipnet(net: IpNet) -> Option<Self> {
        let addr = A::from_ip(net.network())?;
        Some(Self {
            addr,
            prefix_len: net.prefix_len(),
        })
    }
}

impl<A: Address> fmt::Display for CidrBlock<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr.to_ip(), self.prefix_len)
    }
}

/// Parse `a.b.c.d/len` or `x::/len` into a block of family `A`.
pub fn parse_cidr<A: Address>(s: &str) -> crate::Result<CidrBlock<A>> {
    let net: IpNet = s
        .trim()
        .parse()
        .map_err(|_| crate::Error::InvalidCidrPattern(s.to_string()))?;
    CidrBlock::from_ipnet(net).ok_or_else(|| crate::Error::InvalidCidrPattern(s.to_string()))
}
