//! Debuggee address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed address inside the debuggee's virtual address space
///
/// Addresses are stored as `u64` regardless of the debuggee's pointer width so
/// that 32-bit and 64-bit targets share one representation. Using a newtype
/// keeps addresses from being mixed up with sizes, hashes or offsets, all of
/// which are plain `u64` values in this crate.
///
/// ## Example
///
/// ```rust
/// use procmeta_core::types::Address;
///
/// let base = Address::from(0x1000);
/// let entry = base + 0x240;
/// assert_eq!(entry.offset_from(base), Some(0x240));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address, used as the "not found" sentinel at the export boundary.
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value (usable in const contexts).
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Raw numeric value of this address.
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Whether this is the null address.
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Add an offset, returning `None` on overflow.
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset, returning `None` on underflow.
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Distance in bytes from `base` up to this address.
    ///
    /// Returns `None` when this address lies below `base`.
    ///
    /// ```rust
    /// use procmeta_core::types::Address;
    ///
    /// assert_eq!(Address::from(0x1010).offset_from(Address::from(0x1000)), Some(0x10));
    /// assert_eq!(Address::from(0x0ff0).offset_from(Address::from(0x1000)), None);
    /// ```
    pub fn offset_from(self, base: Address) -> Option<u64>
    {
        self.0.checked_sub(base.0)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
