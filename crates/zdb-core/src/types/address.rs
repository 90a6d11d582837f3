//! Runtime address type.

use std::fmt;
use std::ops::Add;

/// Strongly typed address inside the host debugger's own address space
///
/// Every resolved internal function is an `Address` before it is turned into a
/// callable function pointer. Keeping it a newtype stops offsets (which are also
/// `u64`) from being mixed up with absolute addresses.
///
/// ## Example
///
/// ```rust
/// use zdb_core::types::Address;
///
/// let base = Address::from(0x1_0000_0000);
/// let func = base + 0x5123a0;
/// assert_eq!(func.value(), 0x1_0051_23a0);
/// assert_eq!(func.offset_from(base), Some(0x5123a0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Whether this is the null address
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Address of a symbol returned by the dynamic loader.
    pub fn from_ptr<T>(ptr: *const T) -> Self
    {
        Address(ptr as usize as u64)
    }

    /// Reinterpret the address as an untyped pointer in this process.
    ///
    /// Only meaningful for addresses that were resolved inside the current
    /// process; the pointer is not checked.
    pub fn as_ptr(self) -> *const std::ffi::c_void
    {
        self.0 as usize as *const std::ffi::c_void
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ```rust
    /// use zdb_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset from this address, checking for underflow
    ///
    /// ```rust
    /// use zdb_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_sub(0x100), Some(Address::from(0xf00)));
    /// assert_eq!(addr.checked_sub(0x2000), None);
    /// ```
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Distance from `base` to this address, if this address is not below it.
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

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}
