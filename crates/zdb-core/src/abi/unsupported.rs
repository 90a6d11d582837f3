//! Fallback adapter for targets without a verified calling convention.
//!
//! Porting to a new architecture means writing a sibling of `aarch64.rs` after
//! checking that target's rules for trivially-copyable aggregates and
//! non-trivial by-value class parameters.

use std::ffi::{c_void, CStr};

use super::{CallAdapter, MatchKind, SharedPtrLayout};
use crate::error::{ZdbError, ZdbResult};
use crate::types::Address;

/// Adapter that refuses every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedAdapter;

const ARCH: &str = std::env::consts::ARCH;

impl CallAdapter for UnsupportedAdapter
{
    const ABI: &'static str = "unsupported";

    unsafe fn get_category(
        &self,
        _func: Address,
        _name: &'static CStr,
        _out: &mut SharedPtrLayout,
        _can_create: bool,
    ) -> ZdbResult<()>
    {
        Err(ZdbError::UnsupportedArchitecture(ARCH))
    }

    unsafe fn enable_category(&self, _func: Address, _category: &SharedPtrLayout, _position: u32) -> ZdbResult<()>
    {
        Err(ZdbError::UnsupportedArchitecture(ARCH))
    }

    unsafe fn add_type_summary(
        &self,
        _func: Address,
        _category: *mut c_void,
        _pattern: &str,
        _kind: MatchKind,
        _summary: &mut SharedPtrLayout,
    ) -> ZdbResult<()>
    {
        Err(ZdbError::UnsupportedArchitecture(ARCH))
    }
}
