//! # AArch64 call adapter
//!
//! AAPCS64 with the Itanium C++ ABI, as used by Apple Silicon and Linux/arm64
//! builds of LLDB.
//!
//! ## Register assignment
//!
//! | function | x0 | x1 | x2 | w3 | x4 |
//! |----------|----|----|----|----|----|
//! | `GetCategory` | `ConstString` (its `const char*`) | `&TypeCategoryImplSP` | `can_create` | | |
//! | `Enable` | `&TypeCategoryImplSP` | `position` | | | |
//! | `AddTypeSummary` | `this` | `StringRef.data` | `StringRef.size` | match type | `&TypeSummaryImplSP` (indirect) |
//!
//! `ConstString` is a single trivially-copyable pointer and travels in a
//! register. `StringRef` is a 16-byte trivially-copyable aggregate; AAPCS64
//! would pass it in two consecutive registers, which is the same as two scalars.
//! `shared_ptr` is 16 bytes too but non-trivial for the purpose of calls, so it
//! is passed as a pointer to caller memory in the next general register (not in
//! x8, which is reserved for indirect *results*).

use std::ffi::{c_void, CStr};
use std::mem::size_of;

use libc::{c_char, c_int, size_t};

use super::{CallAdapter, MatchKind, SharedPtrLayout};
use crate::error::ZdbResult;
use crate::types::Address;

const _: () = assert!(size_of::<SharedPtrLayout>() == 16);

type GetCategoryFn = unsafe extern "C" fn(name: *const c_char, out: *mut SharedPtrLayout, can_create: bool);
type EnableFn = unsafe extern "C" fn(category: *const SharedPtrLayout, position: u32);
type AddTypeSummaryFn = unsafe extern "C" fn(
    this: *mut c_void,
    name_data: *const c_char,
    name_len: size_t,
    match_type: c_int,
    summary: *mut SharedPtrLayout,
);

/// Adapter for AAPCS64 targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aarch64Adapter;

impl CallAdapter for Aarch64Adapter
{
    const ABI: &'static str = "aapcs64/itanium";

    unsafe fn get_category(
        &self,
        func: Address,
        name: &'static CStr,
        out: &mut SharedPtrLayout,
        can_create: bool,
    ) -> ZdbResult<()>
    {
        let f: GetCategoryFn = std::mem::transmute::<usize, GetCategoryFn>(func.value() as usize);
        f(name.as_ptr(), out, can_create);
        Ok(())
    }

    unsafe fn enable_category(&self, func: Address, category: &SharedPtrLayout, position: u32) -> ZdbResult<()>
    {
        let f: EnableFn = std::mem::transmute::<usize, EnableFn>(func.value() as usize);
        f(category, position);
        Ok(())
    }

    unsafe fn add_type_summary(
        &self,
        func: Address,
        category: *mut c_void,
        pattern: &str,
        kind: MatchKind,
        summary: &mut SharedPtrLayout,
    ) -> ZdbResult<()>
    {
        let f: AddTypeSummaryFn = std::mem::transmute::<usize, AddTypeSummaryFn>(func.value() as usize);
        f(category, pattern.as_ptr().cast(), pattern.len(), kind.raw(), summary);
        Ok(())
    }
}
