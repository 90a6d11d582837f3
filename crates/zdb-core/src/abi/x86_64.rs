//! # x86-64 call adapter
//!
//! System V AMD64 psABI with the Itanium C++ ABI (Linux, macOS on Intel).
//! Windows uses the Microsoft ABI, which passes and destroys by-value class
//! arguments differently, and gets no adapter.
//!
//! ## Register assignment
//!
//! | function | rdi | rsi | rdx | ecx | r8 |
//! |----------|-----|-----|-----|-----|----|
//! | `GetCategory` | `ConstString` (its `const char*`) | `&TypeCategoryImplSP` | `can_create` | | |
//! | `Enable` | `&TypeCategoryImplSP` | `position` | | | |
//! | `AddTypeSummary` | `this` | `StringRef.data` | `StringRef.size` | match type | `&TypeSummaryImplSP` (indirect) |
//!
//! A 16-byte trivially-copyable `StringRef` classifies as INTEGER, INTEGER and
//! occupies two registers, the same as two scalar arguments. The Itanium rule
//! for non-trivial parameters overrides classification for `shared_ptr`: it is
//! passed as a pointer to a caller-owned temporary, not in memory on the stack
//! and not in two registers.

use std::ffi::{c_void, CStr};
use std::mem::size_of;

use libc::{c_char, c_int, size_t};

use super::{CallAdapter, MatchKind, SharedPtrLayout};
use crate::error::ZdbResult;
use crate::types::Address;

const _: () = assert!(size_of::<SharedPtrLayout>() == 16);

type GetCategoryFn = unsafe extern "sysv64" fn(name: *const c_char, out: *mut SharedPtrLayout, can_create: bool);
type EnableFn = unsafe extern "sysv64" fn(category: *const SharedPtrLayout, position: u32);
type AddTypeSummaryFn = unsafe extern "sysv64" fn(
    this: *mut c_void,
    name_data: *const c_char,
    name_len: size_t,
    match_type: c_int,
    summary: *mut SharedPtrLayout,
);

/// Adapter for System V x86-64 targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysVAdapter;

impl CallAdapter for SysVAdapter
{
    const ABI: &'static str = "sysv64/itanium";

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
