//! # Host Shim Interface
//!
//! C-compatible callback tables through which the LLDB-side shim exposes
//! `SBDebugger`, `SBFrame` and `SBValue`, plus the safe adapters that implement
//! the `zdb_core::host` traits on top of them.
//!
//! The shim (`shim/zdb_shim.cpp`, declarations in `shim/zdb_shim.h`) is a thin
//! C++ file compiled against LLDB's public headers. It owns every `SB*` object;
//! Rust only ever sees opaque handles.
//!
//! ## Ownership
//!
//! - Handles passed *into* Rust (a value being summarised, the current frame)
//!   are borrowed for the duration of the call.
//! - Handles returned *from* a table function (children, variables, results)
//!   are owned by Rust and handed back through `release`.
//! - Strings returned by table functions are NUL-terminated, owned by the
//!   shim, and only read until the next call on the same handle.
//! - The tables themselves must live for the rest of the process.

use std::ffi::{c_void, CStr, CString};
use std::fmt;
use std::path::PathBuf;
use std::ptr::NonNull;
use std::time::Duration;

use libc::c_char;
use zdb_core::host::{CommandHandler, HostDebugger, HostFrame, HostValue, SummaryWrapper};
use zdb_core::registrar::FormatterSpec;

/// Summary trampolines the shim instantiates; `ZDB_MAX_FORMATTERS` in the header.
pub const MAX_FORMATTERS: usize = 64;

/// Byte sink: an `SBStream` on the shim side, a `String` on ours.
#[repr(C)]
pub struct ZdbWriter
{
    pub ctx: *mut c_void,
    pub write: unsafe extern "C" fn(ctx: *mut c_void, data: *const c_char, len: usize),
}

/// `SBValue` operations.
#[repr(C)]
pub struct ZdbValueVTable
{
    pub name: unsafe extern "C" fn(value: *mut c_void) -> *const c_char,
    pub type_name: unsafe extern "C" fn(value: *mut c_void) -> *const c_char,
    pub value: unsafe extern "C" fn(value: *mut c_void) -> *const c_char,
    pub summary: unsafe extern "C" fn(value: *mut c_void) -> *const c_char,
    /// Writes the value to `out`; `false` when it is not an integer
    pub value_as_unsigned: unsafe extern "C" fn(value: *mut c_void, out: *mut u64) -> bool,
    pub num_children: unsafe extern "C" fn(value: *mut c_void) -> u32,
    /// Owned child, or null
    pub child_at_index: unsafe extern "C" fn(value: *mut c_void, index: u32) -> *mut c_void,
    /// Owned child, or null
    pub child_member_with_name: unsafe extern "C" fn(value: *mut c_void, name: *const c_char) -> *mut c_void,
    /// Owned pointee, or null
    pub dereference: unsafe extern "C" fn(value: *mut c_void) -> *mut c_void,
    /// Reads process memory; returns the number of bytes read
    pub read_memory: unsafe extern "C" fn(value: *mut c_void, address: u64, buf: *mut u8, len: usize) -> usize,
    /// Frees an owned handle
    pub release: unsafe extern "C" fn(value: *mut c_void),
}

/// `SBFrame` operations.
#[repr(C)]
pub struct ZdbFrameVTable
{
    /// Owned value, or null
    pub find_variable: unsafe extern "C" fn(frame: *mut c_void, name: *const c_char) -> *mut c_void,
    /// Owned result, or null with the evaluator's message written to `error`
    pub evaluate: unsafe extern "C" fn(
        frame: *mut c_void,
        expression: *const c_char,
        timeout_us: u64,
        error: *const ZdbWriter,
    ) -> *mut c_void,
}

/// `SBDebugger` operations, passed to `zdb_plugin_initialize`.
#[repr(C)]
pub struct ZdbHostVTable
{
    pub ctx: *mut c_void,
    /// `SBDebugger::GetVersionString()`
    pub version_banner: unsafe extern "C" fn(ctx: *mut c_void) -> *const c_char,
    /// Create an `SBTypeSummary` whose callback calls `zdb_summary_dispatch(index, ..)`.
    /// The object is never freed. Null when creation failed.
    pub create_summary: unsafe extern "C" fn(ctx: *mut c_void, index: u32, description: *const c_char) -> *mut c_void,
    /// Install a command that calls `zdb_command_dispatch(name, ..)`
    pub register_command: unsafe extern "C" fn(ctx: *mut c_void, name: *const c_char, help: *const c_char) -> bool,
    /// Directory the plugin was loaded from; may be null
    pub plugin_dir: *const c_char,
    pub value: *const ZdbValueVTable,
    pub frame: *const ZdbFrameVTable,
}

/// Copy a shim-owned string.
///
/// # Safety
///
/// `ptr` is null or a valid NUL-terminated string.
pub unsafe fn owned_string(ptr: *const c_char) -> Option<String>
{
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// `ZdbWriter` adapter for `fmt::Write`.
pub struct StreamWriter<'a>(&'a ZdbWriter);

impl<'a> StreamWriter<'a>
{
    pub fn new(writer: &'a ZdbWriter) -> Self
    {
        Self(writer)
    }
}

impl fmt::Write for StreamWriter<'_>
{
    fn write_str(&mut self, s: &str) -> fmt::Result
    {
        // SAFETY: the shim keeps the stream alive for the callback's duration.
        unsafe { (self.0.write)(self.0.ctx, s.as_ptr().cast(), s.len()) };
        Ok(())
    }
}

/// `ZdbWriter` that appends to a `String`.
pub fn string_writer(target: &mut String) -> ZdbWriter
{
    unsafe extern "C" fn append(ctx: *mut c_void, data: *const c_char, len: usize)
    {
        if data.is_null() {
            return;
        }
        // SAFETY: `ctx` is the `String` passed to `string_writer`, `data` has `len` bytes.
        let (target, bytes) = unsafe { (&mut *ctx.cast::<String>(), std::slice::from_raw_parts(data.cast::<u8>(), len)) };
        target.push_str(&String::from_utf8_lossy(bytes));
    }

    ZdbWriter {
        ctx: (target as *mut String).cast(),
        write: append,
    }
}

/// An `SBValue` handle.
pub struct FfiValue
{
    table: &'static ZdbValueVTable,
    handle: NonNull<c_void>,
    owned: bool,
}

impl FfiValue
{
    /// Wrap a handle lent by the shim.
    ///
    /// # Safety
    ///
    /// `handle` is a live `SBValue` for at least as long as the wrapper.
    pub unsafe fn borrowed(table: &'static ZdbValueVTable, handle: NonNull<c_void>) -> Self
    {
        Self {
            table,
            handle,
            owned: false,
        }
    }

    fn owned(table: &'static ZdbValueVTable, handle: *mut c_void) -> Option<Self>
    {
        NonNull::new(handle).map(|handle| Self {
            table,
            handle,
            owned: true,
        })
    }

    fn string(&self, getter: unsafe extern "C" fn(*mut c_void) -> *const c_char) -> Option<String>
    {
        // SAFETY: the handle is live; the string is copied before any other call.
        unsafe { owned_string(getter(self.handle.as_ptr())) }
    }

    fn child(&self, handle: *mut c_void) -> Option<Box<dyn HostValue + '_>>
    {
        Self::owned(self.table, handle).map(|child| Box::new(child) as Box<dyn HostValue>)
    }
}

impl Drop for FfiValue
{
    fn drop(&mut self)
    {
        if self.owned {
            // SAFETY: owned handles come from this table and are released once.
            unsafe { (self.table.release)(self.handle.as_ptr()) };
        }
    }
}

impl HostValue for FfiValue
{
    fn name(&self) -> Option<String>
    {
        self.string(self.table.name)
    }

    fn type_name(&self) -> Option<String>
    {
        self.string(self.table.type_name)
    }

    fn value(&self) -> Option<String>
    {
        self.string(self.table.value)
    }

    fn summary(&self) -> Option<String>
    {
        self.string(self.table.summary)
    }

    fn value_as_unsigned(&self) -> Option<u64>
    {
        let mut out = 0u64;
        // SAFETY: live handle, `out` is a valid u64.
        let ok = unsafe { (self.table.value_as_unsigned)(self.handle.as_ptr(), &mut out) };
        ok.then_some(out)
    }

    fn num_children(&self) -> usize
    {
        // SAFETY: live handle.
        unsafe { (self.table.num_children)(self.handle.as_ptr()) as usize }
    }

    fn child_at_index(&self, index: usize) -> Option<Box<dyn HostValue + '_>>
    {
        let index = u32::try_from(index).ok()?;
        // SAFETY: live handle.
        self.child(unsafe { (self.table.child_at_index)(self.handle.as_ptr(), index) })
    }

    fn child_member_with_name(&self, name: &str) -> Option<Box<dyn HostValue + '_>>
    {
        let name = CString::new(name).ok()?;
        // SAFETY: live handle, NUL-terminated name.
        self.child(unsafe { (self.table.child_member_with_name)(self.handle.as_ptr(), name.as_ptr()) })
    }

    fn dereference(&self) -> Option<Box<dyn HostValue + '_>>
    {
        // SAFETY: live handle.
        self.child(unsafe { (self.table.dereference)(self.handle.as_ptr()) })
    }

    fn read_memory(&self, address: u64, len: usize) -> Option<Vec<u8>>
    {
        let mut buf = vec![0u8; len];
        // SAFETY: `buf` has room for `len` bytes.
        let read = unsafe { (self.table.read_memory)(self.handle.as_ptr(), address, buf.as_mut_ptr(), len) };
        (read == len).then_some(buf)
    }

    fn read_c_string(&self, address: u64, max_len: usize) -> Option<Vec<u8>>
    {
        let mut buf = vec![0u8; max_len];
        // SAFETY: `buf` has room for `max_len` bytes.
        let read = unsafe { (self.table.read_memory)(self.handle.as_ptr(), address, buf.as_mut_ptr(), max_len) };
        if read == 0 {
            return None;
        }
        buf.truncate(read);
        if let Some(nul) = buf.iter().position(|&byte| byte == 0) {
            buf.truncate(nul);
        }
        Some(buf)
    }
}

/// An `SBFrame` handle lent for one command.
pub struct FfiFrame
{
    table: &'static ZdbFrameVTable,
    values: &'static ZdbValueVTable,
    handle: NonNull<c_void>,
}

impl FfiFrame
{
    /// # Safety
    ///
    /// `handle` is a live `SBFrame` for at least as long as the wrapper.
    pub unsafe fn borrowed(
        table: &'static ZdbFrameVTable,
        values: &'static ZdbValueVTable,
        handle: NonNull<c_void>,
    ) -> Self
    {
        Self { table, values, handle }
    }
}

impl HostFrame for FfiFrame
{
    fn find_variable(&self, name: &str) -> Option<Box<dyn HostValue + '_>>
    {
        let name = CString::new(name).ok()?;
        // SAFETY: live handle, NUL-terminated name.
        let value = unsafe { (self.table.find_variable)(self.handle.as_ptr(), name.as_ptr()) };
        FfiValue::owned(self.values, value).map(|value| Box::new(value) as Box<dyn HostValue>)
    }

    fn evaluate(&self, expression: &str, timeout: Duration) -> Result<Box<dyn HostValue + '_>, String>
    {
        let c_expression = CString::new(expression).map_err(|e| e.to_string())?;
        let timeout_us = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
        let mut message = String::new();
        let error = string_writer(&mut message);

        // SAFETY: live handle; `error` outlives the call.
        let result = unsafe { (self.table.evaluate)(self.handle.as_ptr(), c_expression.as_ptr(), timeout_us, &error) };
        match FfiValue::owned(self.values, result) {
            Some(value) => Ok(Box::new(value)),
            None if message.is_empty() => Err(format!("error: could not evaluate '{expression}'")),
            None => Err(message),
        }
    }
}

/// An `SBTypeSummary` allocated by the shim.
struct ShimSummary(NonNull<c_void>);

// SAFETY: the summary object is immutable after creation and only touched on
// the host's command thread.
unsafe impl Send for ShimSummary {}
// SAFETY: see `Send`.
unsafe impl Sync for ShimSummary {}

impl SummaryWrapper for ShimSummary
{
    fn wrapper_ptr(&self) -> NonNull<c_void>
    {
        self.0
    }
}

/// Receives command handlers as the plugin registers them.
pub type CommandSink = fn(name: &str, handler: Box<dyn CommandHandler>);

/// The debugger the plugin was loaded into.
pub struct FfiHost
{
    table: &'static ZdbHostVTable,
    commands: CommandSink,
}

impl FfiHost
{
    /// # Safety
    ///
    /// Every function pointer in `table` is valid and `table.ctx` is whatever
    /// they expect, for the rest of the process.
    pub unsafe fn new(table: &'static ZdbHostVTable, commands: CommandSink) -> Self
    {
        Self { table, commands }
    }

    /// Directory the shim says the plugin lives in.
    pub fn plugin_dir(&self) -> Option<PathBuf>
    {
        // SAFETY: the table promises a valid string or null.
        let dir = unsafe { owned_string(self.table.plugin_dir) };
        dir.map(PathBuf::from)
    }
}

impl HostDebugger for FfiHost
{
    fn version_banner(&self) -> String
    {
        // SAFETY: see `FfiHost::new`.
        let banner = unsafe { owned_string((self.table.version_banner)(self.table.ctx)) };
        banner.unwrap_or_default()
    }

    fn create_summary(&self, index: usize, formatter: &FormatterSpec) -> Option<Box<dyn SummaryWrapper>>
    {
        if index >= MAX_FORMATTERS {
            return None;
        }
        let index = u32::try_from(index).ok()?;
        let description = CString::new(formatter.description).ok()?;
        // SAFETY: see `FfiHost::new`.
        let summary = unsafe { (self.table.create_summary)(self.table.ctx, index, description.as_ptr()) };
        NonNull::new(summary).map(|summary| Box::new(ShimSummary(summary)) as Box<dyn SummaryWrapper>)
    }

    fn register_command(&self, name: &str, help: &str, handler: Box<dyn CommandHandler>) -> bool
    {
        let (Ok(c_name), Ok(c_help)) = (CString::new(name), CString::new(help)) else {
            return false;
        };
        (self.commands)(name, handler);
        // SAFETY: see `FfiHost::new`.
        unsafe { (self.table.register_command)(self.table.ctx, c_name.as_ptr(), c_help.as_ptr()) }
    }
}
