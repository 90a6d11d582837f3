//! # zdb-plugin
//!
//! The library LLDB loads. LLDB looks up `lldb::PluginInitialize(SBDebugger)`,
//! which this crate exports under its mangled name. It asks the C++ shim for the
//! host table built around that debugger and hands it to
//! [`zdb_plugin_initialize`]. The shim routes every summary and command callback
//! back into Rust through [`zdb_summary_dispatch`] and [`zdb_command_dispatch`].
//!
//! The shim is only compiled when the build script finds LLDB's headers and
//! library (`ZDB_LLDB_INCLUDE`, `ZDB_LLDB_LIB_DIR` or `llvm-config`). Without
//! them the crate still builds, minus the `PluginInitialize` export.
//!
//! ## Safety Notes
//!
//! - The host tables are stored for the rest of the process; the shim must never
//!   free them.
//! - A panic must not unwind into LLDB. Every entry point catches it and reports
//!   failure instead.
//! - Entry points are called on LLDB's command thread. The command registry is
//!   behind a mutex that is released before a handler runs, so handlers may
//!   dispatch or register commands themselves.

#![allow(unsafe_code)] // C ABI entry points

pub mod ffi;

use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, PoisonError};

use libc::c_char;
use once_cell::sync::{Lazy, OnceCell};
use tracing::{debug, error, info, warn};
use zdb_core::command::report_error;
use zdb_core::host::{CommandHandler, HostFrame, SummaryOptions};
use zdb_core::plugin;
use zdb_core::{PluginConfig, ZIG_FORMATTERS};

use crate::ffi::{FfiFrame, FfiHost, FfiValue, StreamWriter, ZdbFrameVTable, ZdbHostVTable, ZdbValueVTable, ZdbWriter};

/// Tables handed over by the shim at load time.
#[derive(Clone, Copy)]
struct HostTables
{
    values: &'static ZdbValueVTable,
    frames: &'static ZdbFrameVTable,
}

static TABLES: OnceCell<HostTables> = OnceCell::new();

static COMMANDS: Lazy<Mutex<HashMap<String, Arc<dyn CommandHandler>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

// Only inserts and lookups run under the lock, neither leaves the map half-updated.
fn commands() -> std::sync::MutexGuard<'static, HashMap<String, Arc<dyn CommandHandler>>>
{
    COMMANDS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn store_command(name: &str, handler: Box<dyn CommandHandler>)
{
    commands().insert(name.to_string(), Arc::from(handler));
}

/// Bring the plugin up. Called once from the shim's `PluginInitialize`.
///
/// Returns `false` only when `host` is null. Every other problem is logged and
/// leaves LLDB usable with fewer features.
///
/// # Safety
///
/// `host` is null or points to a table, and value/frame tables, that stay valid
/// for the rest of the process.
#[no_mangle]
pub unsafe extern "C" fn zdb_plugin_initialize(host: *const ZdbHostVTable) -> bool
{
    // SAFETY: caller contract; the tables are never freed.
    let Some(host) = (unsafe { host.as_ref() }) else {
        return false;
    };
    // SAFETY: as above.
    let (Some(values), Some(frames)) = (unsafe { host.value.as_ref() }, unsafe { host.frame.as_ref() }) else {
        return false;
    };

    // Another plugin may own the global subscriber; carry on without ours
    if let Ok(guard) = zdb_utils::init_plugin_logging() {
        guard.keep();
    }

    if TABLES.set(HostTables { values, frames }).is_err() {
        warn!("zdb plugin initialised more than once");
        return true;
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: caller contract.
        let ffi_host = unsafe { FfiHost::new(host, store_command) };
        let plugin_dir = ffi_host.plugin_dir();
        let config = PluginConfig::from_env().with_plugin_dir(plugin_dir.as_deref());
        plugin::initialize(&ffi_host, &config)
    }));

    match result {
        Ok(load) => {
            for diagnostic in &load.diagnostics {
                warn!("{diagnostic}");
            }
            info!("{load}");
        }
        Err(_) => error!("zdb plugin panicked during initialisation"),
    }
    true
}

/// The symbol LLDB calls after `plugin load`.
///
/// `SBDebugger` is not trivially copyable, so the Itanium ABI passes it by
/// address.
///
/// # Safety
///
/// Called by LLDB with a live `SBDebugger`.
#[cfg(zdb_shim)]
#[export_name = "_ZN4lldb16PluginInitializeENS_10SBDebuggerE"]
pub unsafe extern "C" fn lldb_plugin_initialize(debugger: *mut c_void) -> bool
{
    extern "C" {
        fn zdb_shim_host_table(debugger: *mut c_void) -> *const ZdbHostVTable;
    }

    // SAFETY: caller contract; the shim copies the debugger and keeps its table.
    unsafe { initialize_with(debugger, zdb_shim_host_table) }
}

/// Fetch the host table for `debugger` from `host_table` and initialise.
///
/// # Safety
///
/// `host_table` returns null or a table meeting [`zdb_plugin_initialize`]'s
/// contract.
#[cfg_attr(not(zdb_shim), allow(dead_code))]
unsafe fn initialize_with(
    debugger: *mut c_void,
    host_table: unsafe extern "C" fn(*mut c_void) -> *const ZdbHostVTable,
) -> bool
{
    if debugger.is_null() {
        return false;
    }
    // SAFETY: caller contract.
    unsafe { zdb_plugin_initialize(host_table(debugger)) }
}

/// Summary callback for formatter `index` of the registration plan.
///
/// # Safety
///
/// `value` is a live `SBValue` handle and `out` a live writer, both for the
/// duration of the call.
#[no_mangle]
pub unsafe extern "C" fn zdb_summary_dispatch(index: u32, value: *mut c_void, out: *const ZdbWriter) -> bool
{
    let (Some(tables), Some(value), Some(out)) = (TABLES.get(), NonNull::new(value), unsafe { out.as_ref() }) else {
        return false;
    };
    // SAFETY: caller contract.
    unsafe { summarize(tables.values, index, value, out) }
}

/// Run the command registered as `name`.
///
/// `frame` is null when the process is not stopped.
///
/// # Safety
///
/// `name` and `command` are NUL-terminated strings, `frame` is null or a live
/// `SBFrame` handle and `out` a live writer, all for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn zdb_command_dispatch(
    name: *const c_char,
    frame: *mut c_void,
    command: *const c_char,
    out: *const ZdbWriter,
) -> bool
{
    if name.is_null() || command.is_null() {
        return false;
    }
    let (Some(tables), Some(out)) = (TABLES.get(), unsafe { out.as_ref() }) else {
        return false;
    };
    // SAFETY: caller contract.
    let (name, command) = unsafe { (CStr::from_ptr(name), CStr::from_ptr(command)) };
    let frame = NonNull::new(frame).map(|frame| {
        // SAFETY: caller contract.
        unsafe { FfiFrame::borrowed(tables.frames, tables.values, frame) }
    });

    run_command(
        &name.to_string_lossy(),
        frame.as_ref().map(|frame| frame as &dyn HostFrame),
        &command.to_string_lossy(),
        &mut StreamWriter::new(out),
    )
}

/// # Safety
///
/// `value` is a live `SBValue` handle for the duration of the call.
unsafe fn summarize(values: &'static ZdbValueVTable, index: u32, value: NonNull<c_void>, out: &ZdbWriter) -> bool
{
    let Some(formatter) = usize::try_from(index).ok().and_then(|index| ZIG_FORMATTERS.get(index)) else {
        warn!(index, "summary requested for unknown formatter");
        return false;
    };

    // SAFETY: caller contract.
    let value = unsafe { FfiValue::borrowed(values, value) };
    let options = SummaryOptions::default();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        (formatter.callback)(&value, &options, &mut StreamWriter::new(out))
    }));
    result.unwrap_or_else(|_| {
        error!(formatter = formatter.description, "summary callback panicked");
        false
    })
}

fn run_command(name: &str, frame: Option<&dyn HostFrame>, command: &str, out: &mut dyn std::fmt::Write) -> bool
{
    let handler = commands().get(name).cloned();
    let Some(handler) = handler else {
        return report_error(out, format_args!("'{name}' is not a zdb command"));
    };
    debug!(command = name, "dispatching");

    panic::catch_unwind(AssertUnwindSafe(|| handler.execute(frame, command, out))).unwrap_or_else(|_| {
        error!(command = name, "command panicked");
        false
    })
}
