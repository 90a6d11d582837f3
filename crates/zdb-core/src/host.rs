//! # Host Debugger API
//!
//! The slice of LLDB's public scripting API this crate consumes.
//!
//! The bridge never links against LLDB's C++ headers. Whatever hosts it (the C ABI
//! plugin in `zdb-plugin`, or an in-memory fake in tests) implements these
//! traits on top of `SBValue`, `SBFrame` and `SBDebugger`.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::time::Duration;

use crate::registrar::FormatterSpec;

/// A value in the debuggee, as seen through `SBValue`.
///
/// Every accessor returns `None` where `SBValue` would return an invalid value
/// or a null string.
pub trait HostValue
{
    /// Member or variable name.
    fn name(&self) -> Option<String>;

    /// Display type name, e.g. `[]const u8`.
    fn type_name(&self) -> Option<String>;

    /// `GetValue()`: the formatted scalar value (enumerator name for enums).
    fn value(&self) -> Option<String>;

    /// `GetSummary()`
    fn summary(&self) -> Option<String>;

    /// `GetValueAsUnsigned()`, `None` when the value cannot be read as an integer.
    fn value_as_unsigned(&self) -> Option<u64>;

    /// Number of children.
    fn num_children(&self) -> usize;

    /// Child by position.
    fn child_at_index(&self, index: usize) -> Option<Box<dyn HostValue + '_>>;

    /// Child by member name.
    fn child_member_with_name(&self, name: &str) -> Option<Box<dyn HostValue + '_>>;

    /// Pointee of a pointer value.
    fn dereference(&self) -> Option<Box<dyn HostValue + '_>>;

    /// Read `len` bytes of debuggee memory. `None` unless every byte was read.
    fn read_memory(&self, address: u64, len: usize) -> Option<Vec<u8>>;

    /// Read a NUL-terminated string of at most `max_len` bytes, without the NUL.
    fn read_c_string(&self, address: u64, max_len: usize) -> Option<Vec<u8>>;

    /// Whether a member called `name` exists.
    fn has_field(&self, name: &str) -> bool
    {
        self.child_member_with_name(name).is_some()
    }

    /// Unsigned value of member `name`.
    fn member_unsigned(&self, name: &str) -> Option<u64>
    {
        self.child_member_with_name(name)?.value_as_unsigned()
    }
}

/// A stack frame, as seen through `SBFrame`.
pub trait HostFrame
{
    /// Frame-local variable (or argument) called `name`.
    fn find_variable(&self, name: &str) -> Option<Box<dyn HostValue + '_>>;

    /// Evaluate `expression` in this frame's context.
    ///
    /// The error is the evaluator's message.
    fn evaluate(&self, expression: &str, timeout: Duration) -> Result<Box<dyn HostValue + '_>, String>;
}

/// Options LLDB hands to a summary callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOptions
{
    /// Longest slice that is read and printed as a string
    pub max_string_len: u64,
    /// Read limit for NUL-terminated strings
    pub max_c_string_len: usize,
}

impl Default for SummaryOptions
{
    fn default() -> Self
    {
        Self {
            max_string_len: 1024,
            max_c_string_len: 256,
        }
    }
}

/// Signature of a summary callback: `(value, options, stream) -> handled`.
pub type SummaryFn = fn(&dyn HostValue, &SummaryOptions, &mut dyn fmt::Write) -> bool;

/// A public summary object created by the host (an `SBTypeSummary`).
///
/// The registrar keeps every wrapper for the life of the process: LLDB ends up
/// holding the implementation pointer extracted from it, not the wrapper.
pub trait SummaryWrapper: Send + Sync
{
    /// Address of the wrapper object itself.
    fn wrapper_ptr(&self) -> NonNull<c_void>;
}

/// Handler for a command the plugin installs in the host.
pub trait CommandHandler: Send + Sync
{
    /// Run the command. `frame` is the selected frame, if the process is stopped.
    ///
    /// Returns whether the command succeeded; output and errors go to `out`.
    fn execute(&self, frame: Option<&dyn HostFrame>, command: &str, out: &mut dyn fmt::Write) -> bool;
}

/// The debugger instance the plugin was loaded into.
pub trait HostDebugger
{
    /// Version banner, e.g. `lldb version 21.1.7 (...)`.
    fn version_banner(&self) -> String;

    /// Create a callback-bearing summary object (`SBTypeSummary::CreateWithCallback`).
    ///
    /// `index` is the formatter's position in the registration plan; hosts that
    /// cannot carry a Rust function pointer across their boundary dispatch on it.
    fn create_summary(&self, index: usize, formatter: &FormatterSpec) -> Option<Box<dyn SummaryWrapper>>;

    /// Install `handler` under `name`, replacing any existing command.
    fn register_command(&self, name: &str, help: &str, handler: Box<dyn CommandHandler>) -> bool;
}
