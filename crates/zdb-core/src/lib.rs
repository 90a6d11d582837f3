//! # zdb-core
//!
//! Zig value formatting for LLDB, without modifying LLDB.
//!
//! LLDB's public API can create summary callbacks but cannot attach them to
//! regex type patterns. This crate reaches the internal functions that can by
//! computing their addresses from an offset table, relative to an exported
//! reference symbol, and calling them with the exact C++ calling convention.
//!
//! - [`offsets`]: offset description format, search order, verification
//! - [`resolver`]: runtime addresses from offsets
//! - [`abi`]: per-architecture indirect calls into LLDB
//! - [`registrar`]: the Zig formatter plan and its registration
//! - [`summaries`]: the summary callbacks themselves
//! - [`rewriter`]: Zig expression syntax for LLDB's evaluator
//! - [`command`]: the `expression` replacement and its option parsing
//! - [`plugin`]: load-time orchestration
//!
//! ## Why unsafe code is needed
//!
//! The bridge opens the host library, reinterprets LLDB's public wrapper
//! objects as their `shared_ptr` member and calls functions through raw
//! addresses. None of that can be checked by the compiler; each call site
//! documents what it relies on.

#![allow(unsafe_code)] // Raw calls into LLDB internals

pub mod abi;
pub mod command;
pub mod config;
pub mod error;
pub mod host;
pub mod offsets;
pub mod plugin;
pub mod registrar;
pub mod resolver;
pub mod rewriter;
pub mod shapes;
pub mod summaries;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::PluginConfig;
// Re-export commonly used types
pub use error::{ZdbError, ZdbResult};
pub use offsets::{InternalSymbol, OffsetSearch, OffsetTable};
pub use plugin::{BridgeStatus, PluginLoad};
pub use registrar::{FormatterSpec, ZIG_FORMATTERS};
pub use resolver::ResolvedSymbols;
pub use types::{Address, HostVersion};
