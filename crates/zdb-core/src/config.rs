//! Plugin configuration, read once from the environment.
//!
//! | variable | effect |
//! |----------|--------|
//! | `ZDB_LLDB_PATH` | LLDB shared library to resolve symbols in |
//! | `ZDB_OFFSETS_FILE` | offset description to use, skipping the search |
//! | `ZDB_OFFSETS_DIR` | directory searched before the standard ones |
//! | `ZDB_PLUGIN_DIR` | plugin install directory (for `../offsets`) |
//! | `HOME` | base of the per-user offsets directory |

use std::env;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::offsets::OffsetSearch;
use crate::registrar::ZIG_CATEGORY;
use crate::rewriter::EVALUATION_TIMEOUT;

/// Library opened when `ZDB_LLDB_PATH` is not set.
#[cfg(target_os = "macos")]
pub const DEFAULT_LLDB_PATH: &str = "/opt/homebrew/opt/llvm/lib/liblldb.dylib";
/// Library opened when `ZDB_LLDB_PATH` is not set.
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_LLDB_PATH: &str = "liblldb.so";

/// Everything the plugin needs to bring the bridge up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig
{
    /// LLDB library whose exports anchor the offset table
    pub library_path: PathBuf,
    /// Offset description search order
    pub offsets: OffsetSearch,
    /// Formatter category name
    pub category: &'static CStr,
    /// Timeout for expression evaluation
    pub evaluation_timeout: Duration,
}

impl Default for PluginConfig
{
    fn default() -> Self
    {
        Self {
            library_path: PathBuf::from(DEFAULT_LLDB_PATH),
            offsets: OffsetSearch::standard(None),
            category: ZIG_CATEGORY,
            evaluation_timeout: EVALUATION_TIMEOUT,
        }
    }
}

impl PluginConfig
{
    /// Configuration from the process environment.
    pub fn from_env() -> Self
    {
        Self::from_lookup(|key| env::var_os(key).map(PathBuf::from))
    }

    /// Configuration from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<PathBuf>) -> Self
    {
        let var = |key: &str| lookup(key).filter(|value| !value.as_os_str().is_empty());

        let mut offsets = OffsetSearch::standard(var("HOME").as_deref());
        offsets.explicit_file = var("ZDB_OFFSETS_FILE");
        offsets.directory = var("ZDB_OFFSETS_DIR");
        offsets.plugin_dir = var("ZDB_PLUGIN_DIR");

        Self {
            library_path: var("ZDB_LLDB_PATH").unwrap_or_else(|| PathBuf::from(DEFAULT_LLDB_PATH)),
            offsets,
            ..Self::default()
        }
    }

    /// Use `dir` as the plugin directory unless one is already configured.
    pub fn with_plugin_dir(mut self, dir: Option<&Path>) -> Self
    {
        if self.offsets.plugin_dir.is_none() {
            self.offsets.plugin_dir = dir.map(Path::to_path_buf);
        }
        self
    }
}
