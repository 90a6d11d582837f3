//! Offset file search order.
//!
//! 1. explicit file (`ZDB_OFFSETS_FILE`)
//! 2. explicit directory (`ZDB_OFFSETS_DIR`)
//! 3. `$HOME/.config/zdb/offsets/`
//! 4. `/usr/local/share/zdb/offsets/`
//! 5. `<plugin_dir>/../offsets/` (development checkouts)
//!
//! The first candidate that exists wins.

use std::path::{Path, PathBuf};

use crate::error::{ZdbError, ZdbResult};
use crate::types::HostVersion;

/// System-wide offset directory.
pub const SYSTEM_OFFSETS_DIR: &str = "/usr/local/share/zdb/offsets";

/// Where to look for `lldb-<version>.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetSearch
{
    /// Full path override; used regardless of its file name
    pub explicit_file: Option<PathBuf>,
    /// Directory override
    pub directory: Option<PathBuf>,
    /// Per-user configuration directory
    pub user_dir: Option<PathBuf>,
    /// System-wide shared directory
    pub system_dir: Option<PathBuf>,
    /// Directory the plugin binary lives in
    pub plugin_dir: Option<PathBuf>,
}

impl OffsetSearch
{
    /// Standard search locations for a user with the given home directory.
    pub fn standard(home: Option<&Path>) -> Self
    {
        Self {
            explicit_file: None,
            directory: None,
            user_dir: home.map(|home| home.join(".config").join("zdb").join("offsets")),
            system_dir: Some(PathBuf::from(SYSTEM_OFFSETS_DIR)),
            plugin_dir: None,
        }
    }

    /// Every candidate path for `version`, in search order.
    pub fn candidates(&self, version: &HostVersion) -> Vec<PathBuf>
    {
        let file_name = version.offsets_file_name();
        let mut candidates = Vec::with_capacity(5);

        if let Some(file) = &self.explicit_file {
            candidates.push(file.clone());
        }
        for dir in [&self.directory, &self.user_dir, &self.system_dir].into_iter().flatten() {
            candidates.push(dir.join(&file_name));
        }
        if let Some(plugin_dir) = &self.plugin_dir {
            candidates.push(plugin_dir.join("..").join("offsets").join(&file_name));
        }

        candidates
    }

    /// First existing candidate.
    ///
    /// ## Errors
    ///
    /// `OffsetsNotFound` listing every path that was tried.
    pub fn locate(&self, version: &HostVersion) -> ZdbResult<PathBuf>
    {
        let candidates = self.candidates(version);
        for candidate in &candidates {
            if candidate.is_file() {
                return Ok(candidate.clone());
            }
            tracing::trace!(path = %candidate.display(), "offset candidate missing");
        }

        if let Some(file) = &self.explicit_file {
            tracing::warn!("ZDB_OFFSETS_FILE points at a missing file: {}", file.display());
        }

        Err(ZdbError::OffsetsNotFound {
            version: version.to_string(),
            searched: candidates,
        })
    }
}
