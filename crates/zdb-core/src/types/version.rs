//! Host debugger version.

use std::fmt;
use std::str::FromStr;

use crate::error::ZdbError;

/// Dotted numeric version of the running debugger, e.g. `21.1.7`.
///
/// Offset files are selected by this string (`lldb-21.1.7.json`), so it is kept
/// exactly as the banner spelled it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostVersion(String);

impl HostVersion
{
    /// Extract the version from a banner such as
    /// `lldb version 21.1.7 (https://github.com/llvm/llvm-project revision ...)`.
    ///
    /// The version is the run of digits and dots directly after `version `.
    ///
    /// ## Errors
    ///
    /// `VersionUnparseable` when the banner has no `version ` marker or nothing
    /// numeric follows it.
    pub fn from_banner(banner: &str) -> Result<Self, ZdbError>
    {
        let start = banner
            .find("version ")
            .map(|idx| idx + "version ".len())
            .ok_or_else(|| ZdbError::VersionUnparseable(banner.to_string()))?;

        let version: String = banner[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let version = version.trim_end_matches('.');

        if version.is_empty() || !version.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(ZdbError::VersionUnparseable(banner.to_string()));
        }
        Ok(Self(version.to_string()))
    }

    /// The version string as used in offset file names.
    pub fn as_str(&self) -> &str
    {
        &self.0
    }

    /// Offset description file name for this version.
    pub fn offsets_file_name(&self) -> String
    {
        format!("lldb-{}.json", self.0)
    }
}

impl FromStr for HostVersion
{
    type Err = ZdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(ZdbError::VersionUnparseable(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for HostVersion
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.0)
    }
}
