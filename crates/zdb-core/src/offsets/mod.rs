//! # Offset Tables
//!
//! Per-version description of where LLDB's non-exported functions live.
//!
//! LLDB only exports its public `SB*` API. The functions needed to install a
//! native summary formatter (`TypeCategoryImpl::AddTypeSummary` and friends)
//! are internal, so their addresses are recorded ahead of time as distances
//! from one exported anchor, the *reference symbol*. At runtime the anchor is
//! resolved with the dynamic loader and every internal function is found by
//! adding its offset to the same base.
//!
//! ## File format
//!
//! ```json
//! {
//!   "version": "21.1.7",
//!   "reference_symbol": "_ZN4lldb10SBDebugger10InitializeEv",
//!   "reference_offset": "0x3a2c10",
//!   "symbols": {
//!     "TypeCategoryImpl::AddTypeSummary": { "mangled": "_ZN12lldb_private...", "offset": "0x5123a0" },
//!     "TypeCategoryImpl::AddTypeFilter": null
//!   }
//! }
//! ```
//!
//! Offsets are hex strings (`0x` optional) or plain integers. Anything missing,
//! `null` or unreadable is *unavailable*; the table still loads so features
//! that do not need the symbol keep working.

pub mod search;
pub mod verify;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

pub use search::OffsetSearch;
pub use verify::{verify, VerificationReport};

use crate::error::{ZdbError, ZdbResult};
use crate::types::HostVersion;

/// `lldb::SBDebugger::Initialize()`, exported by every liblldb build.
pub const DEFAULT_REFERENCE_SYMBOL: &str = "_ZN4lldb10SBDebugger10InitializeEv";

/// Internal LLDB functions an offset table can describe.
///
/// The variants are a closed set: the bridge only knows how to call these, so
/// unknown keys in a description are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InternalSymbol
{
    /// `DataVisualization::Categories::GetCategory(ConstString, TypeCategoryImplSP&, bool)`
    GetCategory,
    /// `DataVisualization::Categories::Enable(const TypeCategoryImplSP&, uint32_t)`
    EnableCategory,
    /// `TypeCategoryImpl::AddTypeSummary(StringRef, FormatterMatchType, TypeSummaryImplSP)`
    AddTypeSummary,
    /// `TypeCategoryImpl::AddTypeSynthetic(...)`
    AddTypeSynthetic,
    /// `TypeCategoryImpl::AddTypeFormat(...)`
    AddTypeFormat,
    /// `TypeCategoryImpl::AddTypeFilter(...)`
    AddTypeFilter,
    /// `CXXFunctionSummaryFormat::CXXFunctionSummaryFormat(...)`
    SummaryFormatCtor,
    /// `FormatManager::GetCategory(ConstString, bool)`
    FormatManagerGetCategory,
    /// `formatters::AddCXXSynthetic(...)`
    AddCxxSynthetic,
}

impl InternalSymbol
{
    /// Every symbol, in description order.
    pub const ALL: [InternalSymbol; 9] = [
        InternalSymbol::GetCategory,
        InternalSymbol::EnableCategory,
        InternalSymbol::AddTypeSummary,
        InternalSymbol::AddTypeSynthetic,
        InternalSymbol::AddTypeFormat,
        InternalSymbol::AddTypeFilter,
        InternalSymbol::SummaryFormatCtor,
        InternalSymbol::FormatManagerGetCategory,
        InternalSymbol::AddCxxSynthetic,
    ];

    /// Key used for this symbol in the `symbols` object of a description.
    pub const fn key(self) -> &'static str
    {
        match self {
            InternalSymbol::GetCategory => "DataVisualization::Categories::GetCategory",
            InternalSymbol::EnableCategory => "DataVisualization::Categories::Enable",
            InternalSymbol::AddTypeSummary => "TypeCategoryImpl::AddTypeSummary",
            InternalSymbol::AddTypeSynthetic => "TypeCategoryImpl::AddTypeSynthetic",
            InternalSymbol::AddTypeFormat => "TypeCategoryImpl::AddTypeFormat",
            InternalSymbol::AddTypeFilter => "TypeCategoryImpl::AddTypeFilter",
            InternalSymbol::SummaryFormatCtor => "CXXFunctionSummaryFormat::ctor",
            InternalSymbol::FormatManagerGetCategory => "FormatManager::GetCategory",
            InternalSymbol::AddCxxSynthetic => "formatters::AddCXXSynthetic",
        }
    }

    /// Look a symbol up by its description key.
    pub fn from_key(key: &str) -> Option<Self>
    {
        Self::ALL.into_iter().find(|sym| sym.key() == key)
    }
}

impl fmt::Display for InternalSymbol
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.key())
    }
}

/// One internal function's position relative to the library base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetEntry
{
    /// Which function this is
    pub symbol: InternalSymbol,
    /// Byte offset, `None` when unavailable
    pub offset: Option<u64>,
    /// Mangled name, when the description recorded it
    pub mangled: Option<String>,
}

impl OffsetEntry
{
    /// Whether the entry can be resolved.
    pub fn is_available(&self) -> bool
    {
        self.offset.is_some()
    }
}

/// Offsets for one LLDB build.
///
/// Constructed once per plugin load and read-only afterwards.
#[derive(Debug, Clone)]
pub struct OffsetTable
{
    version: String,
    reference_symbol: String,
    reference_offset: u64,
    entries: BTreeMap<InternalSymbol, OffsetEntry>,
    source: Option<PathBuf>,
}

impl OffsetTable
{
    /// Create a table with every entry unavailable.
    pub fn new(version: impl Into<String>, reference_symbol: impl Into<String>, reference_offset: u64) -> Self
    {
        let entries = InternalSymbol::ALL
            .into_iter()
            .map(|symbol| {
                (
                    symbol,
                    OffsetEntry {
                        symbol,
                        offset: None,
                        mangled: None,
                    },
                )
            })
            .collect();

        Self {
            version: version.into(),
            reference_symbol: reference_symbol.into(),
            reference_offset,
            entries,
            source: None,
        }
    }

    /// Set the offset of one entry. A zero offset marks it unavailable.
    #[must_use]
    pub fn with_offset(mut self, symbol: InternalSymbol, offset: u64) -> Self
    {
        if let Some(entry) = self.entries.get_mut(&symbol) {
            entry.offset = (offset != 0).then_some(offset);
        }
        self
    }

    /// Parse a description from JSON text.
    ///
    /// ## Errors
    ///
    /// - `OffsetsParse`: not JSON, or the top level is not an object
    /// - `OffsetsInvalid`: the reference offset is missing or zero
    pub fn parse(text: &str, origin: &Path) -> ZdbResult<Self>
    {
        let raw: RawTable = serde_json::from_str(text).map_err(|err| ZdbError::OffsetsParse {
            path: origin.to_path_buf(),
            reason: err.to_string(),
        })?;

        let reference_offset = raw.reference_offset.as_ref().and_then(parse_offset).ok_or_else(|| {
            ZdbError::OffsetsInvalid(format!("{} has no usable reference_offset", origin.display()))
        })?;

        let reference_symbol = raw
            .reference_symbol
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_REFERENCE_SYMBOL.to_string());

        let mut table = Self::new(raw.version.unwrap_or_default(), reference_symbol, reference_offset);
        table.source = Some(origin.to_path_buf());

        for (key, value) in &raw.symbols {
            let Some(symbol) = InternalSymbol::from_key(key) else {
                tracing::debug!(key = %key, "ignoring unknown offset entry");
                continue;
            };
            let entry = table.entries.entry(symbol).or_insert(OffsetEntry {
                symbol,
                offset: None,
                mangled: None,
            });
            if let Value::Object(fields) = value {
                entry.offset = fields.get("offset").and_then(parse_offset);
                entry.mangled = fields.get("mangled").and_then(Value::as_str).map(str::to_string);
            }
        }

        Ok(table)
    }

    /// Read and parse a description file.
    ///
    /// ## Errors
    ///
    /// `Io` when the file cannot be read, plus everything [`OffsetTable::parse`] returns.
    pub fn from_file(path: &Path) -> ZdbResult<Self>
    {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// LLDB version the table was captured from.
    pub fn version(&self) -> &str
    {
        &self.version
    }

    /// Exported anchor symbol name.
    pub fn reference_symbol(&self) -> &str
    {
        &self.reference_symbol
    }

    /// Offset of the anchor symbol itself.
    pub fn reference_offset(&self) -> u64
    {
        self.reference_offset
    }

    /// File the table was loaded from, if any.
    pub fn source(&self) -> Option<&Path>
    {
        self.source.as_deref()
    }

    /// Entry for `symbol`.
    pub fn entry(&self, symbol: InternalSymbol) -> Option<&OffsetEntry>
    {
        self.entries.get(&symbol)
    }

    /// Offset for `symbol`, `None` when unavailable.
    pub fn offset(&self, symbol: InternalSymbol) -> Option<u64>
    {
        self.entries.get(&symbol).and_then(|entry| entry.offset)
    }

    /// Every entry, available or not.
    pub fn entries(&self) -> impl Iterator<Item = &OffsetEntry>
    {
        self.entries.values()
    }

    /// Whether the table was captured from `version`.
    pub fn version_matches(&self, version: &HostVersion) -> bool
    {
        self.version == version.as_str()
    }
}

#[derive(Deserialize)]
struct RawTable
{
    version: Option<String>,
    reference_symbol: Option<String>,
    reference_offset: Option<Value>,
    #[serde(default)]
    symbols: HashMap<String, Value>,
}

/// Hex string (with or without `0x`) or integer. Zero counts as unavailable.
fn parse_offset(value: &Value) -> Option<u64>
{
    let offset = match value {
        Value::String(text) => {
            let digits = text.trim();
            let digits = digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))
                .unwrap_or(digits);
            u64::from_str_radix(digits, 16).ok()?
        }
        Value::Number(number) => number.as_u64()?,
        _ => return None,
    };
    (offset != 0).then_some(offset)
}

/// Locate and load the offset table for `version`.
///
/// The library path is only used for the operator hint printed when no table
/// exists. A version mismatch between the table and the running debugger is a
/// warning: internal layouts rarely change between patch releases, but nothing
/// guarantees it.
///
/// ## Errors
///
/// - `OffsetsNotFound`: no candidate file exists
/// - `OffsetsParse` / `OffsetsInvalid` / `Io`: the chosen file is unusable
pub fn load(search: &OffsetSearch, library_path: &Path, version: &HostVersion) -> ZdbResult<OffsetTable>
{
    let path = match search.locate(version) {
        Ok(path) => path,
        Err(err) => {
            tracing::warn!("No offset file found for LLDB {version}");
            tracing::warn!(
                "Generate one for {} and set ZDB_OFFSETS_FILE or ZDB_OFFSETS_DIR",
                library_path.display()
            );
            return Err(err);
        }
    };

    let table = OffsetTable::from_file(&path)?;
    tracing::info!(path = %path.display(), version = table.version(), "loaded offset table");

    if !table.version_matches(version) {
        tracing::warn!(
            "offset file version ({}) doesn't match LLDB ({version}); continuing",
            table.version()
        );
    }

    Ok(table)
}

#[cfg(test)]
mod tests
{
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "21.1.7",
        "reference_symbol": "_ZN4lldb10SBDebugger10InitializeEv",
        "reference_offset": "0x3a2c10",
        "symbols": {
            "DataVisualization::Categories::GetCategory": { "mangled": "_ZN12lldb_private17DataVisualization10Categories11GetCategory", "offset": "0x4f0000", "relative": "0x14d3f0" },
            "TypeCategoryImpl::AddTypeSummary": { "offset": 5316000 },
            "TypeCategoryImpl::AddTypeFilter": null,
            "TypeCategoryImpl::AddTypeFormat": { "offset": "not-hex" },
            "SomethingNew::Unknown": { "offset": "0x10" }
        }
    }"#;

    fn parse(text: &str) -> ZdbResult<OffsetTable>
    {
        OffsetTable::parse(text, Path::new("lldb-21.1.7.json"))
    }

    #[test]
    fn test_parse_sample()
    {
        let table = parse(SAMPLE).unwrap();
        assert_eq!(table.version(), "21.1.7");
        assert_eq!(table.reference_offset(), 0x3a_2c10);
        assert_eq!(table.offset(InternalSymbol::GetCategory), Some(0x4f_0000));
        assert_eq!(table.offset(InternalSymbol::AddTypeSummary), Some(5_316_000));
        assert!(table.entry(InternalSymbol::GetCategory).unwrap().mangled.is_some());
    }

    #[test]
    fn test_unavailable_entries_do_not_fail_the_load()
    {
        let table = parse(SAMPLE).unwrap();
        assert_eq!(table.offset(InternalSymbol::AddTypeFilter), None);
        assert_eq!(table.offset(InternalSymbol::AddTypeFormat), None);
        assert_eq!(table.offset(InternalSymbol::EnableCategory), None);
        assert_eq!(table.entries().count(), InternalSymbol::ALL.len());
    }

    #[test]
    fn test_missing_reference_offset_is_invalid()
    {
        let err = parse(r#"{ "version": "21.1.7", "symbols": {} }"#).unwrap_err();
        assert!(matches!(err, ZdbError::OffsetsInvalid(_)));

        let err = parse(r#"{ "version": "21.1.7", "reference_offset": "0x0" }"#).unwrap_err();
        assert!(matches!(err, ZdbError::OffsetsInvalid(_)));
    }

    #[test]
    fn test_default_reference_symbol()
    {
        let table = parse(r#"{ "version": "1.0.0", "reference_offset": "1000" }"#).unwrap();
        assert_eq!(table.reference_symbol(), DEFAULT_REFERENCE_SYMBOL);
        assert_eq!(table.reference_offset(), 0x1000);
    }

    #[test]
    fn test_not_json()
    {
        assert!(matches!(parse("version = 1").unwrap_err(), ZdbError::OffsetsParse { .. }));
    }

    #[test]
    fn test_symbol_keys_round_trip()
    {
        for symbol in InternalSymbol::ALL {
            assert_eq!(InternalSymbol::from_key(symbol.key()), Some(symbol));
        }
        assert_eq!(InternalSymbol::from_key("nope"), None);
    }
}
