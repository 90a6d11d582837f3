//! Tests for offset loading and resolution against on-disk descriptions

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use zdb_core::offsets::{self, DEFAULT_REFERENCE_SYMBOL};
use zdb_core::resolver::{resolve, SymbolSource};
use zdb_core::{Address, HostVersion, InternalSymbol, OffsetSearch, OffsetTable, ZdbError};

const DESCRIPTION: &str = r#"{
  "version": "21.1.7",
  "reference_symbol": "_ZN4lldb10SBDebugger10InitializeEv",
  "reference_offset": "0x3a2c10",
  "symbols": {
    "DataVisualization::Categories::GetCategory": { "mangled": "_ZN12lldb_private17DataVisualization10Categories11GetCategoryENS_11ConstStringERNSt3__110shared_ptrINS_16TypeCategoryImplEEEb", "offset": "0x4f0000", "relative": "0x14d3f0" },
    "DataVisualization::Categories::Enable": { "offset": "0x4f0100" },
    "TypeCategoryImpl::AddTypeSummary": { "offset": 5317536 },
    "TypeCategoryImpl::AddTypeFilter": null,
    "SomethingNew::Unknown": { "offset": "0x10" }
  }
}"#;

/// Exports keyed by name, relative to a fake load address.
struct FakeExports(HashMap<&'static str, u64>);

impl SymbolSource for FakeExports
{
    fn lookup(&self, name: &str) -> Option<Address>
    {
        self.0.get(name).copied().map(Address::from)
    }
}

fn write_description(dir: &Path, version: &str) -> std::path::PathBuf
{
    let path = dir.join(format!("lldb-{version}.json"));
    fs::write(&path, DESCRIPTION).unwrap();
    path
}

#[test]
fn test_load_from_user_directory()
{
    let home = tempfile::tempdir().unwrap();
    let offsets_dir = home.path().join(".config/zdb/offsets");
    fs::create_dir_all(&offsets_dir).unwrap();
    let written = write_description(&offsets_dir, "21.1.7");

    let search = OffsetSearch {
        system_dir: None,
        ..OffsetSearch::standard(Some(home.path()))
    };
    let version = HostVersion::from_banner("lldb version 21.1.7 (https://github.com/llvm/llvm-project)").unwrap();
    let table = offsets::load(&search, Path::new("liblldb.so"), &version).unwrap();

    assert_eq!(table.source(), Some(written.as_path()));
    assert_eq!(table.reference_offset(), 0x3a2c10);
    assert_eq!(table.offset(InternalSymbol::AddTypeSummary), Some(5_317_536));
    assert_eq!(table.offset(InternalSymbol::AddTypeFilter), None);
    assert!(table.version_matches(&version));
}

#[test]
fn test_explicit_directory_precedes_user_directory()
{
    let home = tempfile::tempdir().unwrap();
    let user_dir = home.path().join(".config/zdb/offsets");
    fs::create_dir_all(&user_dir).unwrap();
    write_description(&user_dir, "21.1.7");

    let override_dir = tempfile::tempdir().unwrap();
    let preferred = write_description(override_dir.path(), "21.1.7");

    let search = OffsetSearch {
        directory: Some(override_dir.path().to_path_buf()),
        system_dir: None,
        ..OffsetSearch::standard(Some(home.path()))
    };
    let version: HostVersion = "21.1.7".parse().unwrap();
    assert_eq!(search.locate(&version).unwrap(), preferred);
}

#[test]
fn test_nothing_found_reports_search()
{
    let empty = tempfile::tempdir().unwrap();
    let search = OffsetSearch {
        directory: Some(empty.path().to_path_buf()),
        ..OffsetSearch::default()
    };
    let version: HostVersion = "19.0.0".parse().unwrap();

    match offsets::load(&search, Path::new("liblldb.so"), &version) {
        Err(ZdbError::OffsetsNotFound { version, searched }) => {
            assert_eq!(version, "19.0.0");
            assert_eq!(searched, vec![empty.path().join("lldb-19.0.0.json")]);
        }
        other => panic!("Expected OffsetsNotFound, got {other:?}"),
    }
}

#[test]
fn test_resolution_anchors_on_reference()
{
    let dir = tempfile::tempdir().unwrap();
    let path = write_description(dir.path(), "21.1.7");
    let table = OffsetTable::from_file(&path).unwrap();

    let load_address = 0x1_0000_0000u64;
    let exports = FakeExports(HashMap::from([(DEFAULT_REFERENCE_SYMBOL, load_address + 0x3a2c10)]));
    let symbols = resolve(&exports, &table).unwrap();

    assert_eq!(symbols.base(), Address::from(load_address));
    assert_eq!(symbols.base().value() + table.reference_offset(), symbols.reference().value());
    assert_eq!(symbols.get(InternalSymbol::GetCategory), Some(Address::from(load_address + 0x4f0000)));
    assert_eq!(symbols.get(InternalSymbol::AddTypeSummary), Some(Address::from(load_address + 5_317_536)));
    assert_eq!(symbols.get(InternalSymbol::AddTypeFilter), None);
    assert_eq!(symbols.len(), 3);
}

#[test]
fn test_resolution_without_reference_symbol()
{
    let dir = tempfile::tempdir().unwrap();
    let path = write_description(dir.path(), "21.1.7");
    let table = OffsetTable::from_file(&path).unwrap();

    let exports = FakeExports(HashMap::new());
    assert!(matches!(
        resolve(&exports, &table),
        Err(ZdbError::ReferenceSymbolNotFound(name)) if name == DEFAULT_REFERENCE_SYMBOL
    ));
}

#[test]
fn test_malformed_description()
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lldb-21.1.7.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(OffsetTable::from_file(&path), Err(ZdbError::OffsetsParse { .. })));

    fs::write(&path, r#"{"version": "21.1.7", "symbols": {}}"#).unwrap();
    assert!(matches!(OffsetTable::from_file(&path), Err(ZdbError::OffsetsInvalid(_))));
}
