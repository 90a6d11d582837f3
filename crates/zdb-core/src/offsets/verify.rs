//! Cross-check an offset table against the library's on-disk symbol table.
//!
//! Only entries whose description carried a `mangled` name can be checked.
//! Internal LLDB symbols are usually present in the static symbol table of a
//! non-stripped build even though the dynamic loader cannot see them.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use object::{Object, ObjectSymbol};

use super::{InternalSymbol, OffsetTable};
use crate::error::{ZdbError, ZdbResult};

/// Outcome for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus
{
    /// Same distance to the reference symbol on disk and in the table
    Matches,
    /// The on-disk distance differs; the table belongs to another build
    Mismatch
    {
        /// Relative offset according to the table
        expected: i64,
        /// Relative offset found in the image
        found: i64,
    },
    /// The mangled name is not in the image's symbol tables
    NotInImage,
    /// The description did not record a mangled name
    NoMangledName,
    /// The entry is unavailable in the table
    Unavailable,
}

/// Per-entry verification results.
#[derive(Debug, Clone)]
pub struct VerificationReport
{
    /// Reference symbol address in the image file
    pub reference_address: u64,
    /// One result per table entry, in table order
    pub entries: Vec<(InternalSymbol, EntryStatus)>,
}

impl VerificationReport
{
    /// Whether any checked entry disagrees with the image.
    pub fn has_mismatches(&self) -> bool
    {
        self.entries
            .iter()
            .any(|(_, status)| matches!(status, EntryStatus::Mismatch { .. }))
    }
}

/// Verify `table` against the library at `library_path`.
///
/// ## Errors
///
/// - `Io`: the library cannot be read
/// - `LibraryOpen`: the file is not an object file `object` understands
/// - `ReferenceSymbolNotFound`: the anchor is not in the image
pub fn verify(table: &OffsetTable, library_path: &Path) -> ZdbResult<VerificationReport>
{
    let data = fs::read(library_path)?;
    let file = object::File::parse(&*data).map_err(|err| ZdbError::LibraryOpen {
        path: library_path.to_path_buf(),
        reason: err.to_string(),
    })?;

    let mut addresses: HashMap<&str, u64> = HashMap::new();
    for symbol in file.symbols().chain(file.dynamic_symbols()) {
        if symbol.is_undefined() {
            continue;
        }
        if let Ok(name) = symbol.name() {
            addresses.entry(name).or_insert(symbol.address());
        }
    }

    let reference_address = lookup(&addresses, table.reference_symbol())
        .ok_or_else(|| ZdbError::ReferenceSymbolNotFound(table.reference_symbol().to_string()))?;

    let entries = table
        .entries()
        .map(|entry| {
            let status = match (entry.offset, entry.mangled.as_deref()) {
                (None, _) => EntryStatus::Unavailable,
                (Some(_), None) => EntryStatus::NoMangledName,
                (Some(offset), Some(mangled)) => match lookup(&addresses, mangled) {
                    None => EntryStatus::NotInImage,
                    Some(address) => {
                        let expected = relative(offset, table.reference_offset());
                        let found = relative(address, reference_address);
                        if expected == found {
                            EntryStatus::Matches
                        } else {
                            EntryStatus::Mismatch { expected, found }
                        }
                    }
                },
            };
            (entry.symbol, status)
        })
        .collect();

    Ok(VerificationReport {
        reference_address,
        entries,
    })
}

/// Mach-O prefixes C symbols with an underscore; descriptions store them without.
fn lookup(addresses: &HashMap<&str, u64>, name: &str) -> Option<u64>
{
    addresses
        .get(name)
        .or_else(|| addresses.get(format!("_{name}").as_str()))
        .copied()
}

#[allow(clippy::cast_possible_wrap)]
fn relative(address: u64, anchor: u64) -> i64
{
    address.wrapping_sub(anchor) as i64
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_lookup_with_underscore_prefix()
    {
        let mut map = HashMap::new();
        map.insert("__ZN4lldb10SBDebugger10InitializeEv", 0x1000);
        assert_eq!(lookup(&map, "_ZN4lldb10SBDebugger10InitializeEv"), Some(0x1000));
        assert_eq!(lookup(&map, "missing"), None);
    }

    #[test]
    fn test_relative_can_be_negative()
    {
        assert_eq!(relative(0x100, 0x200), -0x100);
        assert_eq!(relative(0x300, 0x200), 0x100);
    }

    #[test]
    fn test_not_an_object_file()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("liblldb.so");
        std::fs::write(&path, b"definitely not elf").unwrap();
        let table = OffsetTable::new("21.1.7", "ref", 0x10);
        assert!(matches!(verify(&table, &path), Err(ZdbError::LibraryOpen { .. })));
    }
}
