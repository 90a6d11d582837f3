//! # Symbol Resolver
//!
//! Turns an [`OffsetTable`] into runtime addresses.
//!
//! ```text
//! base    = address_of(reference_symbol) - reference_offset
//! address = base + entry.offset
//! ```
//!
//! The library handle that produced `address_of(reference_symbol)` must stay
//! open for as long as any derived address may be called, which for the plugin
//! means forever. [`LoadedLibrary`] has no close method; the plugin moves it into
//! process-wide state and never drops it.

use std::collections::BTreeMap;
use std::ffi::{c_void, CString};
use std::path::{Path, PathBuf};

use crate::error::{ZdbError, ZdbResult};
use crate::offsets::{InternalSymbol, OffsetTable};
use crate::types::Address;

/// Anything that can map an exported symbol name to its runtime address.
///
/// Implemented by [`LoadedLibrary`]; tests substitute a map.
pub trait SymbolSource
{
    /// Address of the exported symbol `name`, if present.
    fn lookup(&self, name: &str) -> Option<Address>;
}

/// An open handle to the host debugger's shared library.
pub struct LoadedLibrary
{
    path: PathBuf,
    library: libloading::Library,
}

impl LoadedLibrary
{
    /// Open the library with immediate binding.
    ///
    /// ## Errors
    ///
    /// `LibraryOpen` with the dynamic loader's message.
    pub fn open(path: &Path) -> ZdbResult<Self>
    {
        let library = open_now(path).map_err(|err| ZdbError::LibraryOpen {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "opened host library");

        Ok(Self {
            path: path.to_path_buf(),
            library,
        })
    }

    /// Path the library was opened from.
    pub fn path(&self) -> &Path
    {
        &self.path
    }
}

#[cfg(unix)]
fn open_now(path: &Path) -> Result<libloading::Library, libloading::Error>
{
    use libloading::os::unix::{Library, RTLD_LOCAL, RTLD_NOW};

    // SAFETY: liblldb has no initialisers with preconditions; it is normally
    // already mapped into the process that loaded this plugin.
    unsafe { Library::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Into::into)
}

#[cfg(not(unix))]
fn open_now(path: &Path) -> Result<libloading::Library, libloading::Error>
{
    // SAFETY: see the unix variant.
    unsafe { libloading::Library::new(path) }
}

impl SymbolSource for LoadedLibrary
{
    fn lookup(&self, name: &str) -> Option<Address>
    {
        let candidates = [Some(name), name.strip_prefix('_').filter(|rest| rest.starts_with('_'))];
        for candidate in candidates.into_iter().flatten() {
            let Ok(c_name) = CString::new(candidate) else {
                continue;
            };
            // SAFETY: the symbol is only read as an address, never called through
            // this type.
            let symbol = unsafe { self.library.get::<*const c_void>(c_name.as_bytes_with_nul()) };
            if let Ok(symbol) = symbol {
                return Some(Address::from_ptr(*symbol));
            }
        }
        None
    }
}

impl std::fmt::Debug for LoadedLibrary
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("LoadedLibrary").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Runtime addresses derived from an offset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSymbols
{
    base: Address,
    reference: Address,
    pointers: BTreeMap<InternalSymbol, Address>,
}

impl ResolvedSymbols
{
    /// Runtime base every offset is relative to.
    pub fn base(&self) -> Address
    {
        self.base
    }

    /// Runtime address of the reference symbol.
    pub fn reference(&self) -> Address
    {
        self.reference
    }

    /// Address of `symbol`, `None` when its offset was unavailable.
    pub fn get(&self, symbol: InternalSymbol) -> Option<Address>
    {
        self.pointers.get(&symbol).copied()
    }

    /// Address of a symbol a feature cannot work without.
    ///
    /// ## Errors
    ///
    /// `MissingSymbol` when the offset was unavailable.
    pub fn require(&self, symbol: InternalSymbol) -> ZdbResult<Address>
    {
        self.get(symbol).ok_or(ZdbError::MissingSymbol(symbol))
    }

    /// Every resolved symbol and its address.
    pub fn iter(&self) -> impl Iterator<Item = (InternalSymbol, Address)> + '_
    {
        self.pointers.iter().map(|(symbol, address)| (*symbol, *address))
    }

    /// Number of resolved symbols.
    pub fn len(&self) -> usize
    {
        self.pointers.len()
    }

    /// Whether nothing resolved.
    pub fn is_empty(&self) -> bool
    {
        self.pointers.is_empty()
    }
}

/// Compute runtime addresses for every available entry of `table`.
///
/// ## Errors
///
/// - `OffsetsInvalid`: the reference offset is zero or exceeds the reference address
/// - `ReferenceSymbolNotFound`: the anchor is not exported by `source`
pub fn resolve(source: &dyn SymbolSource, table: &OffsetTable) -> ZdbResult<ResolvedSymbols>
{
    if table.reference_offset() == 0 {
        return Err(ZdbError::OffsetsInvalid("reference offset is zero".to_string()));
    }

    let reference = source
        .lookup(table.reference_symbol())
        .ok_or_else(|| ZdbError::ReferenceSymbolNotFound(table.reference_symbol().to_string()))?;

    let base = reference.checked_sub(table.reference_offset()).ok_or_else(|| {
        ZdbError::OffsetsInvalid(format!(
            "reference offset 0x{:x} is larger than the reference address {reference}",
            table.reference_offset()
        ))
    })?;

    let mut pointers = BTreeMap::new();
    for entry in table.entries() {
        let Some(offset) = entry.offset else {
            tracing::debug!(symbol = %entry.symbol, "offset unavailable; leaving unresolved");
            continue;
        };
        match base.checked_add(offset) {
            Some(address) => {
                tracing::trace!(symbol = %entry.symbol, %address, "resolved");
                pointers.insert(entry.symbol, address);
            }
            None => tracing::warn!(symbol = %entry.symbol, "offset overflows the address space"),
        }
    }

    tracing::debug!(%base, %reference, resolved = pointers.len(), "resolved internal symbols");
    Ok(ResolvedSymbols {
        base,
        reference,
        pointers,
    })
}

/// Open `library_path` and resolve `table` against it.
///
/// The returned library must outlive every use of the returned addresses.
///
/// ## Errors
///
/// Everything [`LoadedLibrary::open`] and [`resolve`] return.
pub fn resolve_library(library_path: &Path, table: &OffsetTable) -> ZdbResult<(LoadedLibrary, ResolvedSymbols)>
{
    let library = LoadedLibrary::open(library_path)?;
    let resolved = resolve(&library, table)?;
    Ok((library, resolved))
}
