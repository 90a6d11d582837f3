//! # Indirect Call Adapter
//!
//! Calls into LLDB's internal C++ functions through raw addresses.
//!
//! Nothing here is checked by the compiler: the function signatures are
//! reconstructed from the mangled names and the target's C++ ABI. If a signature
//! is wrong the host process corrupts memory or crashes; no error comes back.
//! That risk is accepted and contained by only ever calling these functions with
//! an offset table captured from the exact LLDB build that is running.
//!
//! ## ABI rules encoded here
//!
//! - `llvm::StringRef` (`{ const char*, size_t }`) is trivially copyable and is
//!   passed as two scalar arguments.
//! - `std::shared_ptr<T>` (`{ T*, control_block* }`) has a non-trivial
//!   destructor, so the Itanium C++ ABI passes it *indirectly*: the caller
//!   materialises the two words in its own memory and passes a pointer, even
//!   though 16 bytes would otherwise fit in registers.
//! - Member functions take `this` as the first argument.
//!
//! Those rules are per-architecture facts. Each supported target gets its own
//! adapter module, selected at build time; every other target gets an adapter
//! that refuses to call anything.
//!
//! ## References
//!
//! - [Itanium C++ ABI: non-trivial parameters](https://itanium-cxx-abi.github.io/cxx-abi/abi.html#non-trivial-parameters)
//! - [AAPCS64](https://github.com/ARM-software/abi-aa/blob/main/aapcs64/aapcs64.rst)
//! - [System V AMD64 psABI](https://gitlab.com/x86-psABIs/x86-64-ABI)

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(all(target_arch = "x86_64", not(target_env = "msvc")))]
pub mod x86_64;

#[cfg(not(any(target_arch = "aarch64", all(target_arch = "x86_64", not(target_env = "msvc")))))]
pub mod unsupported;

use std::ffi::{c_void, CStr};
use std::ptr::{self, NonNull};

use crate::error::{ZdbError, ZdbResult};
use crate::offsets::InternalSymbol;
use crate::registrar::FormatterBackend;
use crate::resolver::ResolvedSymbols;
use crate::types::Address;

#[cfg(target_arch = "aarch64")]
pub use aarch64::Aarch64Adapter as NativeAdapter;
#[cfg(not(any(target_arch = "aarch64", all(target_arch = "x86_64", not(target_env = "msvc")))))]
pub use unsupported::UnsupportedAdapter as NativeAdapter;
#[cfg(all(target_arch = "x86_64", not(target_env = "msvc")))]
pub use x86_64::SysVAdapter as NativeAdapter;

/// In-memory layout of `std::shared_ptr<T>` in libc++ and libstdc++.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedPtrLayout
{
    /// Pointer to the managed object
    pub ptr: *mut c_void,
    /// Pointer to the control block holding the reference counts
    pub ctrl: *mut c_void,
}

impl SharedPtrLayout
{
    /// An empty `shared_ptr`.
    pub const NULL: Self = Self {
        ptr: ptr::null_mut(),
        ctrl: ptr::null_mut(),
    };

    /// Whether the managed pointer is null.
    pub fn is_null(&self) -> bool
    {
        self.ptr.is_null()
    }
}

impl Default for SharedPtrLayout
{
    fn default() -> Self
    {
        Self::NULL
    }
}

/// `lldb::FormatterMatchType`
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind
{
    /// Type name must equal the pattern
    Exact = 0,
    /// Pattern is a regular expression over the type name
    Regex = 1,
}

impl MatchKind
{
    /// Raw enum value passed to LLDB.
    pub const fn raw(self) -> libc::c_int
    {
        self as libc::c_int
    }
}

/// A formatter category owned by LLDB.
///
/// Holds the two words LLDB wrote into our out-parameter. The reference they
/// represent is never released, which keeps the category alive for the rest of
/// the process. Only the raw `TypeCategoryImpl*` is handed to member functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryHandle
{
    name: &'static CStr,
    shared: SharedPtrLayout,
}

// SAFETY: the handle is created and used on the host's command thread only; the
// process-wide state that stores it is written once before any reentrant call.
unsafe impl Send for CategoryHandle {}
// SAFETY: see `Send`; the handle is never mutated after creation.
unsafe impl Sync for CategoryHandle {}

impl CategoryHandle
{
    /// Wrap a `shared_ptr<TypeCategoryImpl>` received from LLDB.
    ///
    /// Returns `None` for an empty pointer.
    pub fn new(name: &'static CStr, shared: SharedPtrLayout) -> Option<Self>
    {
        (!shared.is_null()).then_some(Self { name, shared })
    }

    /// Category name.
    pub fn name(&self) -> &'static CStr
    {
        self.name
    }

    /// `TypeCategoryImpl*`, the `this` argument for member calls.
    pub fn implementation(&self) -> *mut c_void
    {
        self.shared.ptr
    }

    /// The full `shared_ptr` words.
    pub fn shared(&self) -> &SharedPtrLayout
    {
        &self.shared
    }
}

/// Borrow the `shared_ptr` inside a public wrapper object such as `SBTypeSummary`.
///
/// The public API classes hold exactly one member, `m_opaque_sp`, so the
/// wrapper's address is also the address of its `shared_ptr`. This is a layout
/// assumption about the host's headers: if a future release adds a field the
/// reinterpretation silently reads garbage. It has to be rechecked for every
/// LLDB version an offset table is published for.
///
/// # Safety
///
/// `wrapper` must point to a live public wrapper object whose first and only
/// member is a `std::shared_ptr`.
pub unsafe fn extract_handle(wrapper: NonNull<c_void>) -> NonNull<SharedPtrLayout>
{
    wrapper.cast::<SharedPtrLayout>()
}

/// The calling convention used to reach LLDB's internals on one architecture.
///
/// Every method is `unsafe`: `func` must be the runtime address of the named
/// internal function in the running LLDB, and the signature must match that
/// build. Violations are undefined behaviour that cannot be detected.
pub trait CallAdapter: Send + Sync
{
    /// Short name of the ABI, for diagnostics.
    const ABI: &'static str;

    /// `DataVisualization::Categories::GetCategory(ConstString, TypeCategoryImplSP&, bool)`
    ///
    /// # Safety
    ///
    /// See the trait documentation. `name` must live forever: LLDB may keep the
    /// pointer as the category's name.
    unsafe fn get_category(
        &self,
        func: Address,
        name: &'static CStr,
        out: &mut SharedPtrLayout,
        can_create: bool,
    ) -> ZdbResult<()>;

    /// `DataVisualization::Categories::Enable(const TypeCategoryImplSP&, uint32_t)`
    ///
    /// # Safety
    ///
    /// See the trait documentation.
    unsafe fn enable_category(&self, func: Address, category: &SharedPtrLayout, position: u32) -> ZdbResult<()>;

    /// `TypeCategoryImpl::AddTypeSummary(StringRef, FormatterMatchType, TypeSummaryImplSP)`
    ///
    /// The `shared_ptr` argument is passed by hidden pointer. The callee may move
    /// out of `summary`, leaving it null.
    ///
    /// # Safety
    ///
    /// See the trait documentation. `category` must be a live `TypeCategoryImpl*`.
    unsafe fn add_type_summary(
        &self,
        func: Address,
        category: *mut c_void,
        pattern: &str,
        kind: MatchKind,
        summary: &mut SharedPtrLayout,
    ) -> ZdbResult<()>;
}

/// Formatter backend that drives LLDB's internal functions directly.
#[derive(Debug)]
pub struct InternalApi<A = NativeAdapter>
{
    get_category: Option<Address>,
    enable: Option<Address>,
    add_type_summary: Option<Address>,
    adapter: A,
}

impl InternalApi<NativeAdapter>
{
    /// Backend for the architecture this crate was built for.
    pub fn native(symbols: &ResolvedSymbols) -> Self
    {
        Self::with_adapter(symbols, NativeAdapter::default())
    }
}

impl<A: CallAdapter> InternalApi<A>
{
    /// Backend using an explicit adapter.
    pub fn with_adapter(symbols: &ResolvedSymbols, adapter: A) -> Self
    {
        Self {
            get_category: symbols.get(InternalSymbol::GetCategory),
            enable: symbols.get(InternalSymbol::EnableCategory),
            add_type_summary: symbols.get(InternalSymbol::AddTypeSummary),
            adapter,
        }
    }
}

impl<A: CallAdapter> FormatterBackend for InternalApi<A>
{
    fn check_required(&self) -> ZdbResult<()>
    {
        self.get_category.ok_or(ZdbError::MissingSymbol(InternalSymbol::GetCategory))?;
        self.add_type_summary
            .ok_or(ZdbError::MissingSymbol(InternalSymbol::AddTypeSummary))?;
        Ok(())
    }

    fn category(&mut self, name: &'static CStr) -> ZdbResult<CategoryHandle>
    {
        let func = self
            .get_category
            .ok_or(ZdbError::MissingSymbol(InternalSymbol::GetCategory))?;
        let mut out = SharedPtrLayout::NULL;

        // SAFETY: `func` came from an offset table for this LLDB build. A wrong
        // table is the accepted ABI-mismatch risk and cannot be detected here.
        unsafe { self.adapter.get_category(func, name, &mut out, true)? };

        CategoryHandle::new(name, out).ok_or_else(|| ZdbError::CategoryUnavailable(name.to_string_lossy().into_owned()))
    }

    fn add_summary(
        &mut self,
        category: &CategoryHandle,
        pattern: &str,
        kind: MatchKind,
        summary: NonNull<SharedPtrLayout>,
    ) -> ZdbResult<()>
    {
        let func = self
            .add_type_summary
            .ok_or(ZdbError::MissingSymbol(InternalSymbol::AddTypeSummary))?;

        // Caller-allocated temporary for the by-value shared_ptr. Its words are a
        // copy of the wrapper's, without a reference count increment: whatever
        // the callee takes ownership of is backed by the wrapper's reference, so
        // the wrapper must never be destroyed.
        // SAFETY: `summary` points into a live wrapper held by the caller.
        let mut temporary = unsafe { *summary.as_ptr() };

        // SAFETY: as for `category`. `implementation()` is non-null by construction.
        unsafe {
            self.adapter
                .add_type_summary(func, category.implementation(), pattern, kind, &mut temporary)
        }
    }

    fn enable(&mut self, category: &CategoryHandle) -> ZdbResult<()>
    {
        let func = self
            .enable
            .ok_or(ZdbError::MissingSymbol(InternalSymbol::EnableCategory))?;

        // SAFETY: as for `category`.
        unsafe { self.adapter.enable_category(func, category.shared(), 0) }
    }

    fn describe(&self) -> &'static str
    {
        A::ABI
    }
}
