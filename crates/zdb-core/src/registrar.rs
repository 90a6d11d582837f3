//! # Formatter Registrar
//!
//! Installs the Zig summary formatters into LLDB's `zig` category.
//!
//! The public API can create a summary object with a native callback but cannot
//! attach it to a regex pattern, so each one is created publicly, its
//! `shared_ptr` is pulled out of the wrapper, and the internal
//! `TypeCategoryImpl::AddTypeSummary` is called with it.
//!
//! LLDB resolves overlapping regex formatters by taking the one registered
//! last. [`ZIG_FORMATTERS`] is therefore ordered from the most generic pattern
//! to the most specific.

use std::ffi::CStr;
use std::ptr::NonNull;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::abi::{extract_handle, CategoryHandle, MatchKind, SharedPtrLayout};
use crate::error::{ZdbError, ZdbResult};
use crate::host::{HostDebugger, SummaryFn, SummaryWrapper};
use crate::summaries;

/// Name of the category the formatters are installed into.
pub const ZIG_CATEGORY: &CStr = c"zig";

/// One entry of the registration plan.
#[derive(Debug, Clone, Copy)]
pub struct FormatterSpec
{
    /// Type-name pattern
    pub pattern: &'static str,
    /// How `pattern` is matched
    pub match_kind: MatchKind,
    /// Summary callback
    pub callback: SummaryFn,
    /// Human-readable name
    pub description: &'static str,
}

const fn zig(pattern: &'static str, callback: SummaryFn, description: &'static str) -> FormatterSpec
{
    FormatterSpec {
        pattern,
        match_kind: MatchKind::Regex,
        callback,
        description,
    }
}

/// Registration plan, generic to specific.
pub static ZIG_FORMATTERS: [FormatterSpec; 19] = [
    zig(r"^[a-z_][a-z0-9_]*\.[A-Z][A-Za-z0-9_]*$", summaries::structure, "Zig struct/enum"),
    zig(r"^[A-Z][A-Za-z0-9_]*$", summaries::structure, "Zig type"),
    zig(r"^\[.*\].*$", summaries::array, "Zig array"),
    zig(r"^\[\].*$", summaries::slice, "Zig slice"),
    zig(r"^\?.*$", summaries::optional, "Zig optional"),
    zig(r"^.*!.*$", summaries::error_union, "Zig error union"),
    zig(r"^union\(.*\)$", summaries::tagged_union, "Zig tagged union"),
    zig(r"^\*.*$", summaries::pointer, "Zig pointer"),
    zig(r"^\[\*\].*$", summaries::pointer, "Zig many pointer"),
    zig(r"^\[\*:.*\].*$", summaries::pointer, "Zig sentinel pointer"),
    zig(r"^array_list\..*$", summaries::array_list, "Zig ArrayList"),
    zig(r"^hash_map\..*$", summaries::hash_map, "Zig HashMap"),
    zig(r"^bounded_array\..*$", summaries::bounded_array, "Zig BoundedArray"),
    zig(r"^multi_array_list\..*$", summaries::multi_array_list, "Zig MultiArrayList"),
    zig(r"^segmented_list\..*$", summaries::segmented_list, "Zig SegmentedList"),
    zig(r"^\[\*:0\]u8$", summaries::c_string, "Zig C string"),
    zig(r"^\[\*:0\]const u8$", summaries::c_string, "Zig const C string"),
    zig(r"^\[\]const u8$", summaries::string, "Zig const string"),
    zig(r"^\[\]u8$", summaries::string, "Zig string"),
];

/// The operations the registrar needs from LLDB's internals.
///
/// Implemented by [`crate::abi::InternalApi`] for the running host, and by
/// in-memory fakes in tests.
pub trait FormatterBackend
{
    /// Fail if an entry that registration cannot do without is unavailable.
    fn check_required(&self) -> ZdbResult<()>;

    /// Get or create the category called `name`.
    fn category(&mut self, name: &'static CStr) -> ZdbResult<CategoryHandle>;

    /// Attach `summary` to `pattern` in `category`.
    fn add_summary(
        &mut self,
        category: &CategoryHandle,
        pattern: &str,
        kind: MatchKind,
        summary: NonNull<SharedPtrLayout>,
    ) -> ZdbResult<()>;

    /// Enable `category` at the highest priority.
    fn enable(&mut self, category: &CategoryHandle) -> ZdbResult<()>;

    /// ABI description, for diagnostics.
    fn describe(&self) -> &'static str;
}

/// A formatter that was left out.
#[derive(Debug)]
pub struct SkippedFormatter
{
    pub pattern: &'static str,
    pub reason: ZdbError,
}

/// Outcome of [`register_all`].
#[derive(Debug, Default)]
pub struct RegistrationReport
{
    pub registered: usize,
    pub skipped: Vec<SkippedFormatter>,
    pub category_enabled: bool,
    pub category: Option<CategoryHandle>,
}

/// Register every formatter in `formatters`, in order.
///
/// Wrappers are pushed onto `durable`, which must outlive every use of the
/// category: LLDB holds pointers into them. Individual formatters that fail are
/// skipped and reported. An error is returned only when nothing can be
/// registered at all.
pub fn register_all(
    backend: &mut dyn FormatterBackend,
    host: &dyn HostDebugger,
    category_name: &'static CStr,
    formatters: &[FormatterSpec],
    durable: &mut Vec<Box<dyn SummaryWrapper>>,
) -> ZdbResult<RegistrationReport>
{
    backend.check_required()?;
    let category = backend.category(category_name)?;
    debug!(
        category = %category_name.to_string_lossy(),
        abi = backend.describe(),
        "formatter category acquired"
    );

    let mut report = RegistrationReport {
        category: Some(category),
        ..RegistrationReport::default()
    };

    for (index, formatter) in formatters.iter().enumerate() {
        match register_one(backend, host, &category, index, formatter, durable) {
            Ok(()) => report.registered += 1,
            Err(reason) => {
                warn!(pattern = formatter.pattern, %reason, "formatter skipped");
                report.skipped.push(SkippedFormatter {
                    pattern: formatter.pattern,
                    reason,
                });
            }
        }
    }

    match backend.enable(&category) {
        Ok(()) => report.category_enabled = true,
        Err(e) => warn!(error = %e, "category populated but left disabled"),
    }

    info!(
        registered = report.registered,
        skipped = report.skipped.len(),
        enabled = report.category_enabled,
        "zig formatters registered"
    );
    Ok(report)
}

fn register_one(
    backend: &mut dyn FormatterBackend,
    host: &dyn HostDebugger,
    category: &CategoryHandle,
    index: usize,
    formatter: &FormatterSpec,
    durable: &mut Vec<Box<dyn SummaryWrapper>>,
) -> ZdbResult<()>
{
    if formatter.match_kind == MatchKind::Regex {
        Regex::new(formatter.pattern).map_err(|e| ZdbError::InvalidPattern {
            pattern: formatter.pattern.to_string(),
            reason: e.to_string(),
        })?;
    }

    let wrapper = host
        .create_summary(index, formatter)
        .ok_or_else(|| ZdbError::SummaryRejected(formatter.pattern.to_string()))?;

    // SAFETY: `wrapper_ptr` is the address of a live `SBTypeSummary`.
    let handle = unsafe { extract_handle(wrapper.wrapper_ptr()) };
    let result = backend.add_summary(category, formatter.pattern, formatter.match_kind, handle);

    // Kept even on failure: the callee may already hold the implementation.
    durable.push(wrapper);
    result
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::offsets::InternalSymbol;
    use crate::testing::{FakeCategory, FakeHost};

    fn winner(category: &FakeCategory, type_name: &str) -> Option<&'static str>
    {
        category
            .lookup(type_name)
            .map(|index| ZIG_FORMATTERS[index].description)
    }

    #[test]
    fn test_plan_patterns_compile()
    {
        for formatter in &ZIG_FORMATTERS {
            assert!(Regex::new(formatter.pattern).is_ok(), "{}", formatter.pattern);
        }
    }

    #[test]
    fn test_registers_whole_plan()
    {
        let mut category = FakeCategory::default();
        let mut durable = Vec::new();
        let report = register_all(&mut category, &FakeHost::default(), ZIG_CATEGORY, &ZIG_FORMATTERS, &mut durable).unwrap();

        assert_eq!(report.registered, 19);
        assert!(report.skipped.is_empty());
        assert!(report.category_enabled);
        assert!(category.enabled);
        assert_eq!(durable.len(), 19);
        assert!(category.entries.iter().all(|(_, kind, _)| *kind == MatchKind::Regex));
    }

    #[test]
    fn test_specific_formatter_wins()
    {
        let mut category = FakeCategory::default();
        let mut durable = Vec::new();
        register_all(&mut category, &FakeHost::default(), ZIG_CATEGORY, &ZIG_FORMATTERS, &mut durable).unwrap();

        assert_eq!(winner(&category, "[]const u8"), Some("Zig const string"));
        assert_eq!(winner(&category, "[]u8"), Some("Zig string"));
        assert_eq!(winner(&category, "[]u32"), Some("Zig slice"));
        assert_eq!(winner(&category, "[4]u32"), Some("Zig array"));
        assert_eq!(winner(&category, "[*:0]u8"), Some("Zig C string"));
        assert_eq!(winner(&category, "[*:0]u32"), Some("Zig sentinel pointer"));
        assert_eq!(winner(&category, "[*]u8"), Some("Zig many pointer"));
        assert_eq!(winner(&category, "?u32"), Some("Zig optional"));
        assert_eq!(winner(&category, "anyerror!u32"), Some("Zig error union"));
        assert_eq!(winner(&category, "array_list.ArrayListAligned(u8,null)"), Some("Zig ArrayList"));
        assert_eq!(winner(&category, "main.Point"), Some("Zig struct/enum"));
        assert_eq!(winner(&category, "u32"), None);
    }

    #[test]
    fn test_reverse_order_loses_specificity()
    {
        let mut reversed = ZIG_FORMATTERS.to_vec();
        reversed.reverse();

        let mut category = FakeCategory::default();
        let mut durable = Vec::new();
        register_all(&mut category, &FakeHost::default(), ZIG_CATEGORY, &reversed, &mut durable).unwrap();

        // Indices now refer to `reversed`; "[]const u8" falls to the generic array entry.
        let index = category.lookup("[]const u8").unwrap();
        assert_eq!(reversed[index].description, "Zig array");
    }

    #[test]
    fn test_missing_add_summary_registers_nothing()
    {
        let mut category = FakeCategory {
            missing: Some(InternalSymbol::AddTypeSummary),
            ..FakeCategory::default()
        };
        let mut durable = Vec::new();
        let err = register_all(&mut category, &FakeHost::default(), ZIG_CATEGORY, &ZIG_FORMATTERS, &mut durable).unwrap_err();

        assert!(err.is_configuration_missing());
        assert!(category.entries.is_empty());
        assert!(durable.is_empty());
    }

    #[test]
    fn test_missing_enable_leaves_category_disabled()
    {
        let mut category = FakeCategory {
            missing: Some(InternalSymbol::EnableCategory),
            ..FakeCategory::default()
        };
        let mut durable = Vec::new();
        let report = register_all(&mut category, &FakeHost::default(), ZIG_CATEGORY, &ZIG_FORMATTERS, &mut durable).unwrap();

        assert_eq!(report.registered, 19);
        assert!(!report.category_enabled);
    }

    #[test]
    fn test_bad_pattern_and_refused_wrapper_are_skipped()
    {
        let plan = [
            zig(r"^[unclosed$", summaries::slice, "broken"),
            zig(r"^\[\].*$", summaries::slice, "Zig slice"),
            zig(r"^\?.*$", summaries::optional, "Zig optional"),
        ];
        let mut category = FakeCategory::default();
        let mut durable = Vec::new();
        let host = FakeHost::default().refusing(2);
        let report = register_all(&mut category, &host, ZIG_CATEGORY, &plan, &mut durable).unwrap();

        assert_eq!(report.registered, 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(matches!(report.skipped[0].reason, ZdbError::InvalidPattern { .. }));
        assert!(matches!(report.skipped[1].reason, ZdbError::SummaryRejected(_)));
        assert_eq!(durable.len(), 1);
    }
}
