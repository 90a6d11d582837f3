//! # Plugin Bring-up
//!
//! Orchestrates loading: version detection, offset table, symbol resolution,
//! formatter registration and installation of the expression rewriter.
//!
//! Nothing here fails the plugin load. Every problem disables the feature it
//! affects and is recorded as a diagnostic in the returned [`PluginLoad`].
//!
//! The resulting [`PluginState`] lives in a process-wide cell and is never
//! dropped: LLDB keeps pointers into the library mapping, the summary wrappers
//! and the category.

use std::fmt;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::abi::{CategoryHandle, InternalApi};
use crate::config::PluginConfig;
use crate::error::{ZdbError, ZdbResult};
use crate::host::{HostDebugger, SummaryWrapper};
use crate::offsets;
use crate::registrar::{self, FormatterBackend, ZIG_FORMATTERS};
use crate::resolver::{self, LoadedLibrary, ResolvedSymbols, SymbolSource};
use crate::command::ExpressionCommand;
use crate::types::HostVersion;

/// Commands replaced by the rewriting evaluator.
pub const EXPRESSION_COMMANDS: [&str; 3] = ["expression", "p", "zig print"];

const EXPRESSION_HELP: &str = "Evaluate an expression, accepting Zig slice, optional and error union syntax.";

static STATE: OnceCell<PluginState> = OnceCell::new();

/// Class of a load-time problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind
{
    /// Offsets, library or a required entry are unavailable
    ConfigurationMissing,
    /// The offset table was captured from a different LLDB version
    VersionMismatch,
    /// Offsets could not be anchored in the running library
    SymbolResolutionFailure,
    /// No call adapter for this architecture
    UnsupportedArchitecture,
    /// A single formatter or command could not be installed
    Registration,
}

impl From<&ZdbError> for DiagnosticKind
{
    fn from(error: &ZdbError) -> Self
    {
        match error {
            e if e.is_configuration_missing() => Self::ConfigurationMissing,
            ZdbError::ReferenceSymbolNotFound(_) | ZdbError::OffsetsInvalid(_) => Self::SymbolResolutionFailure,
            ZdbError::UnsupportedArchitecture(_) => Self::UnsupportedArchitecture,
            ZdbError::InvalidPattern { .. }
            | ZdbError::SummaryRejected(_)
            | ZdbError::EvaluationFailed { .. }
            | ZdbError::InvalidCommand(_) => Self::Registration,
            _ => Self::ConfigurationMissing,
        }
    }
}

/// One load-time problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic
{
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// State of the internal API bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BridgeStatus
{
    #[default]
    NotAttempted,
    /// Offsets anchored; `resolved` internal functions available
    Ready
    {
        resolved: usize
    },
    /// The bridge is off for this session
    Disabled
    {
        kind: DiagnosticKind,
        reason: String,
    },
}

impl BridgeStatus
{
    pub fn is_ready(&self) -> bool
    {
        matches!(self, Self::Ready { .. })
    }
}

/// What the plugin load achieved.
#[derive(Debug, Clone, Default)]
pub struct PluginLoad
{
    pub version: Option<HostVersion>,
    pub bridge: BridgeStatus,
    pub formatters_registered: usize,
    pub category_enabled: bool,
    pub rewriter_installed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl PluginLoad
{
    /// Record `error` as a diagnostic.
    pub fn record(&mut self, error: &ZdbError)
    {
        self.note(DiagnosticKind::from(error), error.to_string());
    }

    /// Record a diagnostic.
    pub fn note(&mut self, kind: DiagnosticKind, message: impl Into<String>)
    {
        self.diagnostics.push(Diagnostic {
            kind,
            message: message.into(),
        });
    }

    /// Turn the bridge off because of `error`.
    fn disable(&mut self, error: &ZdbError)
    {
        warn!("internal API bridge disabled: {error}");
        self.bridge = BridgeStatus::Disabled {
            kind: DiagnosticKind::from(error),
            reason: error.to_string(),
        };
        self.record(error);
    }

    /// Whether a diagnostic of `kind` was recorded.
    pub fn has(&self, kind: DiagnosticKind) -> bool
    {
        self.diagnostics.iter().any(|diagnostic| diagnostic.kind == kind)
    }
}

impl fmt::Display for PluginLoad
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match &self.bridge {
            BridgeStatus::Ready { resolved } => write!(f, "bridge ready ({resolved} functions)")?,
            BridgeStatus::Disabled { reason, .. } => write!(f, "bridge disabled ({reason})")?,
            BridgeStatus::NotAttempted => f.write_str("bridge not attempted")?,
        }
        write!(
            f,
            ", {} formatters, rewriter {}",
            self.formatters_registered,
            if self.rewriter_installed { "on" } else { "off" }
        )
    }
}

/// Everything that must stay alive once registration has happened.
pub struct PluginState
{
    library: Option<LoadedLibrary>,
    symbols: ResolvedSymbols,
    wrappers: Vec<Box<dyn SummaryWrapper>>,
    category: Option<CategoryHandle>,
}

impl PluginState
{
    pub fn library(&self) -> Option<&LoadedLibrary>
    {
        self.library.as_ref()
    }

    pub fn symbols(&self) -> &ResolvedSymbols
    {
        &self.symbols
    }

    /// Number of summary wrappers held for LLDB.
    pub fn wrapper_count(&self) -> usize
    {
        self.wrappers.len()
    }

    pub fn category(&self) -> Option<&CategoryHandle>
    {
        self.category.as_ref()
    }
}

impl fmt::Debug for PluginState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("PluginState")
            .field("library", &self.library)
            .field("symbols", &self.symbols)
            .field("wrappers", &self.wrappers.len())
            .field("category", &self.category)
            .finish()
    }
}

/// The process-wide state, once the bridge has come up.
pub fn state() -> Option<&'static PluginState>
{
    STATE.get()
}

/// Store `state` for the rest of the process.
///
/// Returns `false` when state was already installed by an earlier load. The
/// rejected state is leaked rather than dropped: LLDB may already reference
/// its wrappers.
pub fn install_global(state: PluginState) -> bool
{
    match STATE.set(state) {
        Ok(()) => true,
        Err(rejected) => {
            warn!("plugin initialised twice; keeping the first state");
            // Dropping would close the library and free wrappers LLDB may still call into
            std::mem::forget(rejected);
            false
        }
    }
}

/// Bring the plugin up inside `host`.
pub fn initialize(host: &dyn HostDebugger, config: &PluginConfig) -> PluginLoad
{
    let (load, activated) = bring_up(host, config, LoadedLibrary::open);
    if let Some((mut state, library)) = activated {
        state.library = Some(library);
        install_global(state);
    }

    info!("zdb loaded: {load}");
    load
}

/// Every load step up to and including registration, with the library opener
/// supplied by the caller.
///
/// Returns the state to keep alive together with whatever `open` produced, or
/// `None` when the bridge was disabled before registration.
pub fn bring_up<S, F>(host: &dyn HostDebugger, config: &PluginConfig, open: F) -> (PluginLoad, Option<(PluginState, S)>)
where
    S: SymbolSource,
    F: FnOnce(&Path) -> ZdbResult<S>,
{
    let mut load = PluginLoad::default();

    let banner = host.version_banner();
    let version = match HostVersion::from_banner(&banner) {
        Ok(version) => version,
        Err(e) => {
            load.disable(&e);
            return (load, None);
        }
    };
    info!(%version, library = %config.library_path.display(), "zdb loading");
    load.version = Some(version.clone());

    let table = match offsets::load(&config.offsets, &config.library_path, &version) {
        Ok(table) => table,
        Err(e) => {
            load.disable(&e);
            return (load, None);
        }
    };
    if !table.version_matches(&version) {
        load.note(
            DiagnosticKind::VersionMismatch,
            format!("offset table is for LLDB {}, running {version}", table.version()),
        );
    }

    let resolved = open(&config.library_path).and_then(|source| Ok((resolver::resolve(&source, &table)?, source)));
    let (symbols, source) = match resolved {
        Ok(resolved) => resolved,
        Err(e) => {
            load.disable(&e);
            return (load, None);
        }
    };

    let mut backend = InternalApi::native(&symbols);
    let state = activate(host, config, symbols, &mut backend, &mut load);
    (load, Some((state, source)))
}

/// Register formatters and the rewriter against already resolved symbols.
///
/// The caller keeps the returned state alive for the rest of the process.
pub fn activate(
    host: &dyn HostDebugger,
    config: &PluginConfig,
    symbols: ResolvedSymbols,
    backend: &mut dyn FormatterBackend,
    load: &mut PluginLoad,
) -> PluginState
{
    load.bridge = BridgeStatus::Ready { resolved: symbols.len() };

    let mut wrappers = Vec::with_capacity(ZIG_FORMATTERS.len());
    let category = match registrar::register_all(backend, host, config.category, &ZIG_FORMATTERS, &mut wrappers) {
        Ok(report) => {
            load.formatters_registered = report.registered;
            load.category_enabled = report.category_enabled;
            for skipped in &report.skipped {
                load.record(&skipped.reason);
            }
            if !report.category_enabled {
                load.note(
                    DiagnosticKind::ConfigurationMissing,
                    "formatter category registered but not enabled",
                );
            }
            report.category
        }
        Err(e) => {
            warn!("no formatters registered: {e}");
            load.record(&e);
            None
        }
    };

    load.rewriter_installed = install_rewriter(host, config, load);

    PluginState {
        library: None,
        symbols,
        wrappers,
        category,
    }
}

fn install_rewriter(host: &dyn HostDebugger, config: &PluginConfig, load: &mut PluginLoad) -> bool
{
    let mut installed = false;
    for name in EXPRESSION_COMMANDS {
        let handler = Box::new(ExpressionCommand::new(config.evaluation_timeout));
        if host.register_command(name, EXPRESSION_HELP, handler) {
            installed = true;
        } else {
            warn!(command = name, "could not install expression override");
            load.note(DiagnosticKind::Registration, format!("command '{name}' not installed"));
        }
    }
    installed
}
