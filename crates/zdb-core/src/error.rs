//! # Error Types
//!
//! Error handling for the internal API bridge.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! None of these errors are allowed to escape into the host debugger: the plugin
//! entry point turns every one of them into a disabled feature plus a diagnostic.

use std::path::PathBuf;

use thiserror::Error;

use crate::offsets::InternalSymbol;

/// Main error type for bridge operations
///
/// ## Error Categories
///
/// 1. **Configuration errors**: OffsetsNotFound, LibraryOpen, MissingSymbol, CategoryUnavailable
/// 2. **Offset table errors**: OffsetsParse, OffsetsInvalid
/// 3. **Resolution errors**: ReferenceSymbolNotFound
/// 4. **Platform errors**: UnsupportedArchitecture
/// 5. **Registration errors**: InvalidPattern, SummaryRejected
/// 6. **Evaluation errors**: EvaluationFailed, InvalidCommand, VersionUnparseable
/// 7. **I/O errors**: Io
#[derive(Error, Debug)]
pub enum ZdbError
{
    /// No offset description exists for the running debugger version
    ///
    /// Every location in the search order was tried. The operator fixes this by
    /// generating a table for their LLDB build and pointing `ZDB_OFFSETS_FILE` or
    /// `ZDB_OFFSETS_DIR` at it.
    #[error("No offset file found for LLDB {version} (searched: {})", display_paths(.searched))]
    OffsetsNotFound
    {
        /// Version string the file name was derived from
        version: String,
        /// Every candidate path, in search order
        searched: Vec<PathBuf>,
    },

    /// The offset description is not valid JSON or has the wrong top-level shape
    #[error("Failed to parse offset file {path}: {reason}")]
    OffsetsParse
    {
        /// File that failed to parse
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// The offset description parsed but cannot anchor any symbol
    ///
    /// Raised for a zero or missing reference offset, or when the reference
    /// offset is larger than the reference symbol's runtime address.
    #[error("Invalid offset table: {0}")]
    OffsetsInvalid(String),

    /// The host library could not be opened
    #[error("Failed to open {path}: {reason}")]
    LibraryOpen
    {
        /// Library path handed to the loader
        path: PathBuf,
        /// Loader message
        reason: String,
    },

    /// The exported anchor symbol is not in the loaded library
    ///
    /// This almost always means the offset table belongs to a different build of
    /// the library.
    #[error("Reference symbol not found: {0}")]
    ReferenceSymbolNotFound(String),

    /// A feature needs an internal symbol whose offset is unavailable
    #[error("Missing required offset for {0}")]
    MissingSymbol(InternalSymbol),

    /// The formatter category could not be created or fetched
    #[error("Formatter category '{0}' unavailable")]
    CategoryUnavailable(String),

    /// No call adapter exists for the architecture this crate was built for
    #[error("No internal call adapter for target architecture {0}")]
    UnsupportedArchitecture(&'static str),

    /// A formatter type pattern is not a valid regular expression
    #[error("Invalid type pattern {pattern}: {reason}")]
    InvalidPattern
    {
        /// The rejected pattern
        pattern: String,
        /// Regex compiler message
        reason: String,
    },

    /// The host refused to create a summary wrapper object
    #[error("Host refused summary '{0}'")]
    SummaryRejected(String),

    /// The version banner does not contain a dotted version number
    #[error("Could not parse LLDB version from '{0}'")]
    VersionUnparseable(String),

    /// Both the rewritten and the original expression failed to evaluate
    ///
    /// The message is the evaluator's message for the original expression, so
    /// the user sees the same error plain passthrough would have produced.
    #[error("{message}")]
    EvaluationFailed
    {
        /// Expression as typed by the user
        expression: String,
        /// Evaluator message
        message: String,
    },

    /// An `expression` command line could not be parsed
    #[error("{0}")]
    InvalidCommand(String),

    /// I/O error (for file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZdbError
{
    /// Whether this error means "the operator has not configured this feature".
    ///
    /// These are reported as configuration diagnostics rather than failures.
    #[must_use]
    pub fn is_configuration_missing(&self) -> bool
    {
        matches!(
            self,
            Self::OffsetsNotFound { .. }
                | Self::LibraryOpen { .. }
                | Self::MissingSymbol(_)
                | Self::CategoryUnavailable(_)
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String
{
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

/// Convenience type alias for `Result<T, ZdbError>`
///
/// ```rust
/// use zdb_core::error::ZdbResult;
/// fn foo() -> ZdbResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type ZdbResult<T> = std::result::Result<T, ZdbError>;
