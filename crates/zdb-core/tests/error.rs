//! Tests for error handling

use std::path::PathBuf;

use zdb_core::error::{ZdbError, ZdbResult};
use zdb_core::InternalSymbol;

#[test]
fn test_offsets_not_found_lists_every_path()
{
    let error = ZdbError::OffsetsNotFound {
        version: "21.1.7".to_string(),
        searched: vec![
            PathBuf::from("/home/dev/.config/zdb/offsets/lldb-21.1.7.json"),
            PathBuf::from("/usr/local/share/zdb/offsets/lldb-21.1.7.json"),
        ],
    };
    let message = format!("{}", error);
    assert!(message.contains("21.1.7"));
    assert!(message.contains("/home/dev/.config/zdb/offsets/lldb-21.1.7.json"));
    assert!(message.contains("/usr/local/share/zdb/offsets/lldb-21.1.7.json"));
}

#[test]
fn test_missing_symbol_names_the_function()
{
    let error = ZdbError::MissingSymbol(InternalSymbol::AddTypeSummary);
    let message = format!("{}", error);
    assert!(message.contains("TypeCategoryImpl::AddTypeSummary"));
}

#[test]
fn test_evaluation_failed_shows_evaluator_message()
{
    let error = ZdbError::EvaluationFailed {
        expression: "xs[9]".to_string(),
        message: "error: subscripted value is not an array".to_string(),
    };
    assert_eq!(error.to_string(), "error: subscripted value is not an array");
}

#[test]
fn test_configuration_missing_classification()
{
    assert!(ZdbError::MissingSymbol(InternalSymbol::GetCategory).is_configuration_missing());
    assert!(ZdbError::CategoryUnavailable("zig".to_string()).is_configuration_missing());
    assert!(ZdbError::LibraryOpen {
        path: PathBuf::from("liblldb.so"),
        reason: "not found".to_string(),
    }
    .is_configuration_missing());
    assert!(!ZdbError::ReferenceSymbolNotFound("_ZN4lldb10SBDebugger10InitializeEv".to_string())
        .is_configuration_missing());
    assert!(!ZdbError::UnsupportedArchitecture("riscv64").is_configuration_missing());
}

#[test]
fn test_io_error_conversion()
{
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let error: ZdbError = io.into();

    match error {
        ZdbError::Io(_) => {
            // Expected: io::Error converts through #[from]
        }
        _ => panic!("Expected Io variant"),
    }
}

#[test]
fn test_result_alias()
{
    fn fails() -> ZdbResult<u32>
    {
        Err(ZdbError::VersionUnparseable("lldb".to_string()))
    }

    assert!(fails().is_err());
}
