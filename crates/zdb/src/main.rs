use std::path::{Path, PathBuf};
use std::process::{self, Command};

use clap::{Parser, Subcommand};
use zdb_core::abi::{CallAdapter, NativeAdapter};
use zdb_core::offsets::verify::EntryStatus;
use zdb_core::offsets::{self, verify};
use zdb_core::resolver::resolve_library;
use zdb_core::rewriter::rewrite;
use zdb_core::{HostVersion, InternalSymbol, OffsetTable, PluginConfig, ZdbResult, ZIG_FORMATTERS};
use zdb_utils::logging::init_with;
use zdb_utils::{info, LogConfig, LogLevel};

mod frame;

use frame::{DeclaredFrame, Shape};

/// Inspect, verify and preview the zdb LLDB bridge for Zig programs.
#[derive(Parser, Debug)]
#[command(name = "zdb")]
#[command(version)]
#[command(about = "Inspect, verify and preview the zdb LLDB bridge for Zig programs", long_about = None)]
struct Cli
{
    /// LLDB shared library (default: ZDB_LLDB_PATH, then the platform default)
    #[arg(long, global = true)]
    lldb: Option<PathBuf>,
    /// LLDB version to select offsets for (default: `lldb --version`)
    #[arg(long = "lldb-version", global = true)]
    lldb_version: Option<String>,
    /// Offset description to use instead of searching
    #[arg(long, global = true)]
    offsets: Option<PathBuf>,
    /// Log level, overriding RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Show every place an offset description is searched for
    Locate,
    /// Print the entries of an offset description
    Inspect
    {
        /// Description file (default: the one `locate` finds)
        file: Option<PathBuf>,
    },
    /// Compare an offset description against the library's symbol table
    Verify,
    /// Load the library and print the runtime address of every entry
    Resolve,
    /// List the Zig formatters in registration order
    Formatters,
    /// Show how an expression would be rewritten, given variable shapes
    Rewrite
    {
        /// Expression in Zig syntax
        expression: String,
        /// Variables that are slices
        #[arg(long = "slice", value_name = "NAME")]
        slices: Vec<String>,
        /// Variables that are ArrayLists
        #[arg(long = "list", value_name = "NAME")]
        lists: Vec<String>,
        /// Variables that are optionals
        #[arg(long = "optional", value_name = "NAME")]
        optionals: Vec<String>,
        /// Variables that are error unions
        #[arg(long = "error-union", value_name = "NAME")]
        error_unions: Vec<String>,
    },
}

fn main()
{
    let cli = Cli::parse();

    // Logs go to stderr so reports can be piped
    let config = LogConfig {
        level: cli.log_level,
        ..LogConfig::from_env()
    };
    let _guard = match init_with(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    match run_command(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Returns `false` when the command ran but found a problem.
fn run_command(cli: Cli) -> ZdbResult<bool>
{
    let mut config = PluginConfig::from_env();
    if let Some(lldb) = &cli.lldb {
        config.library_path.clone_from(lldb);
    }
    if let Some(file) = &cli.offsets {
        config.offsets.explicit_file = Some(file.clone());
    }

    match cli.command {
        Commands::Locate => {
            let version = host_version(cli.lldb_version.as_deref())?;
            println!("Offset search for LLDB {version}:");
            let mut found = false;
            for candidate in config.offsets.candidates(&version) {
                let marker = if !found && candidate.is_file() {
                    found = true;
                    "use"
                } else if candidate.is_file() {
                    "shadowed"
                } else {
                    "missing"
                };
                println!("  [{marker:>8}] {}", candidate.display());
            }
            Ok(found)
        }
        Commands::Inspect { file } => {
            let table = match file {
                Some(path) => OffsetTable::from_file(&path)?,
                None => load_table(&config, cli.lldb_version.as_deref())?,
            };
            print_table(&table);
            Ok(true)
        }
        Commands::Verify => {
            let table = load_table(&config, cli.lldb_version.as_deref())?;
            info!("Verifying {} against {}", describe_source(&table), config.library_path.display());
            let report = verify(&table, &config.library_path)?;

            println!("Reference symbol at 0x{:x} in {}", report.reference_address, config.library_path.display());
            for (symbol, status) in &report.entries {
                println!("  {:<48} {}", symbol.key(), describe_status(status));
            }
            Ok(!report.has_mismatches())
        }
        Commands::Resolve => {
            let table = load_table(&config, cli.lldb_version.as_deref())?;
            let (library, symbols) = resolve_library(&config.library_path, &table)?;

            println!("Library:   {}", library.path().display());
            println!("Reference: {} ({})", symbols.reference(), table.reference_symbol());
            println!("Base:      {}", symbols.base());
            println!("Call ABI:  {}", NativeAdapter::ABI);
            for symbol in InternalSymbol::ALL {
                match symbols.get(symbol) {
                    Some(address) => println!("  {:<48} {address}", symbol.key()),
                    None => println!("  {:<48} unavailable", symbol.key()),
                }
            }
            Ok(true)
        }
        Commands::Formatters => {
            println!("Registered generic to specific; the last match wins.");
            for (index, formatter) in ZIG_FORMATTERS.iter().enumerate() {
                println!("  {:>2}. {:<20} {}", index + 1, formatter.description, formatter.pattern);
            }
            Ok(true)
        }
        Commands::Rewrite {
            expression,
            slices,
            lists,
            optionals,
            error_unions,
        } => {
            let mut frame = DeclaredFrame::default();
            frame.declare(&slices, Shape::Slice);
            frame.declare(&lists, Shape::List);
            frame.declare(&optionals, Shape::Optional);
            frame.declare(&error_unions, Shape::ErrorUnion);

            let rewritten = rewrite(&expression, &frame);
            if rewritten == expression {
                println!("{expression}  (unchanged)");
            } else {
                println!("{rewritten}");
            }
            Ok(true)
        }
    }
}

fn load_table(config: &PluginConfig, version: Option<&str>) -> ZdbResult<OffsetTable>
{
    let version = host_version(version)?;
    offsets::load(&config.offsets, &config.library_path, &version)
}

/// Version from the flag, else from the `lldb` on `PATH`.
fn host_version(explicit: Option<&str>) -> ZdbResult<HostVersion>
{
    if let Some(version) = explicit {
        return version.parse();
    }

    let output = Command::new("lldb").arg("--version").output()?;
    let banner = String::from_utf8_lossy(&output.stdout);
    HostVersion::from_banner(banner.trim()).map_err(|e| {
        eprintln!("Note: pass --lldb-version when lldb is not on PATH.");
        e
    })
}

fn print_table(table: &OffsetTable)
{
    println!("Offset table: {}", describe_source(table));
    println!("  LLDB version:     {}", table.version());
    println!("  Reference symbol: {}", table.reference_symbol());
    println!("  Reference offset: 0x{:x}", table.reference_offset());
    for symbol in InternalSymbol::ALL {
        match table.entry(symbol).and_then(|entry| entry.offset) {
            Some(offset) => println!("  {:<48} 0x{offset:x}", symbol.key()),
            None => println!("  {:<48} unavailable", symbol.key()),
        }
    }
}

fn describe_source(table: &OffsetTable) -> String
{
    table
        .source()
        .map_or_else(|| "<in memory>".to_string(), |path: &Path| path.display().to_string())
}

fn describe_status(status: &EntryStatus) -> String
{
    match status {
        EntryStatus::Matches => "ok".to_string(),
        EntryStatus::Mismatch { expected, found } => format!("MISMATCH (table {expected:+}, image {found:+})"),
        EntryStatus::NotInImage => "not in image symbol table".to_string(),
        EntryStatus::NoMangledName => "unchecked (no mangled name)".to_string(),
        EntryStatus::Unavailable => "unavailable".to_string(),
    }
}
