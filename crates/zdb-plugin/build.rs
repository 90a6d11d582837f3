//! Build script for zdb-plugin
//!
//! Compiles the C++ shim against LLDB's public headers and links liblldb.
//!
//! ## Locating LLDB
//!
//! - `ZDB_LLDB_INCLUDE`: directory containing `lldb/API/LLDB.h`
//! - `ZDB_LLDB_LIB_DIR`: directory containing liblldb
//! - `ZDB_LLDB_LIB_NAME`: library name to link (default `lldb`)
//!
//! Anything not set is asked of `llvm-config` (or `$LLVM_CONFIG`). When the
//! headers cannot be found the shim is skipped with a warning: the crate still
//! builds and tests, but exports no `PluginInitialize`.

use std::env;
use std::path::PathBuf;
use std::process::Command;

fn main()
{
    println!("cargo:rustc-check-cfg=cfg(zdb_shim)");
    println!("cargo:rerun-if-changed=shim/zdb_shim.cpp");
    println!("cargo:rerun-if-changed=shim/zdb_shim.h");
    for var in ["ZDB_LLDB_INCLUDE", "ZDB_LLDB_LIB_DIR", "ZDB_LLDB_LIB_NAME", "LLVM_CONFIG"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    let Some(include) = env_dir("ZDB_LLDB_INCLUDE").or_else(|| llvm_config("--includedir")) else {
        println!("cargo:warning=LLDB headers not found; building without the PluginInitialize export");
        println!("cargo:warning=set ZDB_LLDB_INCLUDE and ZDB_LLDB_LIB_DIR, or put llvm-config on PATH");
        return;
    };
    if !include.join("lldb/API/LLDB.h").is_file() {
        println!(
            "cargo:warning={} has no lldb/API/LLDB.h; building without the PluginInitialize export",
            include.display()
        );
        return;
    }

    cc::Build::new()
        .cpp(true)
        .std("c++17")
        .include(&include)
        .include("shim")
        .file("shim/zdb_shim.cpp")
        .compile("zdb_shim");

    if let Some(lib_dir) = env_dir("ZDB_LLDB_LIB_DIR").or_else(|| llvm_config("--libdir")) {
        println!("cargo:rustc-link-search=native={}", lib_dir.display());
    }
    let name = env::var("ZDB_LLDB_LIB_NAME").unwrap_or_else(|_| "lldb".to_string());
    println!("cargo:rustc-link-lib=dylib={name}");
    println!("cargo:rustc-cfg=zdb_shim");
}

fn env_dir(var: &str) -> Option<PathBuf>
{
    env::var_os(var).filter(|value| !value.is_empty()).map(PathBuf::from)
}

/// One line of `llvm-config` output, as a path.
fn llvm_config(flag: &str) -> Option<PathBuf>
{
    let program = env::var_os("LLVM_CONFIG").unwrap_or_else(|| "llvm-config".into());
    let output = Command::new(program).arg(flag).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let line = String::from_utf8(output.stdout).ok()?;
    let line = line.trim();
    (!line.is_empty()).then(|| PathBuf::from(line))
}
