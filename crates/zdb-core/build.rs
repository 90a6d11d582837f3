//! Build script for zdb-core
//!
//! Checks the toolchain and warns about targets the bridge cannot drive:
//! - Minimum Rust version (C string literals need Rust 1.77.0+)
//! - Architectures without an internal call adapter
//!
//! ## Requirements
//!
//! - **Rust**: 1.77.0 or newer
//! - **Target**: aarch64, or x86_64 outside of MSVC, for formatter registration

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 77, 0);

        if rustc_version < min_rust_version {
            panic!("zdb-core requires Rust {min_rust_version} or newer, found {rustc_version}");
        }
    } else {
        // Some build environments hide the compiler; don't fail on that
        println!("cargo:warning=could not verify Rust version");
    }

    check_call_adapter();
}

/// The adapter is chosen by target, not host, so read Cargo's target cfg.
fn check_call_adapter()
{
    let arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let env = std::env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();

    let supported = arch == "aarch64" || (arch == "x86_64" && env != "msvc");
    if !supported {
        println!(
            "cargo:warning=no internal call adapter for {arch} ({env}); formatters will not be registered, \
             the expression rewriter still works"
        );
    }
}
