//! # Types
//!
//! Small shared types used throughout the bridge.

pub mod address;
pub mod version;

// Re-export all public types
pub use address::Address;
pub use version::HostVersion;
