//! Shared test utilities for the reforecast-refs workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Archive layout fixtures
//! - Synthetic GRIB2 index generators
//! - Seeding of in-memory archives
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, seed_file};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Temporary directory for reference documents, removed on drop.
pub fn scratch_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("reforecast-refs-")
        .tempdir()
        .expect("failed to create scratch directory")
}
