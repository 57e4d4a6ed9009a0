//! Core data types for Spool registry operations.
//!
//! This module provides the fundamental types used throughout the workspace:
//! - Credentials supplied per logical operation
//! - Package names (plain and scoped)
//! - Version and range helpers on top of `semver`

pub mod credentials;
pub mod package;
pub mod version;

// Re-export all public types
pub use credentials::Credentials;
pub use package::PackageName;
pub use version::{highest_version, parse_range, parse_version, VersionRange};
