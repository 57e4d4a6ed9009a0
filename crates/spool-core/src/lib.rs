//! # spool-core
//!
//! Core types and utilities shared across all Spool crates.
//!
//! This crate provides:
//! - `SpoolError`, the error taxonomy every registry operation reports through
//! - `Credentials` for per-operation authentication
//! - package name and version helpers used when building registry documents
//! - tarball digest helpers (`shasum`, SRI `integrity`)
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `error`: Error types and result aliases
//! - `types`: Credentials, package names, versions
//! - `utils`: Hashing and encoding helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{SpoolError, SpoolResult};
pub use types::{Credentials, PackageName};
