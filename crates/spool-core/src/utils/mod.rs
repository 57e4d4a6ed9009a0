//! Utility functions and helpers.
//!
//! Common functionality used across multiple Spool crates.

pub mod hash;

// Re-export commonly used utilities
pub use hash::{encode_base64, sha1_hex, sha512_integrity};
