//! Configuration loading for Spool
//!
//! This crate handles parsing and validation of spool.toml and package.json
//! files and layers global, project, environment and command-line settings
//! into one configuration.

pub mod json;
pub mod merge;
pub mod toml;

// Re-export main types
pub use crate::json::{PackageJson, PublishConfig};
pub use crate::merge::{ConfigLayering, ConfigLoader, ConfigSource, PROJECT_CONFIG};
pub use crate::toml::{
    NetworkSection, PublishSection, RegistrySection, RetrySection, RetrySettings, SpoolToml,
};

use spool_core::error::SpoolError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, SpoolError>;
