//! Error types and result aliases for Spool operations.
//!
//! One error type covers configuration, transport and registry failures so
//! that the retry layer can classify any failure and the CLI can render the
//! registry's own message and code verbatim.

use thiserror::Error;

/// Unified error type for all Spool operations
#[derive(Error, Debug)]
pub enum SpoolError {
    // Config errors
    #[error("Failed to parse spool.toml: {message} at line {line}, column {column}")]
    TomlParse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Failed to parse package.json: {message}")]
    JsonParse { message: String },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    #[error("Invalid registry URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // Transport errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("No response received from {url}")]
    NoResponse { url: String },

    #[error("Registry server error {status} for {url}: {message}")]
    Server {
        status: u16,
        url: String,
        message: String,
    },

    // Registry errors
    #[error("Registry returned {status} for {url}: {message}")]
    Registry {
        status: u16,
        code: String,
        message: String,
        url: String,
    },

    #[error("Package '{name}' not found in registry")]
    PackageNotFound { name: String },

    #[error("{message}")]
    AuthRequired { message: String },

    #[error("Revision conflict writing {url}: {reason}")]
    Conflict { url: String, reason: String },

    #[error("Cannot publish over previously published version {name}@{version}")]
    PublishConflict { name: String, version: String },

    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // Decoding errors
    #[error("Failed to parse response from {url}: {message}")]
    Parse {
        url: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Spool operations
pub type SpoolResult<T> = Result<T, SpoolError>;

impl SpoolError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create a parse error for a response body
    pub fn parse<E>(url: &str, message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            url: url.to_string(),
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Create the error every write without usable credentials reports
    pub fn auth_required() -> Self {
        Self::AuthRequired {
            message: "This request requires auth credentials. Configure a token or username and password, then repeat the request."
                .to_string(),
        }
    }

    /// Check if the failure may succeed when the request is repeated
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SpoolError::Network { .. }
                | SpoolError::Timeout { .. }
                | SpoolError::NoResponse { .. }
                | SpoolError::Server { .. }
        )
    }

    /// Check if this is a revision conflict reported by the registry
    pub fn is_conflict(&self) -> bool {
        matches!(self, SpoolError::Conflict { .. })
    }

    /// HTTP status attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SpoolError::Server { status, .. } | SpoolError::Registry { status, .. } => {
                Some(*status)
            },
            SpoolError::Conflict { .. } => Some(409),
            SpoolError::PackageNotFound { .. } => Some(404),
            SpoolError::Timeout { .. } => Some(408),
            _ => None,
        }
    }

    /// Machine-readable error code, in the form npm clients report them
    pub fn code(&self) -> String {
        match self {
            SpoolError::Registry { code, .. } => code.clone(),
            SpoolError::Server { status, .. } => format!("E{}", status),
            SpoolError::Conflict { .. } => "E409".to_string(),
            SpoolError::PackageNotFound { .. } => "E404".to_string(),
            SpoolError::PublishConflict { .. } => "EPUBLISHCONFLICT".to_string(),
            SpoolError::AuthRequired { .. } => "ENEEDAUTH".to_string(),
            SpoolError::Timeout { .. } => "ETIMEDOUT".to_string(),
            SpoolError::Network { .. } => "ENETWORK".to_string(),
            SpoolError::NoResponse { .. } => "ENORESPONSE".to_string(),
            SpoolError::Parse { .. } => "EPARSE".to_string(),
            SpoolError::InvalidUrl { .. } => "EINVALIDURL".to_string(),
            SpoolError::InvalidVersion { .. } => "EBADSEMVER".to_string(),
            SpoolError::InvalidRequest { .. } => "EINVALID".to_string(),
            SpoolError::TomlParse { .. }
            | SpoolError::JsonParse { .. }
            | SpoolError::ConfigValidation { .. } => "ECONFIG".to_string(),
            SpoolError::Io { .. } => "EIO".to_string(),
        }
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            SpoolError::PackageNotFound { .. } => {
                Some("Check the package name spelling and the configured registry")
            },
            SpoolError::Network { .. } | SpoolError::NoResponse { .. } => {
                Some("Check your internet connection and try again")
            },
            SpoolError::Timeout { .. } => Some("The registry is slow to respond; try again later"),
            SpoolError::Server { .. } => Some("The registry is having trouble; try again later"),
            SpoolError::AuthRequired { .. } => Some("Log in again or set SPOOL_TOKEN"),
            SpoolError::Conflict { .. } => {
                Some("Another client changed the package at the same time; run the command again")
            },
            SpoolError::PublishConflict { .. } => {
                Some("Bump the version in package.json before publishing")
            },
            SpoolError::InvalidUrl { .. } => Some("Check the registry URL in spool.toml"),
            _ => None,
        }
    }
}
