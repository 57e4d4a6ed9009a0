//! spool.toml configuration parsing and serialization

use std::time::Duration;

use serde::{Deserialize, Serialize};
use spool_core::error::SpoolError;
use spool_core::types::Credentials;

use crate::ConfigResult;

/// Registry used when nothing else is configured
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Complete spool.toml configuration.
///
/// Every field is optional so files can be layered: a value set in a later
/// layer replaces the same value from an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpoolToml {
    /// Registry location and credentials
    #[serde(default)]
    pub registry: RegistrySection,

    /// Backoff for failed requests
    #[serde(default)]
    pub retry: RetrySection,

    /// Connection settings
    #[serde(default)]
    pub network: NetworkSection,

    /// Publish defaults
    #[serde(default)]
    pub publish: PublishSection,
}

/// `[registry]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegistrySection {
    /// Registry base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Basic auth username
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Publisher email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Authenticate reads as well as writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_auth: Option<bool>,
}

/// `[retry]`; timeouts in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RetrySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_timeout: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_timeout: Option<u64>,
}

/// `[network]`; timeout in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NetworkSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sockets: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// `[publish]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PublishSection {
    /// Dist-tag for new versions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// `public` or `restricted`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
}

/// Backoff settings with defaults filled in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrySettings {
    pub retries: u32,
    pub factor: f64,
    pub min_timeout: Duration,
    pub max_timeout: Duration,
}

impl SpoolToml {
    /// Lay `higher` over `self`; values set in `higher` win
    pub fn overlay(self, higher: SpoolToml) -> SpoolToml {
        SpoolToml {
            registry: RegistrySection {
                url: higher.registry.url.or(self.registry.url),
                token: higher.registry.token.or(self.registry.token),
                username: higher.registry.username.or(self.registry.username),
                password: higher.registry.password.or(self.registry.password),
                email: higher.registry.email.or(self.registry.email),
                always_auth: higher.registry.always_auth.or(self.registry.always_auth),
            },
            retry: RetrySection {
                retries: higher.retry.retries.or(self.retry.retries),
                factor: higher.retry.factor.or(self.retry.factor),
                min_timeout: higher.retry.min_timeout.or(self.retry.min_timeout),
                max_timeout: higher.retry.max_timeout.or(self.retry.max_timeout),
            },
            network: NetworkSection {
                timeout: higher.network.timeout.or(self.network.timeout),
                max_sockets: higher.network.max_sockets.or(self.network.max_sockets),
                user_agent: higher.network.user_agent.or(self.network.user_agent),
            },
            publish: PublishSection {
                tag: higher.publish.tag.or(self.publish.tag),
                access: higher.publish.access.or(self.publish.access),
            },
        }
    }

    /// Registry base URL
    pub fn registry_url(&self) -> &str {
        self.registry.url.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    /// Credentials from the `[registry]` section
    pub fn credentials(&self) -> Credentials {
        Credentials {
            token: self.registry.token.clone(),
            username: self.registry.username.clone(),
            password: self.registry.password.clone(),
            email: self.registry.email.clone(),
            always_auth: self.always_auth(),
        }
    }

    pub fn always_auth(&self) -> bool {
        self.registry.always_auth.unwrap_or(false)
    }

    /// Backoff settings; defaults give three attempts over about a minute
    pub fn retry_settings(&self) -> RetrySettings {
        RetrySettings {
            retries: self.retry.retries.unwrap_or(2),
            factor: self.retry.factor.unwrap_or(10.0),
            min_timeout: Duration::from_millis(self.retry.min_timeout.unwrap_or(10_000)),
            max_timeout: Duration::from_millis(self.retry.max_timeout.unwrap_or(60_000)),
        }
    }

    /// Per-attempt deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.network.timeout.unwrap_or(30_000))
    }

    pub fn max_sockets(&self) -> usize {
        self.network.max_sockets.unwrap_or(50)
    }

    pub fn publish_tag(&self) -> &str {
        self.publish.tag.as_deref().unwrap_or("latest")
    }
}

/// Parse TOML string to SpoolToml configuration
pub fn parse_spool_toml(content: &str) -> ConfigResult<SpoolToml> {
    // First try with toml_edit for better error reporting
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| syntax_error(content, e.message(), e.span()))?;

    // Then parse with serde for type safety
    let config: SpoolToml =
        toml::from_str(content).map_err(|e| syntax_error(content, e.message(), e.span()))?;

    validate_config(&config)?;

    Ok(config)
}

/// Serialize SpoolToml to TOML string
pub fn serialize_spool_toml(config: &SpoolToml) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| SpoolError::TomlParse {
        message: format!("serialization failed: {}", e),
        line: 0,
        column: 0,
    })
}

/// Validate configuration values
pub fn validate_config(config: &SpoolToml) -> ConfigResult<()> {
    if let Some(url) = &config.registry.url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SpoolError::ConfigValidation {
                field: "registry.url".to_string(),
                reason: format!("'{}' is not an http(s) URL", url),
            });
        }
    }

    let retry = config.retry_settings();
    if retry.factor < 1.0 {
        return Err(SpoolError::ConfigValidation {
            field: "retry.factor".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if retry.min_timeout > retry.max_timeout {
        return Err(SpoolError::ConfigValidation {
            field: "retry.min-timeout".to_string(),
            reason: "must not exceed retry.max-timeout".to_string(),
        });
    }

    if config.max_sockets() == 0 {
        return Err(SpoolError::ConfigValidation {
            field: "network.max-sockets".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if let Some(access) = &config.publish.access {
        if access != "public" && access != "restricted" {
            return Err(SpoolError::ConfigValidation {
                field: "publish.access".to_string(),
                reason: format!("expected 'public' or 'restricted', got '{}'", access),
            });
        }
    }

    Ok(())
}

/// Load and parse spool.toml from file path
pub async fn load_from_file(path: &camino::Utf8Path) -> ConfigResult<SpoolToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SpoolError::io(format!("Failed to read {}", path), e))?;

    parse_spool_toml(&content).map_err(|e| match e {
        SpoolError::TomlParse {
            message,
            line,
            column,
        } => SpoolError::TomlParse {
            message: format!("{} (in {})", message, path),
            line,
            column,
        },
        SpoolError::ConfigValidation { field, reason } => SpoolError::ConfigValidation {
            field,
            reason: format!("{} (in {})", reason, path),
        },
        other => other,
    })
}

/// Build a parse error with a 1-based line and column
fn syntax_error(content: &str, message: &str, span: Option<std::ops::Range<usize>>) -> SpoolError {
    let (line, column) = span
        .map(|span| line_column(content, span.start))
        .unwrap_or((0, 0));

    SpoolError::TomlParse {
        message: message.trim().to_string(),
        line,
        column,
    }
}

fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(content.len());
    let before = content.get(..offset).unwrap_or(content);
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => offset - newline,
        None => offset + 1,
    };
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = parse_spool_toml("").unwrap();
        assert_eq!(config, SpoolToml::default());
        assert_eq!(config.registry_url(), DEFAULT_REGISTRY);
        assert_eq!(config.publish_tag(), "latest");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[registry]
url = "https://registry.example.com/"
token = "abc"
always-auth = true

[retry]
retries = 4
factor = 2.0
min-timeout = 100
max-timeout = 1000

[network]
timeout = 5000
max-sockets = 8

[publish]
tag = "next"
access = "restricted"
"#;

        let config = parse_spool_toml(toml).unwrap();
        assert_eq!(config.registry_url(), "https://registry.example.com/");
        assert_eq!(config.credentials().bearer_token(), Some("abc"));
        assert!(config.credentials().always_auth);

        let retry = config.retry_settings();
        assert_eq!(retry.retries, 4);
        assert_eq!(retry.min_timeout, Duration::from_millis(100));
        assert_eq!(retry.max_timeout, Duration::from_secs(1));

        assert_eq!(config.max_sockets(), 8);
        assert_eq!(config.publish_tag(), "next");
    }

    #[test]
    fn test_syntax_error_has_location() {
        let toml = "[registry]\nurl = \"https://x\"\ntoken = = \"a\"\n";

        match parse_spool_toml(toml).unwrap_err() {
            SpoolError::TomlParse { line, column, .. } => {
                assert_eq!(line, 3);
                assert!(column > 0);
            },
            other => panic!("Expected TomlParse error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let toml = "[registry]\nurll = \"https://x\"\n";
        assert!(matches!(
            parse_spool_toml(toml),
            Err(SpoolError::TomlParse { .. })
        ));
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            ("[registry]\nurl = \"ftp://x\"\n", "registry.url"),
            ("[retry]\nfactor = 0.5\n", "retry.factor"),
            ("[retry]\nmin-timeout = 10\nmax-timeout = 5\n", "retry.min-timeout"),
            ("[network]\nmax-sockets = 0\n", "network.max-sockets"),
            ("[publish]\naccess = \"secret\"\n", "publish.access"),
        ];

        for (toml, expected) in cases {
            match parse_spool_toml(toml).unwrap_err() {
                SpoolError::ConfigValidation { field, .. } => assert_eq!(field, expected),
                other => panic!("Expected ConfigValidation for {}, got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_overlay_prefers_higher_layer() {
        let base = parse_spool_toml("[registry]\nurl = \"https://a/\"\ntoken = \"t\"\n").unwrap();
        let higher = parse_spool_toml("[registry]\nurl = \"https://b/\"\n").unwrap();

        let merged = base.overlay(higher);
        assert_eq!(merged.registry_url(), "https://b/");
        assert_eq!(merged.registry.token.as_deref(), Some("t"));
    }

    #[test]
    fn test_round_trip_serialization() {
        let config = parse_spool_toml("[publish]\ntag = \"beta\"\n[network]\nmax-sockets = 4\n")
            .unwrap();
        let serialized = serialize_spool_toml(&config).unwrap();
        assert_eq!(parse_spool_toml(&serialized).unwrap(), config);
    }

    #[test]
    fn test_line_column() {
        assert_eq!(line_column("abc", 0), (1, 1));
        assert_eq!(line_column("ab\ncd", 4), (2, 2));
    }
}
