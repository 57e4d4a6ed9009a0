//! package.json reading for publish

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spool_core::error::SpoolError;

use crate::toml::{PublishSection, RegistrySection, SpoolToml};
use crate::ConfigResult;

/// The parts of package.json spool acts on.
///
/// Everything else is kept in `rest` and published as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageJson {
    /// Package name (required)
    pub name: String,

    /// Package version (required)
    pub version: String,

    /// Private packages are never published
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub private: bool,

    /// Per-package publish settings
    #[serde(
        default,
        rename = "publishConfig",
        skip_serializing_if = "Option::is_none"
    )]
    pub publish_config: Option<PublishConfig>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// `publishConfig` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
}

impl PublishConfig {
    /// Settings as a config layer that sits above spool.toml
    pub fn as_layer(&self) -> SpoolToml {
        SpoolToml {
            registry: RegistrySection {
                url: self.registry.clone(),
                ..RegistrySection::default()
            },
            publish: PublishSection {
                tag: self.tag.clone(),
                access: self.access.clone(),
            },
            ..SpoolToml::default()
        }
    }
}

impl PackageJson {
    /// Fail for packages marked `"private": true`
    pub fn ensure_publishable(&self) -> ConfigResult<()> {
        if self.private {
            return Err(SpoolError::ConfigValidation {
                field: "private".to_string(),
                reason: format!("{} is marked private and cannot be published", self.name),
            });
        }
        Ok(())
    }

    /// Manifest object sent to the registry; `publishConfig` and `private` are local only
    pub fn to_manifest(&self) -> Map<String, Value> {
        let mut manifest = self.rest.clone();
        manifest.insert("name".to_string(), Value::String(self.name.clone()));
        manifest.insert("version".to_string(), Value::String(self.version.clone()));
        manifest
    }
}

/// Parse JSON string to PackageJson
pub fn parse_package_json(content: &str) -> ConfigResult<PackageJson> {
    serde_json::from_str(content).map_err(|e| SpoolError::JsonParse {
        message: format!("JSON parsing error: {}", e),
    })
}

/// Load and parse package.json from file path
pub async fn load_from_file(path: &camino::Utf8Path) -> ConfigResult<PackageJson> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SpoolError::io(format!("Failed to read {}", path), e))?;

    parse_package_json(&content).map_err(|e| match e {
        SpoolError::JsonParse { message } => SpoolError::JsonParse {
            message: format!("In file {}: {}", path, message),
        },
        other => other,
    })
}
