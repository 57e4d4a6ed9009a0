//! Registry document types
//!
//! Only the fields the mutation protocol inspects are typed; everything else
//! a registry returns is kept in `extra` and written back untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Versioned document describing one published package
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RegistryDocument {
    /// Document id (the package name)
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Revision token, present once the document is persisted
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Package name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tag name to version
    #[serde(rename = "dist-tags", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dist_tags: BTreeMap<String, String>,
    /// All published versions
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub versions: BTreeMap<String, VersionMetadata>,
    /// Inline tarballs (on writes) or attachment stubs (on reads)
    #[serde(rename = "_attachments", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, Attachment>,
    /// Users who starred the package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<BTreeMap<String, bool>>,
    /// Package maintainers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainers: Option<Vec<Maintainer>>,
    /// Fields not interpreted by the client
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Metadata of one published version
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VersionMetadata {
    /// Package name
    #[serde(default)]
    pub name: String,
    /// Version string
    #[serde(default)]
    pub version: String,
    /// Deprecation message; an empty string clears the deprecation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    /// Distribution information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<DistInfo>,
    /// Maintainers at publish time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainers: Option<Vec<Maintainer>>,
    /// Everything else from package.json
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Distribution information for a version's tarball
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DistInfo {
    /// Tarball download URL
    pub tarball: String,
    /// SHA-1 checksum (legacy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,
    /// Subresource integrity hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    /// Per-platform binary tarballs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<BTreeMap<String, BinDist>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A per-platform binary tarball
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BinDist {
    /// Tarball download URL
    pub tarball: String,
    /// SHA-1 checksum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,
}

/// Document attachment
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Attachment {
    /// MIME type
    #[serde(default)]
    pub content_type: String,
    /// Base64 payload; absent on stubs returned by reads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Payload length in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    /// Stub marker set by registries on reads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stub: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A package maintainer
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Response body of `-/whoami`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhoamiResponse {
    pub username: String,
}

impl RegistryDocument {
    /// Start an empty document for a package that has never been published
    pub fn new(name: &str) -> Self {
        Self {
            id: Some(name.to_string()),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Build from a JSON value
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Render as a JSON value
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Name of the package, from `name` or `_id`
    pub fn package_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.id.as_deref())
    }

    /// Version the `latest` tag points at
    pub fn latest(&self) -> Option<&str> {
        self.dist_tags.get("latest").map(String::as_str)
    }

    /// Users who starred the package
    pub fn stargazers(&self) -> Vec<&str> {
        self.users
            .iter()
            .flatten()
            .filter(|(_, starred)| **starred)
            .map(|(user, _)| user.as_str())
            .collect()
    }

    /// Check that every dist-tag names a published version
    pub fn dangling_tags(&self) -> Vec<(&str, &str)> {
        self.dist_tags
            .iter()
            .filter(|(_, version)| !self.versions.contains_key(*version))
            .map(|(tag, version)| (tag.as_str(), version.as_str()))
            .collect()
    }
}
