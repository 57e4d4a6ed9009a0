//! Publishing a new version

use serde_json::{Map, Value};
use spool_core::error::SpoolError;
use spool_core::types::{parse_version, Credentials, PackageName};
use spool_core::utils::{encode_base64, sha1_hex, sha512_integrity};
use tracing::info;

use super::{commit, DocumentChange, MutationOutcome, WritePlan};
use crate::api::{Attachment, DistInfo, Maintainer, RegistryDocument, VersionMetadata};
use crate::client::RegistryClient;
use crate::RegistryResult;

/// Top-level manifest fields copied onto the package document
const ROOT_FIELDS: &[&str] = &["description", "readme"];

/// A version to publish: its manifest and packed tarball
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Contents of the package manifest (package.json)
    pub manifest: Map<String, Value>,
    /// Packed tarball bytes
    pub tarball: Vec<u8>,
    /// Dist-tag to point at the new version
    pub tag: String,
    /// `public` or `restricted`
    pub access: Option<String>,
}

impl PublishRequest {
    pub fn new(manifest: Map<String, Value>, tarball: Vec<u8>) -> Self {
        Self {
            manifest,
            tarball,
            tag: "latest".to_string(),
            access: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_access(mut self, access: impl Into<String>) -> Self {
        self.access = Some(access.into());
        self
    }
}

/// The document a publish writes, already validated
struct PublishChange {
    name: PackageName,
    version: String,
    document: RegistryDocument,
}

impl PublishChange {
    fn build(
        client: &RegistryClient,
        request: &PublishRequest,
        credentials: &Credentials,
    ) -> RegistryResult<Self> {
        let manifest_field = |key: &str| {
            request
                .manifest
                .get(key)
                .and_then(Value::as_str)
                .ok_or_else(|| SpoolError::InvalidRequest {
                    message: format!("package manifest has no \"{}\" field", key),
                })
        };

        let name = PackageName::parse(manifest_field("name")?)?;
        let version = parse_version(manifest_field("version")?)?.to_string();
        validate_tag(&request.tag)?;
        validate_access(&name, request.access.as_deref())?;

        let publisher = match credentials.bearer_token() {
            Some(_) => None,
            None => Some(basic_publisher(credentials)?),
        };

        let tarball_url = client
            .resolver()
            .resolve(&name.tarball_path(&version))?
            .to_string();

        let mut metadata: VersionMetadata =
            serde_json::from_value(Value::Object(request.manifest.clone())).map_err(|e| {
                SpoolError::InvalidRequest {
                    message: format!("package manifest is not valid: {}", e),
                }
            })?;
        metadata.name = name.to_string();
        metadata.version = version.clone();
        metadata
            .extra
            .insert("_id".to_string(), Value::String(format!("{}@{}", name, version)));
        metadata.dist = Some(DistInfo {
            tarball: tarball_url,
            shasum: Some(sha1_hex(&request.tarball)),
            integrity: Some(sha512_integrity(&request.tarball)),
            ..DistInfo::default()
        });

        let mut document = RegistryDocument::new(name.as_str());
        for field in ROOT_FIELDS {
            if let Some(value) = request.manifest.get(*field) {
                document.extra.insert(field.to_string(), value.clone());
            }
        }
        if let Some(access) = &request.access {
            document
                .extra
                .insert("access".to_string(), Value::String(access.clone()));
        }
        if let Some(publisher) = publisher {
            let maintainers = vec![publisher];
            metadata.maintainers = Some(maintainers.clone());
            document.maintainers = Some(maintainers);
        }

        document
            .dist_tags
            .insert(request.tag.clone(), version.clone());
        document.versions.insert(version.clone(), metadata);
        document.attachments.insert(
            name.attachment_key(&version),
            Attachment {
                content_type: "application/octet-stream".to_string(),
                data: Some(encode_base64(&request.tarball)),
                length: Some(request.tarball.len() as u64),
                ..Attachment::default()
            },
        );

        Ok(Self {
            name,
            version,
            document,
        })
    }
}

impl DocumentChange for PublishChange {
    fn package(&self) -> &str {
        self.name.as_str()
    }

    fn optimistic_document(&self) -> Option<RegistryDocument> {
        Some(self.document.clone())
    }

    /// Merge the new version into the current document. Tags, versions and
    /// attachments are merged key by key, maintainers are left alone and any
    /// other top-level field replaces the current one.
    fn apply(&self, mut current: RegistryDocument) -> RegistryResult<WritePlan> {
        if current.versions.contains_key(&self.version) {
            return Err(SpoolError::PublishConflict {
                name: self.name.to_string(),
                version: self.version.clone(),
            });
        }

        let new = self.document.clone();
        current.dist_tags.extend(new.dist_tags);
        current.versions.extend(new.versions);
        current.attachments.extend(new.attachments);
        current.extra.extend(new.extra);
        if current.id.is_none() {
            current.id = new.id;
        }
        if current.name.is_none() {
            current.name = new.name;
        }

        Ok(WritePlan::Put(current))
    }
}

fn validate_tag(tag: &str) -> RegistryResult<()> {
    if tag.trim().is_empty() {
        return Err(SpoolError::InvalidRequest {
            message: "dist-tag must not be empty".to_string(),
        });
    }
    if parse_version(tag).is_ok() {
        return Err(SpoolError::InvalidRequest {
            message: format!("dist-tag '{}' must not be a version", tag),
        });
    }
    Ok(())
}

fn validate_access(name: &PackageName, access: Option<&str>) -> RegistryResult<()> {
    match access {
        None | Some("public") => Ok(()),
        Some("restricted") if name.is_scoped() => Ok(()),
        Some("restricted") => Err(SpoolError::InvalidRequest {
            message: format!("cannot restrict access to unscoped package {}", name),
        }),
        Some(other) => Err(SpoolError::InvalidRequest {
            message: format!("access must be 'public' or 'restricted', got '{}'", other),
        }),
    }
}

/// Maintainer entry for a publish with basic credentials
fn basic_publisher(credentials: &Credentials) -> RegistryResult<Maintainer> {
    let (username, _) = credentials
        .basic_pair()
        .ok_or_else(SpoolError::auth_required)?;
    let email = credentials
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(SpoolError::auth_required)?;

    Ok(Maintainer {
        name: username.to_string(),
        email: Some(email.to_string()),
    })
}

impl RegistryClient {
    /// Publish a new version.
    ///
    /// The full document is written optimistically; if the package already
    /// exists the version is merged into the current document instead.
    /// Publishing a version that exists fails with `PublishConflict`.
    pub async fn publish(
        &self,
        request: &PublishRequest,
        credentials: &Credentials,
    ) -> RegistryResult<MutationOutcome> {
        let change = PublishChange::build(self, request, credentials)?;
        info!(
            package = %change.name,
            version = %change.version,
            tag = %request.tag,
            "publishing"
        );

        Ok(commit(self, &change, credentials).await?.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RegistryConfig;
    use serde_json::json;

    fn client() -> RegistryClient {
        RegistryClient::with_config(RegistryConfig {
            registry: "https://registry.example.com/".to_string(),
            ..RegistryConfig::default()
        })
        .unwrap()
    }

    fn manifest(name: &str, version: &str) -> Map<String, Value> {
        match json!({
            "name": name,
            "version": version,
            "description": "widgets",
            "main": "index.js"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_document_for_token_publish() {
        let request = PublishRequest::new(manifest("@acme/widget", "v1.2.3"), b"tarball".to_vec());
        let change = PublishChange::build(&client(), &request, &Credentials::token("t")).unwrap();

        assert_eq!(change.version, "1.2.3");
        let doc = &change.document;
        assert_eq!(doc.dist_tags["latest"], "1.2.3");
        assert_eq!(doc.extra["description"], "widgets");
        assert!(doc.maintainers.is_none());

        let version = &doc.versions["1.2.3"];
        assert_eq!(version.extra["main"], "index.js");
        assert_eq!(version.extra["_id"], "@acme/widget@1.2.3");

        let dist = version.dist.as_ref().unwrap();
        assert_eq!(
            dist.tarball,
            "https://registry.example.com/@acme/widget/-/widget-1.2.3.tgz"
        );
        assert_eq!(dist.shasum.as_deref(), Some(sha1_hex(b"tarball").as_str()));
        assert!(dist.integrity.as_deref().unwrap().starts_with("sha512-"));

        let attachment = &doc.attachments["@acme/widget-1.2.3.tgz"];
        assert_eq!(attachment.data.as_deref(), Some(encode_base64(b"tarball").as_str()));
        assert_eq!(attachment.length, Some(7));
    }

    #[test]
    fn test_basic_publish_records_maintainer() {
        let request = PublishRequest::new(manifest("widget", "1.0.0"), Vec::new());
        let creds = Credentials::basic("alice", "pw").with_email("alice@example.com");
        let change = PublishChange::build(&client(), &request, &creds).unwrap();

        let expected = Some(vec![Maintainer {
            name: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
        }]);
        assert_eq!(change.document.maintainers, expected);
        assert_eq!(change.document.versions["1.0.0"].maintainers, expected);
    }

    #[test]
    fn test_basic_publish_requires_email() {
        let request = PublishRequest::new(manifest("widget", "1.0.0"), Vec::new());
        let err = PublishChange::build(&client(), &request, &Credentials::basic("alice", "pw"))
            .err()
            .unwrap();
        assert!(matches!(err, SpoolError::AuthRequired { .. }));

        let err = PublishChange::build(&client(), &request, &Credentials::anonymous())
            .err()
            .unwrap();
        assert!(matches!(err, SpoolError::AuthRequired { .. }));
    }

    #[test]
    fn test_invalid_requests() {
        let creds = Credentials::token("t");

        let bad_version = PublishRequest::new(manifest("widget", "one"), Vec::new());
        assert!(matches!(
            PublishChange::build(&client(), &bad_version, &creds).err(),
            Some(SpoolError::InvalidVersion { .. })
        ));

        let bad_name = PublishRequest::new(manifest("Bad Name", "1.0.0"), Vec::new());
        assert!(PublishChange::build(&client(), &bad_name, &creds).is_err());

        let version_tag = PublishRequest::new(manifest("widget", "1.0.0"), Vec::new())
            .with_tag("1.0.0");
        assert!(PublishChange::build(&client(), &version_tag, &creds).is_err());

        let unscoped_restricted = PublishRequest::new(manifest("widget", "1.0.0"), Vec::new())
            .with_access("restricted");
        assert!(PublishChange::build(&client(), &unscoped_restricted, &creds).is_err());

        let bad_access = PublishRequest::new(manifest("@acme/widget", "1.0.0"), Vec::new())
            .with_access("secret");
        assert!(PublishChange::build(&client(), &bad_access, &creds).is_err());
    }

    #[test]
    fn test_merge_keeps_existing_content() {
        let request = PublishRequest::new(manifest("widget", "2.0.0"), b"v2".to_vec())
            .with_tag("next");
        let change = PublishChange::build(&client(), &request, &Credentials::token("t")).unwrap();

        let current = RegistryDocument::from_value(json!({
            "_id": "widget",
            "_rev": "5-abc",
            "name": "widget",
            "description": "old",
            "dist-tags": { "latest": "1.0.0" },
            "versions": { "1.0.0": { "name": "widget", "version": "1.0.0" } },
            "maintainers": [{ "name": "bob" }],
            "users": { "carol": true }
        }))
        .unwrap();

        let WritePlan::Put(merged) = change.apply(current).unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(merged.rev.as_deref(), Some("5-abc"));
        assert_eq!(merged.dist_tags["latest"], "1.0.0");
        assert_eq!(merged.dist_tags["next"], "2.0.0");
        assert_eq!(
            merged.versions.keys().collect::<Vec<_>>(),
            vec!["1.0.0", "2.0.0"]
        );
        assert_eq!(merged.extra["description"], "widgets");
        assert_eq!(merged.maintainers.unwrap()[0].name, "bob");
        assert!(merged.users.unwrap()["carol"]);
        assert!(merged.attachments.contains_key("widget-2.0.0.tgz"));
    }

    #[test]
    fn test_merge_rejects_existing_version() {
        let request = PublishRequest::new(manifest("widget", "1.0.0"), Vec::new());
        let change = PublishChange::build(&client(), &request, &Credentials::token("t")).unwrap();

        let current = RegistryDocument::from_value(json!({
            "_id": "widget",
            "versions": { "1.0.0": { "name": "widget", "version": "1.0.0" } }
        }))
        .unwrap();

        let err = change.apply(current).unwrap_err();
        assert_eq!(err.code(), "EPUBLISHCONFLICT");
    }
}
