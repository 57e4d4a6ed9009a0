//! Dist-tag changes

use spool_core::error::SpoolError;
use spool_core::types::{parse_version, Credentials, PackageName};
use tracing::info;

use super::{commit, require_credentials, DocumentChange, MutationOutcome, WritePlan};
use crate::api::RegistryDocument;
use crate::client::RegistryClient;
use crate::RegistryResult;

/// Tag every document must keep
const LATEST: &str = "latest";

enum TagChange {
    Add {
        name: PackageName,
        tag: String,
        version: String,
    },
    Remove {
        name: PackageName,
        tag: String,
    },
}

impl DocumentChange for TagChange {
    fn package(&self) -> &str {
        match self {
            TagChange::Add { name, .. } | TagChange::Remove { name, .. } => name.as_str(),
        }
    }

    fn apply(&self, mut current: RegistryDocument) -> RegistryResult<WritePlan> {
        match self {
            TagChange::Add { name, tag, version } => {
                if !current.versions.contains_key(version) {
                    return Err(SpoolError::InvalidVersion {
                        version: version.clone(),
                        reason: format!("{} has no published version {}", name, version),
                    });
                }
                if current.dist_tags.get(tag) == Some(version) {
                    return Ok(WritePlan::Unchanged);
                }
                current.dist_tags.insert(tag.clone(), version.clone());
            },
            TagChange::Remove { tag, .. } => {
                if current.dist_tags.remove(tag).is_none() {
                    return Ok(WritePlan::Unchanged);
                }
            },
        }
        Ok(WritePlan::Put(current))
    }
}

fn validate_tag(tag: &str) -> RegistryResult<()> {
    if tag.trim().is_empty() || parse_version(tag).is_ok() {
        return Err(SpoolError::InvalidRequest {
            message: format!("'{}' is not a valid dist-tag name", tag),
        });
    }
    Ok(())
}

impl RegistryClient {
    /// Point `tag` at an already published version
    pub async fn add_dist_tag(
        &self,
        name: &str,
        version: &str,
        tag: &str,
        credentials: &Credentials,
    ) -> RegistryResult<MutationOutcome> {
        require_credentials(credentials)?;
        validate_tag(tag)?;
        let change = TagChange::Add {
            name: PackageName::parse(name)?,
            tag: tag.to_string(),
            version: parse_version(version)?.to_string(),
        };
        info!(package = name, tag, version, "adding dist-tag");

        Ok(commit(self, &change, credentials).await?.outcome)
    }

    /// Remove a dist-tag. `latest` cannot be removed.
    pub async fn remove_dist_tag(
        &self,
        name: &str,
        tag: &str,
        credentials: &Credentials,
    ) -> RegistryResult<MutationOutcome> {
        require_credentials(credentials)?;
        if tag == LATEST {
            return Err(SpoolError::InvalidRequest {
                message: "the latest dist-tag cannot be removed".to_string(),
            });
        }
        let change = TagChange::Remove {
            name: PackageName::parse(name)?,
            tag: tag.to_string(),
        };
        info!(package = name, tag, "removing dist-tag");

        Ok(commit(self, &change, credentials).await?.outcome)
    }
}
