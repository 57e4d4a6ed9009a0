//! Removing a published version

use reqwest::Method;
use spool_core::error::SpoolError;
use spool_core::types::{highest_version, parse_version, Credentials, PackageName};
use tracing::{debug, info, warn};
use url::Url;

use super::{commit, require_credentials, DocumentChange, MutationOutcome, WritePlan};
use crate::api::{DistInfo, RegistryDocument};
use crate::client::{RegistryClient, RequestOptions};
use crate::RegistryResult;

/// Result of an unpublish
#[derive(Debug)]
pub struct UnpublishOutcome {
    /// What happened to the package document
    pub outcome: MutationOutcome,
    /// Tarballs whose deletion failed, with the failure. The document change
    /// stands regardless.
    pub failed_attachments: Vec<(String, SpoolError)>,
}

struct UnpublishChange {
    name: PackageName,
    version: String,
}

impl DocumentChange for UnpublishChange {
    fn package(&self) -> &str {
        self.name.as_str()
    }

    fn apply(&self, mut current: RegistryDocument) -> RegistryResult<WritePlan> {
        if current.versions.remove(&self.version).is_none() {
            return Ok(WritePlan::Unchanged);
        }
        if current.versions.is_empty() {
            return Ok(WritePlan::DeleteDocument);
        }

        let was_latest = current.latest() == Some(self.version.as_str());
        current.dist_tags.retain(|_, version| *version != self.version);
        if was_latest {
            if let Some(latest) = highest_version(current.versions.keys().map(String::as_str)) {
                let latest = latest.to_string();
                debug!(package = %self.name, %latest, "moving latest");
                current.dist_tags.insert("latest".to_string(), latest);
            }
        }

        Ok(WritePlan::Put(current))
    }
}

/// Tarball URLs published for a version: the main tarball and every
/// per-platform binary
fn tarballs(dist: &DistInfo) -> Vec<String> {
    let mut urls = vec![dist.tarball.clone()];
    if let Some(bin) = &dist.bin {
        urls.extend(bin.values().map(|b| b.tarball.clone()));
    }
    urls.retain(|url| !url.is_empty());
    urls
}

impl RegistryClient {
    /// Remove one version of a package.
    ///
    /// Removing the last version deletes the whole document. Once the
    /// document write succeeds the version's tarballs are deleted one by one;
    /// failures there are reported in the outcome and never undo the write.
    pub async fn unpublish(
        &self,
        name: &str,
        version: &str,
        credentials: &Credentials,
    ) -> RegistryResult<UnpublishOutcome> {
        require_credentials(credentials)?;
        let change = UnpublishChange {
            name: PackageName::parse(name)?,
            version: parse_version(version)?.to_string(),
        };
        info!(package = name, version = %change.version, "unpublishing");

        let committed = commit(self, &change, credentials).await?;

        let mut failed_attachments = Vec::new();
        if let MutationOutcome::Applied(_) = committed.outcome {
            let dist = committed
                .base
                .as_ref()
                .and_then(|base| base.versions.get(&change.version))
                .and_then(|metadata| metadata.dist.as_ref());

            for tarball in dist.map(tarballs).unwrap_or_default() {
                if let Err(error) = self.detach(name, &tarball, credentials).await {
                    warn!(%tarball, error = %error, "failed to delete tarball");
                    failed_attachments.push((tarball, error));
                }
            }
        }

        Ok(UnpublishOutcome {
            outcome: committed.outcome,
            failed_attachments,
        })
    }

    /// Delete one tarball attachment under a freshly read package revision
    async fn detach(
        &self,
        name: &str,
        tarball: &str,
        credentials: &Credentials,
    ) -> RegistryResult<()> {
        // The path is resolved against the configured registry, not the
        // host recorded in the tarball URL
        let path = Url::parse(tarball)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| tarball.to_string());

        let current = self.fetch_for_write(name, credentials).await?;
        let rev = current.rev.ok_or_else(|| SpoolError::InvalidRequest {
            message: format!("no _rev found in {}", name),
        })?;

        debug!(%path, %rev, "deleting tarball");
        let options = RequestOptions::new(credentials);
        self.send(Method::DELETE, &format!("{}/-rev/{}", path, rev), None, &options)
            .await?;
        Ok(())
    }
}
