//! Optimistic-concurrency mutation of registry documents
//!
//! Every mutation is a pure [`DocumentChange`] applied to the current
//! document. The driver writes it, and on a revision conflict re-reads the
//! document with `?write=true`, re-applies the change and writes once more to
//! `<name>/-rev/<rev>`. A conflict on that second write is returned to the
//! caller; conflicts are resolved at most once per call.

mod deprecate;
mod publish;
mod star;
mod tag;
mod unpublish;

pub use publish::PublishRequest;
pub use unpublish::UnpublishOutcome;

use reqwest::Method;
use spool_core::error::SpoolError;
use spool_core::types::Credentials;
use tracing::{debug, info, warn};

use crate::api::RegistryDocument;
use crate::client::{RegistryClient, RequestOptions};
use crate::resolver::UrlResolver;
use crate::RegistryResult;

/// Result of a mutation that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The document was written; carries the document as sent, with the new
    /// revision when the registry returned one
    Applied(RegistryDocument),
    /// The whole document was deleted
    Deleted,
    /// Nothing needed to change; no write was issued
    Unchanged,
}

impl MutationOutcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, MutationOutcome::Unchanged)
    }
}

/// What a change wants written
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WritePlan {
    Put(RegistryDocument),
    DeleteDocument,
    Unchanged,
}

/// A change to one package document
pub(crate) trait DocumentChange {
    /// Package whose document is changed
    fn package(&self) -> &str;

    /// Document to write without reading first. Only a publish has one.
    fn optimistic_document(&self) -> Option<RegistryDocument> {
        None
    }

    /// Apply the change to the current document
    fn apply(&self, current: RegistryDocument) -> RegistryResult<WritePlan>;
}

/// Outcome of the protocol plus the document the winning plan was applied to
pub(crate) struct Committed {
    pub outcome: MutationOutcome,
    pub base: Option<RegistryDocument>,
}

/// Drive one change through write, reconcile and rewrite
pub(crate) async fn commit<C: DocumentChange>(
    client: &RegistryClient,
    change: &C,
    credentials: &Credentials,
) -> RegistryResult<Committed> {
    let name = change.package();
    let options = RequestOptions::new(credentials);

    let first = match change.optimistic_document() {
        Some(document) => {
            debug!(package = name, "optimistic write");
            write(client, name, WritePlan::Put(document), None, &options)
                .await
                .map(|outcome| Committed {
                    outcome,
                    base: None,
                })
        },
        None => read_apply_write(client, change, credentials, &options).await,
    };

    let result = match first {
        Err(error) if error.is_conflict() => {
            info!(package = name, "revision conflict, reconciling with the current document");
            read_apply_write(client, change, credentials, &options)
                .await
                .map_err(|error| {
                    if error.is_conflict() {
                        warn!(package = name, "conflict persisted after reconciling");
                    }
                    error
                })
        },
        other => other,
    };

    if result.is_ok() {
        client.cache().invalidate(name);
    }
    result
}

async fn read_apply_write<C: DocumentChange>(
    client: &RegistryClient,
    change: &C,
    credentials: &Credentials,
    options: &RequestOptions,
) -> RegistryResult<Committed> {
    let name = change.package();
    let current = client.fetch_for_write(name, credentials).await?;
    let rev = current.rev.clone();

    let plan = change.apply(current.clone())?;
    let outcome = write(client, name, plan, rev.as_deref(), options).await?;
    Ok(Committed {
        outcome,
        base: Some(current),
    })
}

/// Issue the write a plan calls for
async fn write(
    client: &RegistryClient,
    name: &str,
    plan: WritePlan,
    rev: Option<&str>,
    options: &RequestOptions,
) -> RegistryResult<MutationOutcome> {
    let encoded = UrlResolver::encode_package_name(name);

    match plan {
        WritePlan::Unchanged => {
            debug!(package = name, "document unchanged, skipping write");
            Ok(MutationOutcome::Unchanged)
        },
        WritePlan::Put(mut document) => {
            document.extra.remove("_revisions");
            let path = match rev {
                Some(rev) => {
                    document.rev = Some(rev.to_string());
                    format!("{}/-rev/{}", encoded, rev)
                },
                None => encoded,
            };

            let body = document.to_value().map_err(|e| SpoolError::InvalidRequest {
                message: format!("cannot serialize document for {}: {}", name, e),
            })?;
            let response = client.send(Method::PUT, &path, Some(&body), options).await?;

            if let Some(new_rev) = response.body.get("rev").and_then(|v| v.as_str()) {
                document.rev = Some(new_rev.to_string());
            }
            Ok(MutationOutcome::Applied(document))
        },
        WritePlan::DeleteDocument => {
            let rev = rev.ok_or_else(|| SpoolError::InvalidRequest {
                message: format!("cannot delete {} without a document revision", name),
            })?;
            let path = format!("{}/-rev/{}", encoded, rev);
            client.send(Method::DELETE, &path, None, options).await?;
            Ok(MutationOutcome::Deleted)
        },
    }
}

/// Reject operations that can only fail for lack of credentials
pub(crate) fn require_credentials(credentials: &Credentials) -> RegistryResult<()> {
    if credentials.is_authenticated() {
        Ok(())
    } else {
        Err(SpoolError::auth_required())
    }
}

#[cfg(test)]
mod tests;
