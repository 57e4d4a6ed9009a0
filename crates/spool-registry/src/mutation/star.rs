//! Starring and unstarring packages

use spool_core::types::{Credentials, PackageName};
use tracing::info;

use super::{commit, require_credentials, DocumentChange, MutationOutcome, WritePlan};
use crate::api::RegistryDocument;
use crate::client::RegistryClient;
use crate::RegistryResult;

struct StarChange {
    name: PackageName,
    username: String,
    starred: bool,
}

impl DocumentChange for StarChange {
    fn package(&self) -> &str {
        self.name.as_str()
    }

    /// Only `_id`, `_rev` and `users` are written back
    fn apply(&self, current: RegistryDocument) -> RegistryResult<WritePlan> {
        let mut users = current.users.unwrap_or_default();
        let changed = if self.starred {
            users.insert(self.username.clone(), true) != Some(true)
        } else {
            users.remove(&self.username).is_some()
        };
        if !changed {
            return Ok(WritePlan::Unchanged);
        }

        Ok(WritePlan::Put(RegistryDocument {
            id: current.id.or_else(|| Some(self.name.to_string())),
            rev: current.rev,
            users: Some(users),
            ..RegistryDocument::default()
        }))
    }
}

impl RegistryClient {
    /// Star (`starred = true`) or unstar a package as the authenticated user
    pub async fn star(
        &self,
        name: &str,
        starred: bool,
        credentials: &Credentials,
    ) -> RegistryResult<MutationOutcome> {
        require_credentials(credentials)?;
        let name = PackageName::parse(name)?;

        let username = match credentials.basic_pair() {
            Some((username, _)) => username.to_string(),
            None => self.whoami(credentials).await?,
        };
        info!(package = %name, user = %username, starred, "updating star");

        let change = StarChange {
            name,
            username,
            starred,
        };
        Ok(commit(self, &change, credentials).await?.outcome)
    }
}
