//! Deprecating versions

use spool_core::types::{parse_range, Credentials, PackageName, VersionRange};
use tracing::{debug, info};

use super::{commit, require_credentials, DocumentChange, MutationOutcome, WritePlan};
use crate::api::RegistryDocument;
use crate::client::RegistryClient;
use crate::RegistryResult;

struct DeprecateChange {
    name: PackageName,
    range: VersionRange,
    message: String,
}

impl DocumentChange for DeprecateChange {
    fn package(&self) -> &str {
        self.name.as_str()
    }

    fn apply(&self, mut current: RegistryDocument) -> RegistryResult<WritePlan> {
        let mut changed = 0;
        for (version, metadata) in current.versions.iter_mut() {
            if !self.range.matches_str(version) {
                continue;
            }
            if metadata.deprecated.as_deref() != Some(self.message.as_str()) {
                debug!(package = %self.name, %version, "deprecating");
                metadata.deprecated = Some(self.message.clone());
                changed += 1;
            }
        }

        if changed == 0 {
            return Ok(WritePlan::Unchanged);
        }
        Ok(WritePlan::Put(current))
    }
}

impl RegistryClient {
    /// Set the deprecation message of every version matching `range`.
    /// An empty message removes the deprecation.
    pub async fn deprecate(
        &self,
        name: &str,
        range: &str,
        message: &str,
        credentials: &Credentials,
    ) -> RegistryResult<MutationOutcome> {
        require_credentials(credentials)?;
        let change = DeprecateChange {
            name: PackageName::parse(name)?,
            range: parse_range(range)?,
            message: message.to_string(),
        };
        info!(package = name, range, "deprecating versions");

        Ok(commit(self, &change, credentials).await?.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(range: &str, message: &str) -> DeprecateChange {
        DeprecateChange {
            name: PackageName::parse("widget").unwrap(),
            range: parse_range(range).unwrap(),
            message: message.to_string(),
        }
    }

    fn document() -> RegistryDocument {
        RegistryDocument::from_value(json!({
            "_id": "widget",
            "_rev": "4-d",
            "versions": {
                "1.0.0": { "name": "widget", "version": "1.0.0" },
                "1.2.0": { "name": "widget", "version": "1.2.0", "deprecated": "old" },
                "2.0.0": { "name": "widget", "version": "2.0.0" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_deprecates_matching_versions() {
        let WritePlan::Put(doc) = change(">=1.0.0 <2.0.0", "use 2.x").apply(document()).unwrap()
        else {
            panic!("expected a write");
        };
        assert_eq!(doc.versions["1.0.0"].deprecated.as_deref(), Some("use 2.x"));
        assert_eq!(doc.versions["1.2.0"].deprecated.as_deref(), Some("use 2.x"));
        assert_eq!(doc.versions["2.0.0"].deprecated, None);
    }

    #[test]
    fn test_empty_message_clears() {
        let WritePlan::Put(doc) = change("1.2.0", "").apply(document()).unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(doc.versions["1.2.0"].deprecated.as_deref(), Some(""));
    }

    #[test]
    fn test_no_match_is_unchanged() {
        assert_eq!(
            change("^3.0.0", "gone").apply(document()).unwrap(),
            WritePlan::Unchanged
        );
        assert_eq!(
            change("1.2.0", "old").apply(document()).unwrap(),
            WritePlan::Unchanged
        );
    }
}
