//! `spool view`

use spool_core::error::{SpoolError, SpoolResult};
use spool_core::types::highest_version;
use spool_registry::RegistryDocument;

use super::{client, CommandContext};

pub async fn execute(name: &str, json: bool, ctx: &CommandContext) -> SpoolResult<()> {
    let config = ctx.default_config().await?;
    let document = client(&config)?
        .get_document(name, &config.credentials())
        .await?;

    if json {
        let rendered = document
            .to_value()
            .and_then(|value| serde_json::to_string_pretty(&value))
            .map_err(|e| SpoolError::JsonParse {
                message: format!("JSON serialization error: {}", e),
            })?;
        ctx.output.plain(&rendered);
        return Ok(());
    }

    for (key, value) in summary(&document) {
        ctx.output.field(&key, &value);
    }
    for (tag, version) in document.dangling_tags() {
        ctx.output
            .warn(&format!("dist-tag {} points at unpublished {}", tag, version));
    }
    Ok(())
}

/// Human-readable fields for a document
pub fn summary(document: &RegistryDocument) -> Vec<(String, String)> {
    let mut fields = vec![(
        "name".to_string(),
        document.package_name().unwrap_or("<unnamed>").to_string(),
    )];

    if let Some(latest) = document.latest() {
        fields.push(("latest".to_string(), latest.to_string()));
        let deprecated = document
            .versions
            .get(latest)
            .and_then(|v| v.deprecated.as_deref())
            .filter(|message| !message.is_empty());
        if let Some(message) = deprecated {
            fields.push(("deprecated".to_string(), message.to_string()));
        }
    }

    if let Some(highest) = highest_version(document.versions.keys().map(String::as_str)) {
        fields.push((
            "versions".to_string(),
            format!("{} (highest {})", document.versions.len(), highest),
        ));
    }

    if !document.dist_tags.is_empty() {
        let tags: Vec<String> = document
            .dist_tags
            .iter()
            .map(|(tag, version)| format!("{}={}", tag, version))
            .collect();
        fields.push(("dist-tags".to_string(), tags.join(" ")));
    }

    if let Some(maintainers) = document.maintainers.as_ref().filter(|m| !m.is_empty()) {
        let names: Vec<&str> = maintainers.iter().map(|m| m.name.as_str()).collect();
        fields.push(("maintainers".to_string(), names.join(", ")));
    }

    let stars = document.stargazers().len();
    if stars > 0 {
        fields.push(("stars".to_string(), stars.to_string()));
    }

    fields
}
