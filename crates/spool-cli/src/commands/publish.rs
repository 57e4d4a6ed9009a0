//! `spool publish`

use std::collections::HashMap;

use camino::Utf8PathBuf;
use spool_config::{ConfigLoader, ConfigSource};
use spool_core::error::{SpoolError, SpoolResult};
use spool_registry::PublishRequest;

use super::{client, CommandContext};

/// Publish `tarball` using the package.json found in `dir`
pub async fn execute(
    tarball: Utf8PathBuf,
    dir: Utf8PathBuf,
    tag: Option<String>,
    access: Option<String>,
    ctx: &CommandContext,
) -> SpoolResult<()> {
    let loader = ConfigLoader::new(ctx.cwd.clone());
    let (package, path) = loader.load_package_json(&dir).await?;
    package.ensure_publishable()?;

    let package_layer = package
        .publish_config
        .as_ref()
        .map(|publish_config| (publish_config.as_layer(), ConfigSource::PackageJson(path)));

    let mut overrides = HashMap::new();
    if let Some(tag) = tag {
        overrides.insert("tag".to_string(), tag);
    }
    if let Some(access) = access {
        overrides.insert("access".to_string(), access);
    }
    let config = ctx.load_config(package_layer, overrides).await?;

    let tarball_path = ctx.cwd.join(&tarball);
    let bytes = tokio::fs::read(&tarball_path)
        .await
        .map_err(|e| SpoolError::io(format!("Failed to read {}", tarball_path), e))?;

    let mut request =
        PublishRequest::new(package.to_manifest(), bytes).with_tag(config.publish_tag());
    if let Some(access) = &config.publish.access {
        request = request.with_access(access.clone());
    }

    client(&config)?
        .publish(&request, &config.credentials())
        .await?;

    ctx.output.success(&format!(
        "+ {}@{} ({})",
        package.name,
        package.version,
        config.publish_tag()
    ));
    Ok(())
}
