//! `spool dist-tag add|rm|ls`

use spool_core::error::SpoolResult;

use super::{client, require_version, CommandContext};

pub async fn add(spec: &str, tag: &str, ctx: &CommandContext) -> SpoolResult<()> {
    let (name, version) = require_version(spec, "version")?;
    let config = ctx.default_config().await?;

    let outcome = client(&config)?
        .add_dist_tag(name, version, tag, &config.credentials())
        .await?;

    if outcome.is_unchanged() {
        ctx.output
            .info(&format!("{} already points at {}@{}", tag, name, version));
    } else {
        ctx.output.success(&format!("+{}: {}@{}", tag, name, version));
    }
    Ok(())
}

pub async fn remove(name: &str, tag: &str, ctx: &CommandContext) -> SpoolResult<()> {
    let config = ctx.default_config().await?;

    let outcome = client(&config)?
        .remove_dist_tag(name, tag, &config.credentials())
        .await?;

    if outcome.is_unchanged() {
        ctx.output.info(&format!("{} has no tag {}", name, tag));
    } else {
        ctx.output.success(&format!("-{}: {}", tag, name));
    }
    Ok(())
}

pub async fn list(name: &str, ctx: &CommandContext) -> SpoolResult<()> {
    let config = ctx.default_config().await?;

    let tags = client(&config)?
        .dist_tags(name, &config.credentials())
        .await?;

    for (tag, version) in &tags {
        ctx.output.plain(&format!("{}: {}", tag, version));
    }
    Ok(())
}
