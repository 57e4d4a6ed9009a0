//! `spool unpublish`

use spool_core::error::SpoolResult;
use spool_registry::MutationOutcome;

use super::{client, require_version, CommandContext};

pub async fn execute(spec: &str, ctx: &CommandContext) -> SpoolResult<()> {
    let (name, version) = require_version(spec, "version")?;
    let config = ctx.default_config().await?;

    let result = client(&config)?
        .unpublish(name, version, &config.credentials())
        .await?;

    for (tarball, error) in &result.failed_attachments {
        ctx.output
            .warn(&format!("could not delete {}: {}", tarball, error));
    }

    match result.outcome {
        MutationOutcome::Unchanged => {
            ctx.output
                .info(&format!("{}@{} is not published; nothing to do", name, version));
        },
        MutationOutcome::Deleted => {
            ctx.output.success(&format!(
                "- {}@{} (last version, package removed)",
                name, version
            ));
        },
        MutationOutcome::Applied(_) => {
            ctx.output.success(&format!("- {}@{}", name, version));
        },
    }
    Ok(())
}
