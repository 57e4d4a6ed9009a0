//! `spool deprecate`

use spool_core::error::SpoolResult;

use super::{client, require_version, CommandContext};

pub async fn execute(spec: &str, message: &str, ctx: &CommandContext) -> SpoolResult<()> {
    let (name, range) = require_version(spec, "range")?;
    let config = ctx.default_config().await?;

    let outcome = client(&config)?
        .deprecate(name, range, message, &config.credentials())
        .await?;

    if outcome.is_unchanged() {
        ctx.output
            .info(&format!("no versions of {} matching {} needed changes", name, range));
    } else if message.is_empty() {
        ctx.output.success(&format!("un-deprecated {}@{}", name, range));
    } else {
        ctx.output.success(&format!("deprecated {}@{}", name, range));
    }
    Ok(())
}
