//! `spool whoami`

use spool_core::error::SpoolResult;

use super::{client, CommandContext};

pub async fn execute(ctx: &CommandContext) -> SpoolResult<()> {
    let config = ctx.default_config().await?;
    let username = client(&config)?.whoami(&config.credentials()).await?;
    ctx.output.plain(&username);
    Ok(())
}
