//! `spool star` and `spool unstar`

use spool_core::error::SpoolResult;

use super::{client, CommandContext};

pub async fn execute(name: &str, starred: bool, ctx: &CommandContext) -> SpoolResult<()> {
    let config = ctx.default_config().await?;

    client(&config)?
        .star(name, starred, &config.credentials())
        .await?;

    let mark = if starred { "★" } else { "☆" };
    ctx.output.success(&format!("{}  {}", mark, name));
    Ok(())
}
