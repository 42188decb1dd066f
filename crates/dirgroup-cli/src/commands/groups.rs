//! list-groups and user-groups commands

use super::CommandContext;
use anyhow::Result;

pub fn list(ctx: &CommandContext, pattern: Option<&str>) -> Result<()> {
    let resolver = ctx.resolver()?;
    let groups = resolver.list_groups(pattern)?;
    ctx.print_list(&groups)
}

pub fn user_groups(ctx: &CommandContext, name: &str) -> Result<()> {
    let resolver = ctx.resolver()?;
    let groups = resolver.get_user_groups(name)?;
    ctx.print_list(&groups)
}
