//! is-member, members and supported commands

use super::CommandContext;
use anyhow::Result;
use dirgroup_core::types::Principal;
use serde::Serialize;

#[derive(Serialize)]
struct MembersResult {
    members: Vec<Principal>,
    /// Inputs this resolver could not expand
    unresolved: Vec<Principal>,
}

pub fn is_member(ctx: &CommandContext, user: &str, group: &str) -> Result<()> {
    let resolver = ctx.resolver()?;
    let found = resolver.is_member(user, group)?;
    ctx.print_bool(found)
}

pub fn members(ctx: &CommandContext, groups: Vec<String>) -> Result<()> {
    let resolver = ctx.resolver()?;
    let mut pending: Vec<Principal> = groups.into_iter().map(Principal::Undefined).collect();
    let members = resolver.get_members(&mut pending)?;

    let result = MembersResult {
        members,
        unresolved: pending,
    };

    if ctx.json {
        return ctx.print_json(&result);
    }

    for member in &result.members {
        println!("{}", member);
    }
    for principal in &result.unresolved {
        eprintln!("unresolved: {}", principal.name());
    }
    Ok(())
}

pub fn supported(ctx: &CommandContext, dn: &str) -> Result<()> {
    let resolver = ctx.resolver()?;
    ctx.print_bool(resolver.is_group_supported(dn))
}
