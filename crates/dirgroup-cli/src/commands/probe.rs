//! probe command - report directory server details

use super::CommandContext;
use anyhow::{Context, Result};

pub fn execute(ctx: &CommandContext) -> Result<()> {
    ctx.config.directory.validate()?;

    let directory = ctx.directory();
    let info = directory
        .probe()
        .with_context(|| format!("Probe of {} failed", ctx.config.directory.server_url))?;

    if ctx.json {
        return ctx.print_json(&info);
    }

    println!("Server:         {}", ctx.config.directory.server_url);
    println!("Vendor:         {}", info.vendor.as_deref().unwrap_or("-"));
    println!("Version:        {}", info.version.as_deref().unwrap_or("-"));
    println!("LDAP versions:  {}", info.supported_ldap_version.join(", "));
    for context in &info.naming_contexts {
        println!("Naming context: {}", context);
    }
    Ok(())
}
