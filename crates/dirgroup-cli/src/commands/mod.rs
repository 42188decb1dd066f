//! CLI command implementations

pub mod groups;
pub mod membership;
pub mod probe;

use anyhow::Result;
use dirgroup_auth::{LdapDirectory, MembershipResolver};
use dirgroup_core::config::DirgroupConfig;
use serde::Serialize;

/// Context passed to all commands
pub struct CommandContext {
    pub config: DirgroupConfig,
    pub json: bool,
}

impl CommandContext {
    pub fn new(config: DirgroupConfig, json: bool) -> Self {
        Self { config, json }
    }

    /// Resolver over a live LDAP connection. Fails on invalid configuration.
    pub fn resolver(&self) -> Result<MembershipResolver<LdapDirectory>> {
        let directory = LdapDirectory::new(self.config.directory.clone());
        Ok(MembershipResolver::from_config(directory, &self.config)?)
    }

    pub fn directory(&self) -> LdapDirectory {
        LdapDirectory::new(self.config.directory.clone())
    }

    /// Print `value` as pretty JSON
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Print a list, one item per line or as a JSON array
    pub fn print_list(&self, items: &[String]) -> Result<()> {
        if self.json {
            return self.print_json(&items);
        }
        for item in items {
            println!("{}", item);
        }
        Ok(())
    }

    pub fn print_bool(&self, value: bool) -> Result<()> {
        if self.json {
            return self.print_json(&value);
        }
        println!("{}", value);
        Ok(())
    }
}
