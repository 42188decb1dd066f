//! LDAP group membership module
//!
//! Resolves group membership against:
//! - LDAP (OpenLDAP, 389 Directory Server)
//! - Microsoft Active Directory
//!
//! Features:
//! - Static and dynamic (search URL) groups
//! - Nested groups with cycle detection and a depth ceiling
//! - Group listing with SQL-style name patterns
//! - Member flattening into user principals

mod client;
mod locations;
mod registry;
mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    DirectoryClient, DirectoryContext, LdapDirectory, LdapServerInfo, LookupError,
    MATCH_ALL_FILTER,
};
pub use locations::{GroupLocation, GroupLocationIndex};
pub use registry::ObjectClassRegistry;
pub use resolver::{MembershipResolver, ResolutionContext, ResolverSettings};
