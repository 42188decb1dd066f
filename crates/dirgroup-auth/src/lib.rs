//! Directory-backed group membership for Dirgroup

pub mod ldap;

pub use ldap::{
    DirectoryClient, DirectoryContext, GroupLocation, GroupLocationIndex, LdapDirectory,
    LdapServerInfo, LookupError, MembershipResolver, ObjectClassRegistry, ResolverSettings,
};
