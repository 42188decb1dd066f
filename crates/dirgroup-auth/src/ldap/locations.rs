//! Group locations
//!
//! The sub-trees that may contain groups. A name outside every location can
//! never be a group this resolver handles.

use dirgroup_core::config::GroupLocationConfig;
use dirgroup_core::types::filter::parenthesize;
use dirgroup_core::types::{DistinguishedName, SearchScope};
use dirgroup_core::{Error, Result};

/// A sub-tree root plus an optional extra filter. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLocation {
    dn: DistinguishedName,
    filter: Option<String>,
    scope: SearchScope,
}

impl GroupLocation {
    pub fn new(dn: DistinguishedName, filter: Option<&str>, scope: SearchScope) -> Self {
        let filter = filter.map(parenthesize).filter(|f| !f.is_empty());
        Self { dn, filter, scope }
    }

    pub fn from_config(config: &GroupLocationConfig) -> Result<Self> {
        let dn = DistinguishedName::parse(&config.dn).map_err(|e| {
            Error::Config(format!("Invalid group location '{}': {}", config.dn, e))
        })?;
        Ok(Self::new(dn, config.filter.as_deref(), config.scope))
    }

    pub fn dn(&self) -> &DistinguishedName {
        &self.dn
    }

    /// Parenthesized extra filter, if any.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn scope(&self) -> SearchScope {
        self.scope
    }

    pub fn contains(&self, dn: &DistinguishedName) -> bool {
        self.dn.is_suffix_of(dn)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupLocationIndex {
    locations: Vec<GroupLocation>,
}

impl GroupLocationIndex {
    pub fn new(locations: Vec<GroupLocation>) -> Self {
        Self { locations }
    }

    pub fn from_config(configs: &[GroupLocationConfig]) -> Result<Self> {
        let locations = configs
            .iter()
            .map(GroupLocation::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(locations))
    }

    pub fn locations(&self) -> &[GroupLocation] {
        &self.locations
    }

    /// True iff `dn` lies under some location. Malformed names are simply
    /// not supported.
    pub fn is_group_supported(&self, dn: &str) -> bool {
        match DistinguishedName::parse(dn) {
            Ok(parsed) => self.is_supported(&parsed),
            Err(_) => false,
        }
    }

    pub fn is_supported(&self, dn: &DistinguishedName) -> bool {
        self.location_for(dn).is_some()
    }

    /// First location containing `dn`.
    pub fn location_for(&self, dn: &DistinguishedName) -> Option<&GroupLocation> {
        self.locations.iter().find(|location| location.contains(dn))
    }
}
