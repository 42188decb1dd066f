//! Group membership resolution
//!
//! Answers "is this user in that group", lists groups, and flattens nested
//! group membership into user principals. Groups come in two flavors: static
//! groups list member DNs, dynamic groups hold search URLs whose results are
//! the members. Both can nest other groups, so every operation walks a graph
//! that may contain cycles. The walk is bounded by a depth ceiling and skips
//! groups it has already expanded at the same or a shallower depth.
//!
//! All traversal state lives in a per-call [`ResolutionContext`]; a resolver
//! can be shared between threads.

use super::client::{DirectoryClient, LookupError, MATCH_ALL_FILTER};
use super::locations::GroupLocationIndex;
use super::registry::ObjectClassRegistry;
use dirgroup_core::config::{DirgroupConfig, MemberKind};
use dirgroup_core::types::filter::{
    combine, equality_filter, pattern_filter, rdn_filter, translate_wildcards, FilterOp,
};
use dirgroup_core::types::{
    DirectoryEntry, DistinguishedName, Principal, SearchExpression, SearchScope,
};
use dirgroup_core::{Error, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Attribute list requesting no attributes, only entry names.
const NO_ATTRIBUTES: &str = "1.1";

/// Naming and traversal settings.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub user_naming_attribute: String,
    pub group_naming_attribute: String,
    pub user_object_class: String,
    pub user_base_dn: String,
    pub max_depth: usize,
    pub disambiguate_by_search: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            user_naming_attribute: "uid".to_string(),
            group_naming_attribute: "cn".to_string(),
            user_object_class: "person".to_string(),
            user_base_dn: String::new(),
            max_depth: dirgroup_core::DEFAULT_MAX_DEPTH,
            disambiguate_by_search: true,
        }
    }
}

impl ResolverSettings {
    pub fn from_config(config: &DirgroupConfig) -> Self {
        Self {
            user_naming_attribute: config.directory.user_naming_attribute.clone(),
            group_naming_attribute: config.directory.group_naming_attribute.clone(),
            user_object_class: config.directory.user_object_class.clone(),
            user_base_dn: config.directory.user_base_dn.clone(),
            max_depth: config.groups.max_depth,
            disambiguate_by_search: config.groups.disambiguate_by_search,
        }
    }

    fn naming_attributes_differ(&self) -> bool {
        !self
            .user_naming_attribute
            .eq_ignore_ascii_case(&self.group_naming_attribute)
    }
}

/// Per-call traversal state: the shallowest depth at which each group has
/// been expanded.
///
/// A group reached again at the same or a greater depth can only reach a
/// subset of what the first visit reached, so it is skipped. Reaching it
/// at a shallower depth expands it again, keeping results identical to a
/// plain depth-bounded walk.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    visited: HashMap<String, usize>,
}

impl ResolutionContext {
    fn enter(&mut self, group: &DistinguishedName, depth: usize) -> bool {
        let key = group.normalized();
        match self.visited.get(&key) {
            Some(&seen) if seen <= depth => false,
            _ => {
                self.visited.insert(key, depth);
                true
            }
        }
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }
}

/// Member values read from one group entry.
#[derive(Debug, Default)]
struct GroupMembers {
    static_members: Vec<String>,
    dynamic_members: Vec<String>,
}

/// Outcome of expanding one group while collecting members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expansion {
    Expanded,
    /// The entry exists but carries no configured group class.
    NotAGroup,
    Missing,
    /// Depth ceiling hit or already expanded.
    Skipped,
}

/// Principals collected by `get_members`, deduplicated by name.
#[derive(Debug, Default)]
struct MemberSet {
    seen: HashSet<String>,
    members: Vec<Principal>,
}

impl MemberSet {
    fn add(&mut self, principal: Principal) {
        let key = DistinguishedName::parse(principal.name())
            .map(|dn| dn.normalized())
            .unwrap_or_else(|_| principal.name().to_lowercase());
        if self.seen.insert(key) {
            self.members.push(principal);
        }
    }
}

/// Directory-backed group membership resolver
pub struct MembershipResolver<C> {
    client: C,
    registry: ObjectClassRegistry,
    locations: GroupLocationIndex,
    settings: ResolverSettings,
}

impl<C: DirectoryClient> MembershipResolver<C> {
    pub fn new(
        client: C,
        registry: ObjectClassRegistry,
        locations: GroupLocationIndex,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            client,
            registry,
            locations,
            settings,
        }
    }

    /// Build a resolver from validated configuration.
    pub fn from_config(client: C, config: &DirgroupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            client,
            ObjectClassRegistry::new(config.groups.object_classes.clone()),
            GroupLocationIndex::from_config(&config.groups.locations)?,
            ResolverSettings::from_config(config),
        ))
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn registry(&self) -> &ObjectClassRegistry {
        &self.registry
    }

    pub fn locations(&self) -> &GroupLocationIndex {
        &self.locations
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn is_group_supported(&self, dn: &str) -> bool {
        self.locations.is_group_supported(dn)
    }

    // =========================================================================
    // Membership test
    // =========================================================================

    /// Whether `user` is a direct or nested member of `group`.
    ///
    /// Fails with `UnsupportedGroup` when `group` lies outside every group
    /// location. A missing group entry, or membership only beyond the depth
    /// ceiling, yields `false`.
    pub fn is_member(&self, user: &str, group: &str) -> Result<bool> {
        let user_dn = parse_required(user, "user")?;
        let group_dn = parse_required(group, "group")?;
        self.is_member_dn(&user_dn, &group_dn)
    }

    pub fn is_member_dn(
        &self,
        user: &DistinguishedName,
        group: &DistinguishedName,
    ) -> Result<bool> {
        if !self.locations.is_supported(group) {
            return Err(Error::UnsupportedGroup(group.to_string()));
        }

        let mut context = ResolutionContext::default();
        let found = self.is_member_at(user, group, 0, &mut context)?;
        debug!(
            "Membership of {} in {}: {} ({} groups examined)",
            user,
            group,
            found,
            context.visited()
        );
        Ok(found)
    }

    fn is_member_at(
        &self,
        user: &DistinguishedName,
        group: &DistinguishedName,
        depth: usize,
        context: &mut ResolutionContext,
    ) -> Result<bool> {
        if depth > self.settings.max_depth {
            warn!("Depth limit {} reached at {}", self.settings.max_depth, group);
            return Ok(false);
        }
        if !context.enter(group, depth) {
            return Ok(false);
        }

        let members = match self.read_group(group)? {
            Some(members) => members,
            None => return Ok(false),
        };

        let mut nested_static = Vec::new();
        for value in &members.static_members {
            match DistinguishedName::parse(value) {
                Ok(member) if member == *user => return Ok(true),
                Ok(member) => nested_static.push(member),
                Err(e) => warn!("Skipping malformed member '{}' of {}: {}", value, group, e),
            }
        }

        let mut nested_dynamic = Vec::new();
        for value in &members.dynamic_members {
            let expr = match SearchExpression::parse(value) {
                Ok(expr) => expr,
                Err(e) => {
                    warn!("Skipping malformed member URL '{}' of {}: {}", value, group, e);
                    continue;
                }
            };
            if self.dynamic_match(user, &expr)? {
                return Ok(true);
            }
            nested_dynamic.push(expr);
        }

        for candidate in &nested_static {
            if self.locations.is_supported(candidate)
                && self.is_member_at(user, candidate, depth + 1, context)?
            {
                return Ok(true);
            }
        }

        for expr in &nested_dynamic {
            for candidate in self.groups_from_search(expr)? {
                if self.locations.is_supported(&candidate)
                    && self.is_member_at(user, &candidate, depth + 1, context)?
                {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Does the dynamic member search select `user`?
    fn dynamic_match(&self, user: &DistinguishedName, expr: &SearchExpression) -> Result<bool> {
        let user_rdn = match user.first() {
            Some(rdn) => rdn_filter(rdn),
            None => return Ok(false),
        };
        let filter = combine(
            FilterOp::And,
            [
                expr.filter.clone(),
                user_rdn,
                equality_filter("objectClass", &self.settings.user_object_class),
            ],
        );
        let hits = self.search(&expr.base, expr.scope, &filter, &[NO_ATTRIBUTES])?;
        Ok(!hits.is_empty())
    }

    // =========================================================================
    // Group listing
    // =========================================================================

    /// Group DNs under every location, optionally narrowed by `pattern`.
    ///
    /// `pattern` is either a group name pattern using SQL wildcards (`Eng%`)
    /// or a parenthesized filter. Results are deduplicated across locations.
    pub fn list_groups(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let class_filter = self.registry.group_class_filter();
        if class_filter.is_empty() {
            return Ok(Vec::new());
        }

        let caller_filter = pattern
            .map(|p| self.caller_filter(p))
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let mut groups = Vec::new();

        for location in self.locations.locations() {
            let filter = combine(
                FilterOp::And,
                [
                    location.filter().unwrap_or(""),
                    class_filter,
                    caller_filter.as_str(),
                ],
            );
            let base = location.dn().to_string();
            let entries = self.search(
                &base,
                location.scope(),
                &filter,
                &[self.settings.group_naming_attribute.as_str()],
            )?;

            for entry in entries {
                if seen.insert(dn_key(&entry.dn)) {
                    groups.push(entry.dn);
                }
            }
        }

        info!("Found {} groups", groups.len());
        Ok(groups)
    }

    fn caller_filter(&self, pattern: &str) -> String {
        let translated = translate_wildcards(pattern.trim());
        if translated.is_empty() {
            String::new()
        } else if translated.starts_with('(') {
            translated
        } else {
            pattern_filter(&self.settings.group_naming_attribute, &translated)
        }
    }

    /// Groups selected by a dynamic member search.
    fn groups_from_search(&self, expr: &SearchExpression) -> Result<Vec<DistinguishedName>> {
        let class_filter = self.registry.group_class_filter();
        if class_filter.is_empty() {
            return Ok(Vec::new());
        }

        let filter = combine(FilterOp::And, [expr.filter.as_str(), class_filter]);
        let entries = self.search(&expr.base, expr.scope, &filter, &[NO_ATTRIBUTES])?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| DistinguishedName::parse(&entry.dn).ok())
            .collect())
    }

    // =========================================================================
    // User groups
    // =========================================================================

    /// Every listed group `user_name` belongs to, directly or nested.
    pub fn get_user_groups(&self, user_name: &str) -> Result<Vec<String>> {
        let user_dn = match self.find_user(user_name)? {
            Some(dn) => dn,
            None => {
                debug!("User {} not found", user_name);
                return Ok(Vec::new());
            }
        };

        let mut groups = Vec::new();
        for group in self.list_groups(None)? {
            let group_dn = match DistinguishedName::parse(&group) {
                Ok(dn) => dn,
                Err(_) => continue,
            };
            if self.locations.is_supported(&group_dn) && self.is_member_dn(&user_dn, &group_dn)? {
                groups.push(group);
            }
        }

        info!("User {} is a member of {} groups", user_name, groups.len());
        Ok(groups)
    }

    /// Full DN of the first entry under the user base whose naming attribute
    /// equals `user_name`.
    pub fn find_user(&self, user_name: &str) -> Result<Option<DistinguishedName>> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(Error::InvalidArgument("user name must not be empty".into()));
        }
        if self.settings.user_base_dn.is_empty() {
            return Err(Error::InvalidArgument("no user base DN configured".into()));
        }

        let filter = equality_filter(&self.settings.user_naming_attribute, user_name);
        let entries = self.search(
            &self.settings.user_base_dn,
            SearchScope::Subtree,
            &filter,
            &[NO_ATTRIBUTES],
        )?;

        match entries.into_iter().next() {
            Some(entry) => Ok(Some(DistinguishedName::parse(&entry.dn)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Member flattening
    // =========================================================================

    /// Flatten the membership of each group in `groups` into principals.
    ///
    /// Groups whose expansion produced at least one principal are removed
    /// from `groups`; the rest, including users and names outside every
    /// group location, are left for another provider to try. On error
    /// `groups` is left unchanged.
    pub fn get_members(&self, groups: &mut Vec<Principal>) -> Result<Vec<Principal>> {
        let mut all = MemberSet::default();
        let mut resolved = HashSet::new();

        for (index, principal) in groups.iter().enumerate() {
            let name = match principal {
                Principal::Group(name) | Principal::Undefined(name) => name,
                Principal::User(_) => continue,
            };
            let group = match DistinguishedName::parse(name) {
                Ok(dn) if self.locations.is_supported(&dn) => dn,
                _ => continue,
            };

            let mut members = MemberSet::default();
            let mut context = ResolutionContext::default();
            self.collect_members(&group, 0, &mut context, &mut members)?;

            debug!("Group {} expanded to {} principals", group, members.members.len());
            if !members.members.is_empty() {
                resolved.insert(index);
                for member in members.members {
                    all.add(member);
                }
            }
        }

        let mut index = 0;
        groups.retain(|_| {
            let keep = !resolved.contains(&index);
            index += 1;
            keep
        });

        Ok(all.members)
    }

    fn collect_members(
        &self,
        group: &DistinguishedName,
        depth: usize,
        context: &mut ResolutionContext,
        out: &mut MemberSet,
    ) -> Result<Expansion> {
        if depth > self.settings.max_depth {
            warn!("Depth limit {} reached at {}", self.settings.max_depth, group);
            return Ok(Expansion::Skipped);
        }
        if !context.enter(group, depth) {
            return Ok(Expansion::Skipped);
        }

        let members = match self.read_group_entry(group)? {
            GroupRead::Missing => return Ok(Expansion::Missing),
            GroupRead::NotAGroup => return Ok(Expansion::NotAGroup),
            GroupRead::Group(members) => members,
        };

        for value in &members.static_members {
            if let Err(e) = DistinguishedName::parse(value) {
                warn!("Skipping malformed member '{}' of {}: {}", value, group, e);
                continue;
            }
            match self.classify(value)? {
                Principal::User(name) => out.add(Principal::User(name)),
                Principal::Group(name) => self.expand_nested(&name, depth, context, out)?,
                // Unclassified names inside a group location are tried as
                // groups first; expansion falls back to a user if the entry
                // turns out not to be one.
                Principal::Undefined(name) if self.is_group_supported(&name) => {
                    self.expand_nested(&name, depth, context, out)?
                }
                undefined @ Principal::Undefined(_) => out.add(undefined),
            }
        }

        for value in &members.dynamic_members {
            let expr = match SearchExpression::parse(value) {
                Ok(expr) => expr,
                Err(e) => {
                    warn!("Skipping malformed member URL '{}' of {}: {}", value, group, e);
                    continue;
                }
            };

            let filter = combine(
                FilterOp::And,
                [
                    expr.filter.clone(),
                    equality_filter("objectClass", &self.settings.user_object_class),
                ],
            );
            for entry in self.search(&expr.base, expr.scope, &filter, &[NO_ATTRIBUTES])? {
                out.add(Principal::User(entry.dn));
            }

            for nested in self.groups_from_search(&expr)? {
                if self.locations.is_supported(&nested) {
                    self.collect_members(&nested, depth + 1, context, out)?;
                }
            }
        }

        Ok(Expansion::Expanded)
    }

    fn expand_nested(
        &self,
        name: &str,
        depth: usize,
        context: &mut ResolutionContext,
        out: &mut MemberSet,
    ) -> Result<()> {
        let nested = DistinguishedName::parse(name)?;
        match self.collect_members(&nested, depth + 1, context, out)? {
            Expansion::NotAGroup => out.add(Principal::User(name.to_string())),
            Expansion::Missing => debug!("Dangling member {} skipped", name),
            Expansion::Expanded | Expansion::Skipped => {}
        }
        Ok(())
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Classify a member name as user or group.
    ///
    /// With distinct user and group naming attributes the leading attribute
    /// decides. With a shared attribute, and searching enabled, the entry is
    /// looked up with the group class filter: a hit is a group, anything
    /// else a user. Names that cannot be parsed or decided are `Undefined`.
    pub fn classify(&self, name: &str) -> Result<Principal> {
        self.classify_with(name, self.settings.disambiguate_by_search)
    }

    pub fn classify_with(&self, name: &str, search: bool) -> Result<Principal> {
        let dn = match DistinguishedName::parse(name) {
            Ok(dn) => dn,
            Err(e) => {
                debug!("Cannot classify '{}': {}", name, e);
                return Ok(Principal::Undefined(name.to_string()));
            }
        };
        let rdn = match dn.first() {
            Some(rdn) => rdn,
            None => return Ok(Principal::Undefined(name.to_string())),
        };
        let canonical = dn.to_string();

        if self.settings.naming_attributes_differ() {
            if rdn.matches_attribute(&self.settings.group_naming_attribute)
                && self.locations.is_supported(&dn)
            {
                return Ok(Principal::Group(canonical));
            }
            if rdn.matches_attribute(&self.settings.user_naming_attribute) {
                return Ok(Principal::User(canonical));
            }
            return Ok(Principal::Undefined(canonical));
        }

        if !search {
            return Ok(Principal::Undefined(canonical));
        }
        if !self.locations.is_supported(&dn) {
            return Ok(Principal::User(canonical));
        }

        let class_filter = self.registry.group_class_filter();
        if class_filter.is_empty() {
            return Ok(Principal::User(canonical));
        }

        let filter = combine(FilterOp::And, [rdn_filter(rdn).as_str(), class_filter]);
        let hits = self.search(&canonical, SearchScope::Base, &filter, &[NO_ATTRIBUTES])?;
        if hits.is_empty() {
            Ok(Principal::User(canonical))
        } else {
            Ok(Principal::Group(canonical))
        }
    }

    // =========================================================================
    // Directory access
    // =========================================================================

    fn read_group(&self, group: &DistinguishedName) -> Result<Option<GroupMembers>> {
        match self.read_group_entry(group)? {
            GroupRead::Group(members) => Ok(Some(members)),
            GroupRead::Missing | GroupRead::NotAGroup => Ok(None),
        }
    }

    /// Read a group entry's object classes and member lists.
    fn read_group_entry(&self, group: &DistinguishedName) -> Result<GroupRead> {
        let mut attrs: Vec<&str> = vec!["objectClass"];
        attrs.extend(self.registry.member_attributes().iter().map(String::as_str));

        let name = group.to_string();
        let entry = match self
            .search(&name, SearchScope::Base, MATCH_ALL_FILTER, &attrs)?
            .into_iter()
            .next()
        {
            Some(entry) => entry,
            None => return Ok(GroupRead::Missing),
        };

        let mut members = GroupMembers::default();
        let mut is_group = false;
        for class in self.registry.classes_of(&entry.attributes) {
            is_group = true;
            let values = entry.attributes.get(&class.member_attribute);
            match class.kind {
                MemberKind::Static => members.static_members.extend_from_slice(values),
                MemberKind::Dynamic => members.dynamic_members.extend_from_slice(values),
            }
        }

        if !is_group {
            return Ok(GroupRead::NotAGroup);
        }
        Ok(GroupRead::Group(members))
    }

    /// Run one search in its own context. A missing base yields no entries;
    /// other failures become `Error::Directory`.
    fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>> {
        let result = self.client.open(base).and_then(|mut context| {
            debug!("Searching {} ({}) with filter: {}", base, scope, filter);
            context.search(scope, filter, attrs)
        });

        match result {
            Ok(entries) => Ok(entries),
            Err(LookupError::NotFound(_)) => {
                debug!("No such entry: {}", base);
                Ok(Vec::new())
            }
            Err(LookupError::Failed(message)) => {
                Err(Error::directory(self.client.provider_name(), base, message))
            }
        }
    }
}

#[derive(Debug)]
enum GroupRead {
    Group(GroupMembers),
    NotAGroup,
    Missing,
}

fn parse_required(value: &str, what: &str) -> Result<DistinguishedName> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{} name must not be empty", what)));
    }
    Ok(DistinguishedName::parse(value)?)
}

fn dn_key(dn: &str) -> String {
    DistinguishedName::parse(dn)
        .map(|d| d.normalized())
        .unwrap_or_else(|_| dn.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::super::locations::GroupLocation;
    use super::super::testing::MemoryDirectory;
    use super::*;
    use dirgroup_core::config::{ObjectClassConfig, ServerType};

    const PEOPLE: &str = "ou=People,dc=example,dc=com";
    const ALICE: &str = "uid=alice,ou=People,dc=example,dc=com";
    const BOB: &str = "uid=bob,ou=People,dc=example,dc=com";
    const CAROL: &str = "uid=carol,ou=People,dc=example,dc=com";
    const DAVE: &str = "uid=dave,ou=People,dc=example,dc=com";
    const ERIN: &str = "uid=erin,ou=People,dc=example,dc=com";
    const ENG: &str = "cn=Eng,ou=Groups,dc=example,dc=com";
    const ALL: &str = "cn=All,ou=Groups,dc=example,dc=com";
    const SUNNYVALE: &str = "cn=Sunnyvale,ou=Groups,dc=example,dc=com";
    const LOOP1: &str = "cn=Loop1,ou=Groups,dc=example,dc=com";
    const LOOP2: &str = "cn=Loop2,ou=Groups,dc=example,dc=com";
    const EMPTY: &str = "cn=Empty,ou=Groups,dc=example,dc=com";
    const MIXED: &str = "cn=Mixed,ou=Groups,dc=example,dc=com";
    const PRINTER: &str = "cn=Printer,ou=Groups,dc=example,dc=com";
    const GHOST: &str = "cn=Ghost,ou=Groups,dc=example,dc=com";
    const OUTSIDE: &str = "cn=Eng,ou=Other,dc=example,dc=com";

    fn chain(n: usize) -> String {
        format!("cn=Chain{},ou=Groups,dc=example,dc=com", n)
    }

    fn user(dir: MemoryDirectory, dn: &str, uid: &str, locality: &str) -> MemoryDirectory {
        dir.entry(
            dn,
            &[
                ("objectClass", &["top", "person"]),
                ("uid", &[uid]),
                ("l", &[locality]),
            ],
        )
    }

    fn common_name(dn: &str) -> String {
        let dn = DistinguishedName::parse(dn).unwrap();
        dn.first().unwrap().value().to_string()
    }

    fn group(dir: MemoryDirectory, dn: &str, members: &[&str]) -> MemoryDirectory {
        let cn = common_name(dn);
        dir.entry(
            dn,
            &[
                ("objectClass", &["top", "groupOfNames"]),
                ("cn", &[cn.as_str()]),
                ("member", members),
            ],
        )
    }

    fn directory() -> MemoryDirectory {
        let mut dir = MemoryDirectory::new()
            .entry("dc=example,dc=com", &[("objectClass", &["domain"])])
            .entry(PEOPLE, &[("objectClass", &["organizationalUnit"])])
            .entry("ou=Groups,dc=example,dc=com", &[("objectClass", &["organizationalUnit"])]);

        dir = user(dir, ALICE, "alice", "Austin");
        dir = user(dir, BOB, "bob", "Sunnyvale");
        dir = user(dir, CAROL, "carol", "Austin");
        dir = user(dir, DAVE, "dave", "Austin");
        dir = user(dir, ERIN, "erin", "Austin");

        dir = group(dir, ENG, &[ALICE]);
        dir = group(dir, ALL, &[ENG, CAROL]);
        dir = dir.entry(
            SUNNYVALE,
            &[
                ("objectClass", &["top", "groupOfURLs"]),
                ("cn", &["Sunnyvale"]),
                ("memberURL", &["ldap:///ou=People,dc=example,dc=com??sub?(l=Sunnyvale)"]),
            ],
        );
        dir = group(dir, LOOP1, &[LOOP2]);
        dir = group(dir, LOOP2, &[LOOP1]);
        for n in 0..6 {
            let next = chain(n + 1);
            let members: Vec<&str> = if n == 5 {
                vec![next.as_str(), ERIN]
            } else {
                vec![next.as_str()]
            };
            dir = group(dir, &chain(n), &members);
        }
        dir = group(dir, &chain(6), &[DAVE]);
        dir = group(dir, EMPTY, &[]);
        dir = group(
            dir,
            MIXED,
            &[PRINTER, GHOST, DAVE, "not a dn", "ou=Contractors,dc=example,dc=com"],
        );
        dir.entry(PRINTER, &[("objectClass", &["device"]), ("cn", &["Printer"])])
    }

    fn settings() -> ResolverSettings {
        ResolverSettings {
            user_base_dn: PEOPLE.to_string(),
            ..Default::default()
        }
    }

    fn location(dn: &str, filter: Option<&str>) -> GroupLocation {
        let dn = DistinguishedName::parse(dn).unwrap();
        GroupLocation::new(dn, filter, SearchScope::Subtree)
    }

    fn resolver_with(
        directory: MemoryDirectory,
        settings: ResolverSettings,
    ) -> MembershipResolver<MemoryDirectory> {
        MembershipResolver::new(
            directory,
            ObjectClassRegistry::new(ServerType::Ldap.default_object_classes()),
            GroupLocationIndex::new(vec![location("ou=Groups,dc=example,dc=com", None)]),
            settings,
        )
    }

    fn resolver() -> MembershipResolver<MemoryDirectory> {
        resolver_with(directory(), settings())
    }

    #[test]
    fn test_direct_membership() {
        let resolver = resolver();
        assert!(resolver.is_member(ALICE, ENG).unwrap());
        assert!(!resolver.is_member(BOB, ENG).unwrap());
        assert!(resolver.is_member(CAROL, ALL).unwrap());
        // Names compare ignoring case and spacing
        assert!(resolver
            .is_member("UID=Alice, OU=People, DC=example, DC=com", "cn=eng,ou=groups,dc=example,dc=com")
            .unwrap());
        assert_eq!(resolver.client().open_contexts(), 0);
    }

    #[test]
    fn test_nested_membership() {
        let resolver = resolver();
        assert!(resolver.is_member(ALICE, ALL).unwrap());
        assert!(!resolver.is_member(BOB, ALL).unwrap());
    }

    #[test]
    fn test_dynamic_membership() {
        let resolver = resolver();
        assert!(resolver.is_member(BOB, SUNNYVALE).unwrap());
        assert!(!resolver.is_member(ALICE, SUNNYVALE).unwrap());
    }

    #[test]
    fn test_dynamic_membership_through_nested_groups() {
        let dyn_eng = "cn=DynEng,ou=Groups,dc=example,dc=com";
        let directory = directory().entry(
            dyn_eng,
            &[
                ("objectClass", &["groupOfURLs"]),
                ("cn", &["DynEng"]),
                ("memberURL", &["ldap:///ou=Groups,dc=example,dc=com??sub?(cn=Eng)"]),
            ],
        );
        let resolver = resolver_with(directory, settings());

        // The URL selects no users, only the Eng group, which holds alice
        assert!(resolver.is_member(ALICE, dyn_eng).unwrap());
        assert!(!resolver.is_member(BOB, dyn_eng).unwrap());

        let mut input = vec![Principal::Group(dyn_eng.to_string())];
        let members = resolver.get_members(&mut input).unwrap();
        assert_eq!(members, vec![Principal::User(ALICE.to_string())]);
        assert!(input.is_empty());
        assert_eq!(resolver.client().open_contexts(), 0);
    }

    #[test]
    fn test_cycle_terminates() {
        let resolver = resolver();
        assert!(!resolver.is_member(BOB, LOOP1).unwrap());
        // One read per group; the second visit to Loop1 is skipped
        assert_eq!(resolver.client().searches(), 2);
    }

    #[test]
    fn test_depth_limit() {
        let resolver = resolver();
        // Chain5 is five levels below Chain0, Chain6 is six
        assert!(resolver.is_member(ERIN, &chain(0)).unwrap());
        assert!(!resolver.is_member(DAVE, &chain(0)).unwrap());
        assert!(resolver.is_member(DAVE, &chain(1)).unwrap());
    }

    #[test]
    fn test_get_members_depth_limit() {
        let resolver = resolver();
        let mut input = vec![Principal::Group(chain(0))];
        let members = resolver.get_members(&mut input).unwrap();
        // Erin sits in Chain5; Dave in Chain6 is past the ceiling
        assert_eq!(members, vec![Principal::User(ERIN.to_string())]);
        assert!(input.is_empty());
    }

    #[test]
    fn test_missing_group_is_not_an_error() {
        let resolver = resolver();
        assert!(!resolver.is_member(ALICE, GHOST).unwrap());
        assert!(!resolver.is_member(ALICE, PRINTER).unwrap());
    }

    #[test]
    fn test_membership_argument_errors() {
        let resolver = resolver();
        assert_eq!(resolver.is_member(ALICE, OUTSIDE).unwrap_err().code(), "UnsupportedGroup");
        assert_eq!(resolver.is_member("", ENG).unwrap_err().code(), "InvalidArgument");
        assert_eq!(resolver.is_member(ALICE, "  ").unwrap_err().code(), "InvalidArgument");
        assert_eq!(resolver.is_member("not a dn", ENG).unwrap_err().code(), "MalformedName");
        assert_eq!(
            resolver
                .is_member(ALICE, "cn=John+uid=jd,ou=Groups,dc=example,dc=com")
                .unwrap_err()
                .code(),
            "MalformedName"
        );
        assert_eq!(resolver.client().searches(), 0);
    }

    #[test]
    fn test_directory_failure_names_provider() {
        let resolver = resolver_with(directory().failing_at(ENG), settings());
        match resolver.is_member(ALICE, ALL).unwrap_err() {
            Error::Directory { provider, name, .. } => {
                assert_eq!(provider, "memory");
                assert_eq!(name, ENG);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(resolver.client().open_contexts(), 0);
    }

    #[test]
    fn test_list_groups() {
        let resolver = resolver();
        let groups = resolver.list_groups(None).unwrap();
        assert_eq!(groups.len(), 14);
        assert_eq!(groups[0], ENG);
        assert!(!groups.iter().any(|g| g == PRINTER));
        assert_eq!(resolver.client().open_contexts(), 0);
    }

    #[test]
    fn test_list_groups_with_pattern() {
        let resolver = resolver();
        assert_eq!(resolver.list_groups(Some("Loop%")).unwrap(), vec![LOOP1, LOOP2]);
        assert_eq!(resolver.list_groups(Some("Loop_")).unwrap(), vec![LOOP1, LOOP2]);
        assert_eq!(resolver.list_groups(Some("(cn=Eng)")).unwrap(), vec![ENG]);
        assert!(resolver.list_groups(Some("Nothing%")).unwrap().is_empty());
    }

    #[test]
    fn test_list_groups_deduplicates_locations() {
        let resolver = MembershipResolver::new(
            directory(),
            ObjectClassRegistry::new(ServerType::Ldap.default_object_classes()),
            GroupLocationIndex::new(vec![
                location("ou=Groups,dc=example,dc=com", None),
                location("dc=example,dc=com", Some("cn=Eng")),
            ]),
            settings(),
        );
        let groups = resolver.list_groups(None).unwrap();
        assert_eq!(groups.len(), 14);
        assert_eq!(groups.iter().filter(|g| *g == ENG).count(), 1);
    }

    #[test]
    fn test_list_groups_without_classes() {
        let resolver = MembershipResolver::new(
            directory(),
            ObjectClassRegistry::default(),
            GroupLocationIndex::new(vec![location("ou=Groups,dc=example,dc=com", None)]),
            settings(),
        );
        assert!(resolver.list_groups(None).unwrap().is_empty());
        assert_eq!(resolver.client().searches(), 0);
    }

    #[test]
    fn test_get_user_groups() {
        let resolver = resolver();
        assert_eq!(resolver.get_user_groups("alice").unwrap(), vec![ENG, ALL]);
        assert_eq!(resolver.get_user_groups("bob").unwrap(), vec![SUNNYVALE]);
        assert!(resolver.get_user_groups("nobody").unwrap().is_empty());
        assert_eq!(resolver.client().open_contexts(), 0);
    }

    #[test]
    fn test_get_user_groups_arguments() {
        let resolver = resolver();
        assert_eq!(resolver.get_user_groups("").unwrap_err().code(), "InvalidArgument");

        let resolver = resolver_with(directory(), ResolverSettings::default());
        assert_eq!(resolver.get_user_groups("alice").unwrap_err().code(), "InvalidArgument");
    }

    #[test]
    fn test_get_members_flattens_nested_groups() {
        let resolver = resolver();
        let mut input = vec![
            Principal::Group(ALL.to_string()),
            Principal::Group(EMPTY.to_string()),
            Principal::User(ALICE.to_string()),
            Principal::Undefined(OUTSIDE.to_string()),
        ];

        let members = resolver.get_members(&mut input).unwrap();
        assert_eq!(
            members,
            vec![Principal::User(ALICE.to_string()), Principal::User(CAROL.to_string())]
        );
        assert_eq!(
            input,
            vec![
                Principal::Group(EMPTY.to_string()),
                Principal::User(ALICE.to_string()),
                Principal::Undefined(OUTSIDE.to_string()),
            ]
        );
        assert_eq!(resolver.client().open_contexts(), 0);
    }

    #[test]
    fn test_get_members_dynamic_group() {
        let resolver = resolver();
        let mut input = vec![Principal::Undefined(SUNNYVALE.to_string())];
        let members = resolver.get_members(&mut input).unwrap();
        assert_eq!(members, vec![Principal::User(BOB.to_string())]);
        assert!(input.is_empty());
    }

    #[test]
    fn test_get_members_mixed_values() {
        let resolver = resolver();
        let mut input = vec![Principal::Group(MIXED.to_string())];
        let members = resolver.get_members(&mut input).unwrap();
        assert_eq!(
            members,
            vec![
                // A non-group entry inside a group location is a user;
                // the unparseable value is skipped
                Principal::User(PRINTER.to_string()),
                Principal::User(DAVE.to_string()),
                Principal::Undefined("ou=Contractors,dc=example,dc=com".to_string()),
            ]
        );
    }

    #[test]
    fn test_get_members_cycle_and_dedupe() {
        let resolver = resolver();
        let mut input = vec![Principal::Group(LOOP1.to_string())];
        assert!(resolver.get_members(&mut input).unwrap().is_empty());
        assert_eq!(input.len(), 1);

        let mut input = vec![
            Principal::Group(ENG.to_string()),
            Principal::Group(ALL.to_string()),
        ];
        let members = resolver.get_members(&mut input).unwrap();
        assert_eq!(
            members,
            vec![Principal::User(ALICE.to_string()), Principal::User(CAROL.to_string())]
        );
        assert!(input.is_empty());
    }

    #[test]
    fn test_get_members_error_leaves_input() {
        let resolver = resolver_with(directory().failing_at(ENG), settings());
        let mut input = vec![Principal::Group(ALL.to_string())];
        assert_eq!(resolver.get_members(&mut input).unwrap_err().code(), "DirectoryError");
        assert_eq!(input, vec![Principal::Group(ALL.to_string())]);
    }

    #[test]
    fn test_classify_by_naming_attribute() {
        let resolver = resolver();
        assert_eq!(resolver.classify(ENG).unwrap(), Principal::Group(ENG.to_string()));
        assert_eq!(resolver.classify(ALICE).unwrap(), Principal::User(ALICE.to_string()));
        assert_eq!(resolver.classify(OUTSIDE).unwrap(), Principal::Undefined(OUTSIDE.to_string()));
        assert_eq!(
            resolver.classify("garbage").unwrap(),
            Principal::Undefined("garbage".to_string())
        );
        assert_eq!(resolver.client().searches(), 0);
    }

    #[test]
    fn test_classify_by_search() {
        let resolver = resolver_with(
            directory(),
            ResolverSettings {
                user_naming_attribute: "cn".to_string(),
                ..settings()
            },
        );

        assert_eq!(resolver.classify(ENG).unwrap(), Principal::Group(ENG.to_string()));
        assert_eq!(resolver.classify(PRINTER).unwrap(), Principal::User(PRINTER.to_string()));
        assert_eq!(resolver.classify(GHOST).unwrap(), Principal::User(GHOST.to_string()));
        let searches = resolver.client().searches();

        // Outside every location: a user, without asking the directory
        let outside = "cn=Alice,ou=People,dc=example,dc=com";
        assert_eq!(resolver.classify(outside).unwrap(), Principal::User(outside.to_string()));
        assert_eq!(
            resolver.classify_with(ENG, false).unwrap(),
            Principal::Undefined(ENG.to_string())
        );
        assert_eq!(resolver.client().searches(), searches);
    }

    #[test]
    fn test_static_scenario_with_common_names() {
        let directory = MemoryDirectory::new()
            .entry(PEOPLE, &[("objectClass", &["organizationalUnit"])])
            .entry(
                "cn=alice,ou=People,dc=example,dc=com",
                &[("objectClass", &["person"]), ("cn", &["alice"])],
            )
            .entry(
                "cn=bob,ou=People,dc=example,dc=com",
                &[("objectClass", &["person"]), ("cn", &["bob"])],
            )
            .entry(
                ENG,
                &[
                    ("objectClass", &["groupOfNames"]),
                    ("member", &["cn=alice,ou=People,dc=example,dc=com"]),
                ],
            );
        let resolver = MembershipResolver::new(
            directory,
            ObjectClassRegistry::new(vec![ObjectClassConfig::new(
                "groupOfNames",
                "member",
                MemberKind::Static,
            )]),
            GroupLocationIndex::new(vec![location("ou=Groups,dc=example,dc=com", None)]),
            ResolverSettings::default(),
        );

        assert!(resolver.is_member("cn=alice,ou=People,dc=example,dc=com", ENG).unwrap());
        assert!(!resolver.is_member("cn=bob,ou=People,dc=example,dc=com", ENG).unwrap());
    }

    #[test]
    fn test_dynamic_group_matching_nobody() {
        let nobody = "cn=Nobody,ou=Groups,dc=example,dc=com";
        let directory = directory().entry(
            nobody,
            &[
                ("objectClass", &["groupOfURLs"]),
                ("cn", &["Nobody"]),
                ("memberURL", &["ldap:///ou=People,dc=example,dc=com??sub?(l=Nowhere)"]),
            ],
        );
        let resolver = resolver_with(directory, settings());
        assert!(!resolver.is_member(ALICE, nobody).unwrap());
        assert!(!resolver.is_member(BOB, nobody).unwrap());

        let mut input = vec![Principal::Group(nobody.to_string())];
        assert!(resolver.get_members(&mut input).unwrap().is_empty());
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn test_resolution_context_depths() {
        let mut context = ResolutionContext::default();
        let dn = DistinguishedName::parse(ENG).unwrap();
        assert!(context.enter(&dn, 2));
        assert!(!context.enter(&dn, 2));
        assert!(!context.enter(&dn, 3));
        assert!(context.enter(&dn, 1));
        assert_eq!(context.visited(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = DirgroupConfig::from_toml(
            r#"
            [directory]
            provider_name = "corp"
            user_base_dn = "ou=People,dc=example,dc=com"

            [groups]
            max_depth = 3

            [[groups.locations]]
            dn = "ou=Groups,dc=example,dc=com"
            "#,
        )
        .unwrap();

        let resolver = MembershipResolver::from_config(directory(), &config).unwrap();
        assert_eq!(resolver.settings().max_depth, 3);
        assert_eq!(resolver.settings().user_base_dn, PEOPLE);
        assert_eq!(resolver.registry().classes().len(), 3);
        assert!(resolver.is_group_supported(ENG));
        assert!(resolver.is_member(ALICE, ALL).unwrap());
    }
}
