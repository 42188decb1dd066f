//! Configuration for Dirgroup

use crate::types::{filter, DistinguishedName, SearchScope};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound accepted for `groups.max_depth`.
pub const MAX_CONFIGURABLE_DEPTH: usize = 32;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirgroupConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub groups: GroupsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DirgroupConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        debug!("Loading configuration from {}", path);
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.groups.apply_server_defaults(config.directory.server_type);
        Ok(config)
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DIRGROUP_SERVER_URL") {
            config.directory.server_url = url;
        }
        if let Ok(name) = std::env::var("DIRGROUP_PROVIDER_NAME") {
            config.directory.provider_name = name;
        }
        if let Ok(dn) = std::env::var("DIRGROUP_BIND_DN") {
            config.directory.bind_dn = dn;
        }
        if let Ok(password) = std::env::var("DIRGROUP_BIND_PASSWORD") {
            config.directory.bind_password = password;
        }
        if let Ok(base) = std::env::var("DIRGROUP_USER_BASE_DN") {
            config.directory.user_base_dn = base;
        }
        if let Ok(server_type) = std::env::var("DIRGROUP_SERVER_TYPE") {
            config.directory.server_type = ServerType::from_name(&server_type);
        }
        if std::env::var("DIRGROUP_START_TLS").map(|v| v == "true").unwrap_or(false) {
            config.directory.start_tls = true;
        }
        if let Ok(timeout) = std::env::var("DIRGROUP_TIMEOUT_SECONDS") {
            if let Ok(t) = timeout.parse() {
                config.directory.timeout_seconds = t;
            }
        }
        if let Ok(level) = std::env::var("DIRGROUP_LOG_LEVEL") {
            config.logging.level = level;
        }

        // Group locations: semicolon-separated DNs
        if let Ok(locations) = std::env::var("DIRGROUP_GROUP_LOCATIONS") {
            config.groups.locations = locations
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|dn| GroupLocationConfig {
                    dn: dn.to_string(),
                    filter: None,
                    scope: SearchScope::Subtree,
                })
                .collect();
        }

        config.groups.apply_server_defaults(config.directory.server_type);
        config
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.directory.validate()?;
        self.groups.validate()
    }
}

/// Directory server connection and naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Name reported in directory errors
    #[serde(default = "default_provider_name")]
    pub provider_name: String,

    /// Server URL (ldap:// or ldaps://)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Use STARTTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Bind DN for directory queries
    #[serde(default)]
    pub bind_dn: String,

    /// Bind password
    #[serde(default)]
    pub bind_password: String,

    /// Connection and per-search timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Server flavor, used to pick default group object classes
    #[serde(default)]
    pub server_type: ServerType,

    /// Base DN for user lookups
    #[serde(default)]
    pub user_base_dn: String,

    /// Attribute naming user entries
    #[serde(default = "default_user_naming_attr")]
    pub user_naming_attribute: String,

    /// Attribute naming group entries
    #[serde(default = "default_group_naming_attr")]
    pub group_naming_attribute: String,

    /// Object class carried by user entries
    #[serde(default = "default_user_object_class")]
    pub user_object_class: String,
}

fn default_provider_name() -> String {
    "ldap".to_string()
}

fn default_server_url() -> String {
    "ldap://localhost:389".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_user_naming_attr() -> String {
    "uid".to_string()
}

fn default_group_naming_attr() -> String {
    "cn".to_string()
}

fn default_user_object_class() -> String {
    "person".to_string()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            provider_name: default_provider_name(),
            server_url: default_server_url(),
            start_tls: false,
            skip_tls_verify: false,
            bind_dn: String::new(),
            bind_password: String::new(),
            timeout_seconds: default_timeout(),
            server_type: ServerType::default(),
            user_base_dn: String::new(),
            user_naming_attribute: default_user_naming_attr(),
            group_naming_attribute: default_group_naming_attr(),
            user_object_class: default_user_object_class(),
        }
    }
}

impl DirectoryConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.server_url.is_empty() {
            return Err(crate::Error::Config("Server URL is required".into()));
        }

        if !self.server_url.starts_with("ldap://") && !self.server_url.starts_with("ldaps://") {
            return Err(crate::Error::Config(
                "Server URL must start with ldap:// or ldaps://".into(),
            ));
        }

        if self.user_base_dn.is_empty() {
            return Err(crate::Error::Config("User base DN is required".into()));
        }

        if let Err(e) = DistinguishedName::parse(&self.user_base_dn) {
            return Err(crate::Error::Config(format!(
                "Invalid user base DN '{}': {}",
                self.user_base_dn, e
            )));
        }

        for (name, value) in [
            ("user_naming_attribute", &self.user_naming_attribute),
            ("group_naming_attribute", &self.group_naming_attribute),
            ("user_object_class", &self.user_object_class),
        ] {
            if value.trim().is_empty() {
                return Err(crate::Error::Config(format!("{} must not be empty", name)));
            }
        }

        Ok(())
    }
}

/// Directory server type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerType {
    /// Generic LDAP server
    #[default]
    Ldap,
    /// Microsoft Active Directory
    ActiveDirectory,
    /// OpenLDAP
    #[serde(rename = "openldap")]
    OpenLdap,
    /// 389 Directory Server
    #[serde(rename = "389ds")]
    Directory389,
}

impl ServerType {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "active_directory" | "ad" => ServerType::ActiveDirectory,
            "openldap" => ServerType::OpenLdap,
            "389ds" => ServerType::Directory389,
            _ => ServerType::Ldap,
        }
    }

    /// Group object classes this server type ships with.
    pub fn default_object_classes(&self) -> Vec<ObjectClassConfig> {
        match self {
            ServerType::ActiveDirectory => {
                vec![ObjectClassConfig::new("group", "member", MemberKind::Static)]
            }
            ServerType::Ldap | ServerType::OpenLdap | ServerType::Directory389 => vec![
                ObjectClassConfig::new("groupOfNames", "member", MemberKind::Static),
                ObjectClassConfig::new("groupOfUniqueNames", "uniqueMember", MemberKind::Static),
                ObjectClassConfig::new("groupOfURLs", "memberURL", MemberKind::Dynamic),
            ],
        }
    }
}

/// How a group object class stores its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// Values are member DNs
    #[default]
    Static,
    /// Values are search URLs selecting the members
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectClassConfig {
    pub name: String,
    pub member_attribute: String,
    #[serde(default)]
    pub kind: MemberKind,
}

impl ObjectClassConfig {
    pub fn new(name: &str, member_attribute: &str, kind: MemberKind) -> Self {
        Self {
            name: name.to_string(),
            member_attribute: member_attribute.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLocationConfig {
    /// Root of the sub-tree holding groups
    pub dn: String,
    /// Extra filter applied to searches under this location
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub scope: SearchScope,
}

/// Group discovery and traversal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    /// Nested-group recursion ceiling
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Search the directory to tell groups from users when both share a
    /// naming attribute
    #[serde(default = "default_true")]
    pub disambiguate_by_search: bool,

    #[serde(default)]
    pub locations: Vec<GroupLocationConfig>,

    #[serde(default)]
    pub object_classes: Vec<ObjectClassConfig>,
}

fn default_max_depth() -> usize {
    crate::DEFAULT_MAX_DEPTH
}

fn default_true() -> bool {
    true
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            disambiguate_by_search: true,
            locations: Vec::new(),
            object_classes: Vec::new(),
        }
    }
}

impl GroupsConfig {
    /// Fill in object classes from the server type when none are configured.
    pub fn apply_server_defaults(&mut self, server_type: ServerType) {
        if self.object_classes.is_empty() {
            self.object_classes = server_type.default_object_classes();
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_depth > MAX_CONFIGURABLE_DEPTH {
            return Err(crate::Error::Config(format!(
                "max_depth {} exceeds the limit of {}",
                self.max_depth, MAX_CONFIGURABLE_DEPTH
            )));
        }

        if self.locations.is_empty() {
            return Err(crate::Error::Config(
                "At least one group location is required".into(),
            ));
        }

        for location in &self.locations {
            if let Err(e) = DistinguishedName::parse(&location.dn) {
                return Err(crate::Error::Config(format!(
                    "Invalid group location '{}': {}",
                    location.dn, e
                )));
            }
            if let Some(f) = &location.filter {
                if !filter::is_well_formed(&filter::parenthesize(f)) {
                    return Err(crate::Error::Config(format!(
                        "Invalid filter '{}' for group location '{}'",
                        f, location.dn
                    )));
                }
            }
        }

        for class in &self.object_classes {
            if class.name.trim().is_empty() || class.member_attribute.trim().is_empty() {
                return Err(crate::Error::Config(format!(
                    "Object class entries need a name and a member attribute: {:?}",
                    class
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
