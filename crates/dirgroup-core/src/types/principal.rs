//! Resolved principals

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a directory name once disambiguated.
///
/// `Undefined` is kept distinct so callers choose how to treat names the
/// resolver could not classify instead of the resolver guessing silently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Principal {
    User(String),
    Group(String),
    Undefined(String),
}

impl Principal {
    pub fn name(&self) -> &str {
        match self {
            Principal::User(n) | Principal::Group(n) | Principal::Undefined(n) => n,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Principal::User(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Principal::Group(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Principal::Undefined(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Principal::User(_) => "user",
            Principal::Group(_) => "group",
            Principal::Undefined(_) => "undefined",
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}
