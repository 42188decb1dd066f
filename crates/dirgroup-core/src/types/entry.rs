//! Directory entries as returned by a search

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Search breadth below the base entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// The base entry only.
    Base,
    /// Immediate children of the base.
    #[serde(alias = "one")]
    OneLevel,
    /// The base and all descendants.
    #[default]
    #[serde(alias = "sub")]
    Subtree,
}

impl SearchScope {
    /// Parse the scope token of a search URL (`base`, `one`, `sub`).
    pub fn from_url_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "base" => Some(SearchScope::Base),
            "one" | "onelevel" => Some(SearchScope::OneLevel),
            "sub" | "subtree" => Some(SearchScope::Subtree),
            _ => None,
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchScope::Base => "base",
            SearchScope::OneLevel => "one",
            SearchScope::Subtree => "sub",
        };
        f.write_str(s)
    }
}

/// Attribute name -> values, with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    values: HashMap<String, Vec<String>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values under `name`, merging with any differently-cased key.
    pub fn insert<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .entry(name.to_ascii_lowercase())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// All values of an attribute; empty when absent.
    pub fn get(&self, name: &str) -> &[String] {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).first().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    /// Case-insensitive value membership test.
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.get(name).iter().any(|v| v.eq_ignore_ascii_case(value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, Vec<String>)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (S, Vec<String>)>>(iter: T) -> Self {
        let mut attrs = Attributes::new();
        for (name, values) in iter {
            attrs.insert(name.as_ref(), values);
        }
        attrs
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: Attributes,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }
}
