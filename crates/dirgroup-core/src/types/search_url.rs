//! Dynamic member search expressions
//!
//! Dynamic groups store their membership as an LDAP URL such as
//! `ldap:///ou=People,dc=example,dc=com??sub?(departmentNumber=42)`.
//! Only the base, scope and filter parts matter here; host, requested
//! attributes and extensions are ignored.

use super::entry::SearchScope;
use super::filter::parenthesize;
use crate::{Error, Result};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parsed form of a dynamic member value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchExpression {
    /// Search base (a distinguished name, possibly empty).
    pub base: String,
    pub scope: SearchScope,
    /// Parenthesized filter, or empty to match everything under `base`.
    pub filter: String,
}

impl SearchExpression {
    /// Parse a search URL or a bare `base?attrs?scope?filter` expression.
    ///
    /// Without a `?` the whole trimmed expression is the base and the filter
    /// is empty. The scope defaults to sub-tree.
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("empty search expression".into()));
        }

        let (head, tail) = match trimmed.find('?') {
            Some(idx) => (&trimmed[..idx], Some(&trimmed[idx + 1..])),
            None => (trimmed, None),
        };

        let base = decode(strip_scheme_and_host(head))?;

        let mut scope = SearchScope::Subtree;
        let mut filter = String::new();

        if let Some(tail) = tail {
            let parts: Vec<&str> = tail.split('?').collect();
            match parts.as_slice() {
                // `base?(filter)`: a lone filter in the attributes slot.
                [only] if only.trim_start().starts_with('(') => {
                    filter = decode(only)?;
                }
                [_attrs] => {}
                [_attrs, scope_token, rest @ ..] => {
                    if !scope_token.trim().is_empty() {
                        scope = SearchScope::from_url_token(scope_token).ok_or_else(|| {
                            Error::InvalidArgument(format!(
                                "unknown scope '{}' in search expression '{}'",
                                scope_token, trimmed
                            ))
                        })?;
                    }
                    if let Some(f) = rest.first() {
                        filter = decode(f)?;
                    }
                }
                [] => {}
            }
        }

        Ok(Self {
            base: base.trim().to_string(),
            scope,
            filter: parenthesize(&filter),
        })
    }

    pub fn has_filter(&self) -> bool {
        !self.filter.is_empty()
    }
}

impl fmt::Display for SearchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ldap:///{}??{}?{}", self.base, self.scope, self.filter)
    }
}

/// Drop a leading `scheme://host:port/` or bare `host:port/` segment, if any.
///
/// Without a scheme, the text before the first `/` is a host only when it
/// holds no `=`; otherwise the `/` belongs to a component value.
fn strip_scheme_and_host(head: &str) -> &str {
    let (has_scheme, rest) = match head.find("://") {
        Some(idx) => (true, &head[idx + 3..]),
        None => (false, head),
    };

    match rest.find('/') {
        Some(slash) if has_scheme || !rest[..slash].contains('=') => &rest[slash + 1..],
        Some(_) => rest,
        None if has_scheme => "",
        None => rest,
    }
}

fn decode(part: &str) -> Result<String> {
    percent_decode_str(part)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| Error::InvalidArgument(format!("invalid percent-encoding in '{}': {}", part, e)))
}
