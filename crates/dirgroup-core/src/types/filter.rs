//! Search filter construction
//!
//! Builds RFC 4515 filter text from attribute/value pairs. Values are
//! escaped so caller-supplied names cannot change the filter's structure.

use super::dn::Rdn;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Boolean operator joining filter fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    And,
    Or,
}

impl FilterOp {
    fn symbol(self) -> char {
        match self {
            FilterOp::And => '&',
            FilterOp::Or => '|',
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Right-hand side of an attribute in [`and_filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    One(String),
    /// Matches when the attribute equals any of the values.
    AnyOf(Vec<String>),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::One(value.to_string())
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        FilterValue::AnyOf(values)
    }
}

/// Escape an assertion value: `*`, `(`, `)`, `\` and NUL become `\XX`.
pub fn escape_value(value: &str) -> String {
    escape_with(value, true)
}

/// Like [`escape_value`] but leaves `*` alone so it keeps its wildcard meaning.
pub fn escape_pattern(value: &str) -> String {
    escape_with(value, false)
}

fn escape_with(value: &str, escape_star: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' if escape_star => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\\' => out.push_str("\\5c"),
            '\0' => out.push_str("\\00"),
            c => out.push(c),
        }
    }
    out
}

/// `(attr=value)` with the value escaped. An empty value becomes the
/// presence test `(attr=*)`.
pub fn equality_filter(attribute: &str, value: &str) -> String {
    if value.is_empty() {
        return format!("({}=*)", attribute);
    }
    format!("({}={})", attribute, escape_value(value))
}

/// `(attr=pattern)` where `*` in the pattern is a wildcard.
pub fn pattern_filter(attribute: &str, pattern: &str) -> String {
    if pattern.is_empty() {
        return format!("({}=*)", attribute);
    }
    format!("({}={})", attribute, escape_pattern(pattern))
}

/// Exact-match filter for one name component, e.g. `(cn=Eng)`.
pub fn rdn_filter(rdn: &Rdn) -> String {
    equality_filter(rdn.attribute(), rdn.value())
}

/// AND together one clause per attribute. A list value becomes an OR-group of
/// equality tests for that attribute.
pub fn and_filter(clauses: &BTreeMap<String, FilterValue>) -> Result<String> {
    if clauses.is_empty() {
        return Err(Error::InvalidArgument(
            "cannot build a filter from an empty attribute map".into(),
        ));
    }

    let fragments = clauses.iter().map(|(attribute, value)| match value {
        FilterValue::One(v) => equality_filter(attribute, v),
        FilterValue::AnyOf(values) if values.is_empty() => equality_filter(attribute, ""),
        FilterValue::AnyOf(values) => combine(
            FilterOp::Or,
            values.iter().map(|v| equality_filter(attribute, v)),
        ),
    });

    Ok(combine(FilterOp::And, fragments))
}

/// Translate SQL `LIKE` wildcards to directory wildcards. Both `%` and `_`
/// become `*`; `_` therefore matches any run of characters, not exactly one.
pub fn translate_wildcards(pattern: &str) -> String {
    pattern.replace(['%', '_'], "*")
}

/// Join fragments under `op`. Empty fragments are skipped; a single remaining
/// fragment is returned as-is and no fragments give an empty string.
pub fn combine<I, S>(op: FilterOp, fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = fragments
        .into_iter()
        .map(|f| f.as_ref().trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();

    match parts.len() {
        0 => String::new(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({}{})", op.symbol(), parts.concat()),
    }
}

/// Wrap a fragment in parentheses unless it already is parenthesized.
pub fn parenthesize(fragment: &str) -> String {
    let trimmed = fragment.trim();
    if trimmed.is_empty() || (trimmed.starts_with('(') && trimmed.ends_with(')')) {
        trimmed.to_string()
    } else {
        format!("({})", trimmed)
    }
}

/// Cheap structural check: parentheses balance and the text is one
/// parenthesized expression.
pub fn is_well_formed(filter: &str) -> bool {
    let trimmed = filter.trim();
    if !trimmed.starts_with('(') || !trimmed.ends_with(')') {
        return false;
    }

    let mut depth = 0i32;
    let mut escaped = false;
    for (i, ch) in trimmed.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 || (depth == 0 && i != trimmed.len() - 1) {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
