//! In-memory directory for tests

use super::client::{DirectoryClient, DirectoryContext, LookupError};
use dirgroup_core::types::{Attributes, DirectoryEntry, DistinguishedName, SearchScope};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixture directory. Searches are evaluated against `entries` with a small
/// filter interpreter.
#[derive(Default)]
pub struct MemoryDirectory {
    entries: Vec<(DistinguishedName, DirectoryEntry)>,
    failing: HashSet<String>,
    searches: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, dn: &str, attrs: &[(&str, &[&str])]) -> Self {
        let attributes: Attributes = attrs
            .iter()
            .map(|(name, values)| {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                (*name, values)
            })
            .collect();
        let parsed = DistinguishedName::parse(dn).expect("fixture DN");
        self.entries.push((parsed, DirectoryEntry::new(dn, attributes)));
        self
    }

    /// Make every context opened at `base` fail.
    pub fn failing_at(mut self, base: &str) -> Self {
        self.failing.insert(normalize(base));
        self
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn open_contexts(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

fn normalize(dn: &str) -> String {
    DistinguishedName::parse(dn)
        .map(|d| d.normalized())
        .unwrap_or_default()
}

impl DirectoryClient for MemoryDirectory {
    fn provider_name(&self) -> &str {
        "memory"
    }

    fn open(&self, base: &str) -> Result<Box<dyn DirectoryContext + '_>, LookupError> {
        if self.failing.contains(&normalize(base)) {
            return Err(LookupError::Failed("server unavailable".to_string()));
        }

        let base = if base.trim().is_empty() {
            None
        } else {
            let parsed = DistinguishedName::parse(base)
                .map_err(|e| LookupError::Failed(format!("invalid DN syntax: {}", e)))?;
            if !self.entries.iter().any(|(dn, _)| *dn == parsed) {
                return Err(LookupError::NotFound(base.to_string()));
            }
            Some(parsed)
        };

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryContext {
            directory: self,
            base,
        }))
    }
}

struct MemoryContext<'a> {
    directory: &'a MemoryDirectory,
    base: Option<DistinguishedName>,
}

impl MemoryContext<'_> {
    fn in_scope(&self, dn: &DistinguishedName, scope: SearchScope) -> bool {
        let base = match &self.base {
            Some(base) => base,
            None => return scope == SearchScope::Subtree,
        };
        match scope {
            SearchScope::Base => dn == base,
            SearchScope::OneLevel => dn.parent().as_ref() == Some(base),
            SearchScope::Subtree => base.is_suffix_of(dn),
        }
    }
}

impl DirectoryContext for MemoryContext<'_> {
    fn search(
        &mut self,
        scope: SearchScope,
        filter: &str,
        _attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, LookupError> {
        self.directory.searches.fetch_add(1, Ordering::SeqCst);
        let filter = if filter.trim().is_empty() {
            Filter::Present("objectClass".to_string())
        } else {
            Filter::parse(filter)
        };

        Ok(self
            .directory
            .entries
            .iter()
            .filter(|(dn, entry)| self.in_scope(dn, scope) && filter.matches(&entry.attributes))
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

impl Drop for MemoryContext<'_> {
    fn drop(&mut self) {
        self.directory.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Parsed search filter; only what the resolver emits.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equal(String, String),
    Substring(String, Vec<String>),
}

impl Filter {
    pub fn parse(input: &str) -> Filter {
        let chars: Vec<char> = input.trim().chars().collect();
        let (filter, end) = parse_at(&chars, 0);
        assert_eq!(end, chars.len(), "trailing input in filter {:?}", input);
        filter
    }

    pub fn matches(&self, attrs: &Attributes) -> bool {
        match self {
            Filter::And(parts) => parts.iter().all(|f| f.matches(attrs)),
            Filter::Or(parts) => parts.iter().any(|f| f.matches(attrs)),
            Filter::Not(inner) => !inner.matches(attrs),
            Filter::Present(attr) => attrs.contains(attr),
            Filter::Equal(attr, value) => attrs.has_value(attr, value),
            Filter::Substring(attr, pieces) => attrs
                .get(attr)
                .iter()
                .any(|v| substring_match(&v.to_lowercase(), pieces)),
        }
    }
}

fn parse_at(chars: &[char], pos: usize) -> (Filter, usize) {
    assert_eq!(chars.get(pos), Some(&'('), "expected '(' at {}", pos);
    match chars.get(pos + 1) {
        Some('&') | Some('|') => {
            let mut parts = Vec::new();
            let mut cursor = pos + 2;
            while chars.get(cursor) == Some(&'(') {
                let (part, next) = parse_at(chars, cursor);
                parts.push(part);
                cursor = next;
            }
            assert_eq!(chars.get(cursor), Some(&')'), "unclosed filter list");
            let filter = if chars[pos + 1] == '&' {
                Filter::And(parts)
            } else {
                Filter::Or(parts)
            };
            (filter, cursor + 1)
        }
        Some('!') => {
            let (inner, next) = parse_at(chars, pos + 2);
            assert_eq!(chars.get(next), Some(&')'), "unclosed negation");
            (Filter::Not(Box::new(inner)), next + 1)
        }
        _ => {
            let close = chars[pos..]
                .iter()
                .position(|c| *c == ')')
                .map(|offset| pos + offset)
                .expect("unclosed item");
            let item: String = chars[pos + 1..close].iter().collect();
            let (attr, value) = item.split_once('=').expect("item without '='");
            let filter = if value == "*" {
                Filter::Present(attr.to_string())
            } else if value.contains('*') {
                Filter::Substring(
                    attr.to_string(),
                    value.split('*').map(|p| unescape(p).to_lowercase()).collect(),
                )
            } else {
                Filter::Equal(attr.to_string(), unescape(value))
            };
            (filter, close + 1)
        }
    }
}

fn unescape(value: &str) -> String {
    let mut bytes = Vec::new();
    let raw = value.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && i + 2 < raw.len() {
            let hex = std::str::from_utf8(&raw[i + 1..i + 3]).expect("escape");
            bytes.push(u8::from_str_radix(hex, 16).expect("hex escape"));
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(bytes).expect("utf-8 filter value")
}

/// `pieces` come from splitting the pattern on `*`: the first must be a
/// prefix, the last a suffix and the rest appear in order.
fn substring_match(value: &str, pieces: &[String]) -> bool {
    let (first, rest) = match pieces.split_first() {
        Some(split) => split,
        None => return true,
    };
    if !value.starts_with(first.as_str()) {
        return false;
    }
    let mut remaining = &value[first.len()..];
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return remaining.is_empty(),
    };
    for piece in middle {
        match remaining.find(piece.as_str()) {
            Some(idx) => remaining = &remaining[idx + piece.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Attributes {
        vec![
            ("objectClass", vec!["top".to_string(), "person".to_string()]),
            ("cn", vec!["Alice Smith".to_string()]),
            ("l", vec!["Sunnyvale".to_string()]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_filter_evaluation() {
        let a = attrs();
        assert!(Filter::parse("(objectClass=person)").matches(&a));
        assert!(Filter::parse("(&(objectClass=person)(l=sunnyvale))").matches(&a));
        assert!(Filter::parse("(|(l=Nowhere)(cn=alice smith))").matches(&a));
        assert!(Filter::parse("(!(l=Nowhere))").matches(&a));
        assert!(Filter::parse("(cn=Ali*)").matches(&a));
        assert!(Filter::parse("(cn=*Smi*)").matches(&a));
        assert!(Filter::parse("(cn=A**h)").matches(&a));
        assert!(!Filter::parse("(cn=Bob*)").matches(&a));
        assert!(!Filter::parse("(mail=*)").matches(&a));
        assert!(Filter::parse(r"(cn=Alice\20Smith)").matches(&a));
    }
}
