//! Distinguished names
//!
//! Parsing, comparison and escaping of directory entry names such as
//! `cn=alice,ou=People,dc=example,dc=com`. Comparison ignores case and the
//! whitespace around each component, so names read back from a directory
//! compare equal to names typed into configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Characters that must be backslash-escaped inside a component value.
const SPECIAL_CHARS: &[char] = &[',', '+', '"', '\\', '<', '>', ';'];

/// Errors raised while parsing a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnError {
    #[error("distinguished name cannot be empty")]
    Empty,
    #[error("invalid distinguished name component in '{0}'")]
    InvalidComponent(String),
    #[error("distinguished name component missing attribute: {0}")]
    MissingAttribute(String),
    #[error("distinguished name contains an unterminated escape sequence: {0}")]
    UnterminatedEscape(String),
    #[error("multi-valued name components are not supported: {0}")]
    MultiValued(String),
}

impl From<DnError> for crate::Error {
    fn from(err: DnError) -> Self {
        match err {
            DnError::Empty => crate::Error::InvalidArgument(err.to_string()),
            other => crate::Error::MalformedName(other.to_string()),
        }
    }
}

/// One `attr=value` component of a distinguished name. The value is stored
/// unescaped.
#[derive(Debug, Clone)]
pub struct Rdn {
    attribute: String,
    value: String,
}

impl Rdn {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into().trim().to_string(),
            value: value.into(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Unescaped value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Case-insensitive attribute name match.
    pub fn matches_attribute(&self, attribute: &str) -> bool {
        self.attribute.eq_ignore_ascii_case(attribute.trim())
    }

    fn normalized(&self) -> (String, String) {
        (
            self.attribute.to_ascii_lowercase(),
            self.value.trim().to_lowercase(),
        )
    }
}

impl PartialEq for Rdn {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Rdn {}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute, escape(&self.value))
    }
}

/// A parsed distinguished name, components ordered left (leaf) to right (root).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DistinguishedName {
    components: Vec<Rdn>,
}

impl DistinguishedName {
    /// Parse a distinguished name.
    pub fn parse(input: &str) -> Result<Self, DnError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(DnError::Empty);
        }

        let mut components = Vec::new();
        let parts = split_unescaped(raw, ',')
            .ok_or_else(|| DnError::UnterminatedEscape(raw.to_string()))?;
        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                return Err(DnError::InvalidComponent(raw.to_string()));
            }

            if find_unescaped(part, '+').is_some() {
                return Err(DnError::MultiValued(part.to_string()));
            }

            let eq = find_unescaped(part, '=')
                .ok_or_else(|| DnError::MissingAttribute(part.to_string()))?;
            let attribute = part[..eq].trim();
            if attribute.is_empty() {
                return Err(DnError::MissingAttribute(part.to_string()));
            }

            let value = unescape(part[eq + 1..].trim())
                .map_err(|_| DnError::UnterminatedEscape(part.to_string()))?;
            components.push(Rdn::new(attribute, value));
        }

        Ok(Self { components })
    }

    pub fn from_components(components: Vec<Rdn>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[Rdn] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Leftmost component, which names the entry itself.
    pub fn first(&self) -> Option<&Rdn> {
        self.components.first()
    }

    /// Name of the entry's parent, or `None` for a single-component name.
    pub fn parent(&self) -> Option<DistinguishedName> {
        if self.components.len() < 2 {
            return None;
        }
        Some(Self {
            components: self.components[1..].to_vec(),
        })
    }

    /// True when `suffix` names this entry or one of its ancestors.
    pub fn ends_with(&self, suffix: &DistinguishedName) -> bool {
        if suffix.components.is_empty() || suffix.components.len() > self.components.len() {
            return false;
        }
        let offset = self.components.len() - suffix.components.len();
        self.components[offset..] == suffix.components[..]
    }

    /// True when this name is `other` or one of its ancestors, i.e. `other`
    /// lies in the sub-tree rooted here.
    pub fn is_suffix_of(&self, other: &DistinguishedName) -> bool {
        other.ends_with(self)
    }

    /// Case-folded canonical text, suitable as a map key.
    pub fn normalized(&self) -> String {
        self.components
            .iter()
            .map(|rdn| {
                let (attribute, value) = rdn.normalized();
                format!("{}={}", attribute, escape(&value))
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for DistinguishedName {}

impl Hash for DistinguishedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for rdn in &self.components {
            rdn.normalized().hash(state);
        }
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", rdn)?;
        }
        Ok(())
    }
}

impl FromStr for DistinguishedName {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DistinguishedName {
    type Error = DnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DistinguishedName> for String {
    fn from(value: DistinguishedName) -> Self {
        value.to_string()
    }
}

/// Backslash-escape every special character in a component value.
///
/// Escaping is unconditional so that `unescape(escape(x)) == x` for any `x`.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if SPECIAL_CHARS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Reverse [`escape`]. Also accepts the two-hex-digit form (`\2C`) that
/// directory servers use when returning names.
pub fn unescape(value: &str) -> Result<String, DnError> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let next = chars
            .next()
            .ok_or_else(|| DnError::UnterminatedEscape(value.to_string()))?;
        let hex_pair = next
            .to_digit(16)
            .and_then(|hi| chars.peek().and_then(|c| c.to_digit(16)).map(|lo| hi * 16 + lo));
        match hex_pair {
            Some(byte) => {
                chars.next();
                bytes.push(byte as u8);
            }
            None => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn find_unescaped(input: &str, target: char) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == target {
            return Some(i);
        }
    }
    None
}

/// Split on `delimiter` where it is not preceded by an escaping backslash.
/// Escapes are kept in the returned parts; `None` on a dangling backslash.
fn split_unescaped(input: &str, delimiter: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, ch) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == delimiter {
            parts.push(&input[start..i]);
            start = i + ch.len_utf8();
        }
    }

    if escaped {
        return None;
    }
    parts.push(&input[start..]);
    Some(parts)
}
