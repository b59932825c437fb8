//! Ledger identifiers and Move type tags.
//!
//! Object ids and account addresses share one 32-byte hex format on the
//! ledger, so both are carried by [`ObjectId`]. Every constructor normalizes
//! to the canonical `0x` + 64 lowercase hex digit spelling, which makes ids
//! safe to compare and use as map keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ADDRESS_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIdError {
    #[error("object id must not be empty")]
    Empty,
    #[error("object id {0:?} contains non-hex characters")]
    NotHex(String),
    #[error("object id {0:?} is longer than 32 bytes")]
    TooLong(String),
}

/// A normalized 32-byte ledger object id (or account address).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

/// Account addresses use the object id format.
pub type Address = ObjectId;

impl ObjectId {
    pub fn parse(raw: &str) -> Result<Self, ParseIdError> {
        normalize_address(raw).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The shared clock object every time-gated call takes as input.
    #[must_use]
    pub fn clock() -> Self {
        Self(format!("0x{:0>width$}", "6", width = ADDRESS_HEX_LEN))
    }

    /// Abbreviated form for log lines and operator output.
    #[must_use]
    pub fn short(&self) -> String {
        let hex = self.0.trim_start_matches("0x");
        format!("0x{}…{}", &hex[..6], &hex[hex.len() - 4..])
    }
}

impl FromStr for ObjectId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(value: ObjectId) -> Self {
        value.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_address(raw: &str) -> Result<String, ParseIdError> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex.is_empty() {
        return Err(ParseIdError::Empty);
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ParseIdError::NotHex(raw.to_string()));
    }
    if hex.len() > ADDRESS_HEX_LEN {
        return Err(ParseIdError::TooLong(raw.to_string()));
    }
    Ok(format!(
        "0x{:0>width$}",
        hex.to_ascii_lowercase(),
        width = ADDRESS_HEX_LEN
    ))
}

/// A fully qualified Move type, e.g. `0x…02::sui::SUI`.
///
/// Addresses embedded anywhere in the tag (including generic arguments) are
/// padded to their canonical width, so two spellings of the same type compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TypeTag(String);

impl TypeTag {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(normalize_struct_tag(raw))
    }

    /// Build a tag from a `TypeName` value, which the ledger renders without
    /// the `0x` prefix on the leading address.
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        let name = name.trim();
        if name.starts_with("0x") {
            Self::new(name)
        } else {
            Self::new(&format!("0x{name}"))
        }
    }

    /// Tag of `<package>::<module>::<name>`.
    #[must_use]
    pub fn from_parts(package: &ObjectId, module: &str, name: &str) -> Self {
        Self(format!("{package}::{module}::{name}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the single generic argument of `<…>::{module}::{name}<T>`.
    ///
    /// Returns `None` when the tag is a different struct or is not generic.
    #[must_use]
    pub fn type_argument(&self, module: &str, name: &str) -> Option<TypeTag> {
        let open = self.0.find('<')?;
        let head = &self.0[..open];
        let suffix = format!("::{module}::{name}");
        if !head.ends_with(&suffix) || !self.0.ends_with('>') {
            return None;
        }
        let inner = &self.0[open + 1..self.0.len() - 1];
        if inner.is_empty() {
            return None;
        }
        Some(TypeTag(inner.to_string()))
    }
}

impl From<String> for TypeTag {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<TypeTag> for String {
    fn from(value: TypeTag) -> Self {
        value.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pad every `0x…` address token inside a struct tag to canonical width.
///
/// Tokens that are not valid addresses are copied through untouched.
#[must_use]
pub fn normalize_struct_tag(raw: &str) -> String {
    let raw = raw.trim();
    let mut out = String::with_capacity(raw.len() + ADDRESS_HEX_LEN);
    let mut rest = raw;

    while let Some(pos) = rest.find("0x") {
        let boundary_ok = pos == 0
            || !rest[..pos]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        let hex_len = after
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(after.len());
        let token = &rest[pos..pos + 2 + hex_len];
        match normalize_address(token) {
            Ok(address) if boundary_ok && hex_len > 0 => out.push_str(&address),
            _ => out.push_str(token),
        }
        rest = &rest[pos + 2 + hex_len..];
    }
    out.push_str(rest);
    out
}
