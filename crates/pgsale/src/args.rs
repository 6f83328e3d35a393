//! Hierarchical argument decoder.
//!
//! Turns `key.sub.path=value` tokens into a nested [`ArgMap`]:
//!
//! ```
//! use pgsale::args::ArgMap;
//!
//! let args = ArgMap::decode(["client.code=C1", "client.nature.name=Individual", "k=a=b"]);
//! assert_eq!(args.map("client").and_then(|c| c.scalar("code")), Some("C1"));
//! assert_eq!(args.scalar("k"), Some("a=b"));
//! ```
//!
//! Writes are last-wins at a given path. A scalar that sits where a deeper
//! path needs a map is dropped and replaced by an empty map, so
//! `x=1 x.y=2` leaves `x` as `{y: "2"}`.

use std::collections::BTreeMap;

use pgsale_core::{Error, Result, Shape, ValidationError};

/// A leaf string or a nested map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Scalar(String),
    Map(ArgMap),
}

impl ArgValue {
    pub fn shape(&self) -> Shape {
        match self {
            ArgValue::Scalar(_) => Shape::Value,
            ArgValue::Map(_) => Shape::Mapping,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ArgValue::Scalar(s) => Some(s),
            ArgValue::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&ArgMap> {
        match self {
            ArgValue::Map(m) => Some(m),
            ArgValue::Scalar(_) => None,
        }
    }
}

/// Nested argument map, keys sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgMap {
    entries: BTreeMap<String, ArgValue>,
}

impl ArgMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode command-line tokens. Never fails: a token without `=` stores
    /// the empty string.
    pub fn decode<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Self::new();
        for token in tokens {
            let token = token.as_ref();
            let (key, value) = token.split_once('=').unwrap_or((token, ""));
            map.store(key, value);
        }
        map
    }

    /// Store `value` at the dotted `path`.
    pub fn store(&mut self, path: &str, value: impl Into<String>) {
        match path.split_once('.') {
            None => {
                self.entries
                    .insert(path.to_string(), ArgValue::Scalar(value.into()));
            }
            Some((head, rest)) => {
                let slot = self
                    .entries
                    .entry(head.to_string())
                    .or_insert_with(|| ArgValue::Map(ArgMap::new()));
                if let ArgValue::Scalar(_) = slot {
                    *slot = ArgValue::Map(ArgMap::new());
                }
                if let ArgValue::Map(inner) = slot {
                    inner.store(rest, value);
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.entries.get(key)
    }

    /// The scalar at `key`, if `key` holds one.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ArgValue::as_scalar)
    }

    /// The nested map at `key`, if `key` holds one.
    pub fn map(&self, key: &str) -> Option<&ArgMap> {
        self.get(key).and_then(ArgValue::as_map)
    }

    pub fn remove(&mut self, key: &str) -> Option<ArgValue> {
        self.entries.remove(key)
    }

    /// Remove the nested map at `key`.
    ///
    /// A missing key or a scalar fails with a validation error carrying
    /// `message`.
    pub fn take_map(&mut self, key: &str, message: &str) -> Result<ArgMap> {
        match self.remove(key) {
            Some(ArgValue::Map(map)) => Ok(map),
            other => Err(Error::Validation(ValidationError::new(
                message,
                Shape::Mapping,
                other.as_ref().map_or(Shape::Missing, ArgValue::shape),
            ))),
        }
    }

    /// What `key` holds, for validation messages.
    pub fn shape(&self, key: &str) -> Shape {
        self.get(key).map_or(Shape::Missing, ArgValue::shape)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Flatten to column/value pairs. Nested maps cannot be written to a
    /// column and are rejected.
    pub fn into_columns(self) -> Result<BTreeMap<String, String>> {
        self.entries
            .into_iter()
            .map(|(key, value)| match value {
                ArgValue::Scalar(s) => Ok((key, s)),
                ArgValue::Map(_) => Err(Error::Validation(ValidationError::new(
                    format!("Unexpected nested parameters under '{key}'"),
                    Shape::Value,
                    Shape::Mapping,
                ))),
            })
            .collect()
    }
}
