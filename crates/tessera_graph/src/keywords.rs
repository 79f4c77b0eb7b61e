// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flat keyed record used for persistence.
//!
//! A [`KeywordList`] maps dotted keys such as `object3.input_connection0` to
//! string values. Scoping is purely textual: a prefix is prepended to every
//! key, so nested objects are written as `object2.object1.type`.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Error reading a typed value from a record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeywordError {
    /// Value could not be parsed
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Full key
        key: String,
        /// Offending value
        value: String,
    },

    /// Required key is absent
    #[error("Missing keyword: {0}")]
    Missing(String),
}

/// Ordered string-to-string record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordList {
    entries: IndexMap<String, String>,
}

impl KeywordList {
    /// Create a new empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set `prefix + key` to `value`
    pub fn add(&mut self, prefix: &str, key: &str, value: impl ToString) {
        self.entries.insert(format!("{prefix}{key}"), value.to_string());
    }

    /// Set a full key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Value of `prefix + key`
    pub fn find(&self, prefix: &str, key: &str) -> Option<&str> {
        self.entries.get(&format!("{prefix}{key}")).map(String::as_str)
    }

    /// Value of a full key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Remove a full key
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    /// Parse `prefix + key`; `Ok(None)` when absent
    pub fn parse<T: FromStr>(&self, prefix: &str, key: &str) -> Result<Option<T>, KeywordError> {
        let Some(value) = self.find(prefix, key) else {
            return Ok(None);
        };
        value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| KeywordError::InvalidValue {
                key: format!("{prefix}{key}"),
                value: value.to_string(),
            })
    }

    /// Parse a required `prefix + key`
    pub fn require<T: FromStr>(&self, prefix: &str, key: &str) -> Result<T, KeywordError> {
        self.parse(prefix, key)?
            .ok_or_else(|| KeywordError::Missing(format!("{prefix}{key}")))
    }

    /// Read a boolean, accepting `true/false`, `yes/no`, `on/off` and `1/0`
    pub fn find_bool(&self, prefix: &str, key: &str) -> Result<Option<bool>, KeywordError> {
        let Some(value) = self.find(prefix, key) else {
            return Ok(None);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(KeywordError::InvalidValue {
                key: format!("{prefix}{key}"),
                value: value.to_string(),
            }),
        }
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of every entry under `prefix`, with the prefix stripped
    pub fn sub_list(&self, prefix: &str) -> KeywordList {
        let entries = self
            .entries
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix)
                    .map(|rest| (rest.to_string(), value.clone()))
            })
            .collect();
        Self { entries }
    }

    /// Copy every entry of `other` in under `prefix`
    pub fn extend_with_prefix(&mut self, prefix: &str, other: &KeywordList) {
        for (key, value) in other.iter() {
            self.add(prefix, key, value);
        }
    }

    /// Nested object prefixes `prefix + stem + N + "."`, sorted by `N`.
    ///
    /// Only the first level below `prefix` is reported; `object2.object1.`
    /// appears as `object2.` when searching from the empty prefix.
    pub fn numbered_prefixes(&self, prefix: &str, stem: &str) -> Vec<(u64, String)> {
        let Ok(pattern) = Regex::new(&format!(
            r"^{}{}(\d+)\.",
            regex::escape(prefix),
            regex::escape(stem)
        )) else {
            return Vec::new();
        };
        let mut numbers: Vec<u64> = self
            .entries
            .keys()
            .filter_map(|key| pattern.captures(key))
            .filter_map(|captures| captures[1].parse().ok())
            .collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
            .into_iter()
            .map(|n| (n, format!("{prefix}{stem}{n}.")))
            .collect()
    }

    /// Positional keys `prefix + stem + N` and their values, sorted by `N`
    pub fn numbered_values(&self, prefix: &str, stem: &str) -> Vec<(usize, &str)> {
        let Ok(pattern) = Regex::new(&format!(
            r"^{}{}(\d+)$",
            regex::escape(prefix),
            regex::escape(stem)
        )) else {
            return Vec::new();
        };
        let mut values: Vec<(usize, &str)> = self
            .entries
            .iter()
            .filter_map(|(key, value)| {
                let index = pattern.captures(key)?[1].parse().ok()?;
                Some((index, value.as_str()))
            })
            .collect();
        values.sort_by_key(|(index, _)| *index);
        values
    }

    /// Serialize to a RON string
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from a RON string
    pub fn from_ron(ron_str: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(ron_str)
    }
}

impl FromIterator<(String, String)> for KeywordList {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
