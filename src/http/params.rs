//! String-keyed multimaps for query parameters and headers.
//!
//! # Design Decisions
//! - Both maps preserve every value seen for a key (multimap semantics);
//!   predicates test against the full value list
//! - Header keys are normalized to lowercase on insert; query parameter
//!   keys are case-sensitive

use std::collections::HashMap;

/// Multimap of query parameters (case-sensitive keys).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap {
    entries: HashMap<String, Vec<String>>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// All values recorded for `name`; empty slice when absent.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Flattened `(name, value)` pairs, one per recorded value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Multimap of header values with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderValues {
    inner: ParamMap,
}

impl HeaderValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.inner.insert(name.to_ascii_lowercase(), value);
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.inner.get_all(&name.to_ascii_lowercase())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains(&name.to_ascii_lowercase())
    }

    /// Case-normalized view for predicate evaluation.
    pub fn as_params(&self) -> &ParamMap {
        &self.inner
    }

    /// Flattened `(name, value)` pairs with lowercase names.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter()
    }
}

impl<'a, V: Into<String>> FromIterator<(&'a str, V)> for HeaderValues {
    fn from_iter<I: IntoIterator<Item = (&'a str, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}
