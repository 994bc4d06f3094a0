//! # Analytics Dimensions
//!
//! An ordered dimension map as the analytics API understands it: each dimension is
//! a key (`ou`, `pe`, `dx` or an attribute id) with a list of item identifiers.
//! Filters restrict the result without appearing as columns.
//!
//! Order matters. Pagination breaks ties between equally large dimensions by the
//! first-seen key, so the map keeps insertion order instead of hashing keys.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DimensionKey {
    OrgUnit,
    Period,
    Data,
    /// Attribute category id used as a filter dimension
    Attribute(String),
}

impl DimensionKey {
    pub fn as_str(&self) -> &str {
        match self {
            DimensionKey::OrgUnit => "ou",
            DimensionKey::Period => "pe",
            DimensionKey::Data => "dx",
            DimensionKey::Attribute(id) => id,
        }
    }
}

impl From<DimensionKey> for String {
    fn from(key: DimensionKey) -> Self {
        key.as_str().to_string()
    }
}

impl From<String> for DimensionKey {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ou" => DimensionKey::OrgUnit,
            "pe" => DimensionKey::Period,
            "dx" => DimensionKey::Data,
            _ => DimensionKey::Attribute(value),
        }
    }
}

impl From<&str> for DimensionKey {
    fn from(value: &str) -> Self {
        DimensionKey::from(value.to_string())
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub key: DimensionKey,
    pub items: Vec<String>,
}

impl Dimension {
    pub fn new(key: DimensionKey, items: Vec<String>) -> Self {
        Self { key, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `key:item1;item2` as used in `dimension=` and `filter=` query parameters
    pub fn to_query_value(&self) -> String {
        format!("{}:{}", self.key, self.items.join(";"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMap {
    pub dimensions: Vec<Dimension>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Dimension>,
}

impl DimensionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`DimensionMap::set`]
    pub fn with(mut self, key: DimensionKey, items: Vec<String>) -> Self {
        self.set(key, items);
        self
    }

    pub fn with_filter(mut self, key: DimensionKey, items: Vec<String>) -> Self {
        self.set_filter(key, items);
        self
    }

    /// Insert a dimension, or replace its items in place if the key exists
    pub fn set(&mut self, key: DimensionKey, items: Vec<String>) {
        upsert(&mut self.dimensions, key, items);
    }

    pub fn set_filter(&mut self, key: DimensionKey, items: Vec<String>) {
        upsert(&mut self.filters, key, items);
    }

    pub fn get(&self, key: &DimensionKey) -> Option<&[String]> {
        self.dimensions
            .iter()
            .find(|d| &d.key == key)
            .map(|d| d.items.as_slice())
    }

    pub fn filter(&self, key: &DimensionKey) -> Option<&[String]> {
        self.filters
            .iter()
            .find(|d| &d.key == key)
            .map(|d| d.items.as_slice())
    }

    /// Dimension with the largest cardinality among the keys `eligible` accepts;
    /// ties go to the earliest key
    pub fn heaviest(&self, eligible: impl Fn(&DimensionKey) -> bool) -> Option<&Dimension> {
        self.dimensions
            .iter()
            .filter(|d| eligible(&d.key))
            .fold(None, |best: Option<&Dimension>, d| match best {
                Some(b) if b.len() >= d.len() => Some(b),
                _ => Some(d),
            })
    }

    /// Attribute filters carried by this map, in insertion order
    pub fn attribute_filters(&self) -> impl Iterator<Item = &Dimension> {
        self.filters
            .iter()
            .filter(|d| matches!(d.key, DimensionKey::Attribute(_)))
    }

    /// `dimension=` and `filter=` query pairs in map order
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.dimensions
            .iter()
            .map(|d| ("dimension".to_string(), d.to_query_value()))
            .chain(
                self.filters
                    .iter()
                    .map(|d| ("filter".to_string(), d.to_query_value())),
            )
            .collect()
    }
}

fn upsert(target: &mut Vec<Dimension>, key: DimensionKey, items: Vec<String>) {
    match target.iter_mut().find(|d| d.key == key) {
        Some(existing) => existing.items = items,
        None => target.push(Dimension::new(key, items)),
    }
}
