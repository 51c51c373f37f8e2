//! The growing set of discovered element names.

use serde::{Deserialize, Serialize};

use crate::{AlchemyResult, ElementName};

/// Elements every session starts with, in palette order.
pub const PRIMITIVES: [&str; 4] = ["air", "fire", "earth", "water"];

/// Ordered, duplicate-free set of discovered names.
///
/// Insertion order is first-discovery order and drives palette ordering.
/// The set only grows, except through [`DiscoverySet::wipe`] and
/// [`DiscoverySet::restore`], and always contains the primitives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ElementName>", into = "Vec<ElementName>")]
pub struct DiscoverySet {
    names: Vec<ElementName>,
}

impl DiscoverySet {
    /// Create a set holding only the primitives.
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: PRIMITIVES.iter().map(|&n| ElementName::from(n)).collect(),
        }
    }

    /// Build a set from a persisted list.
    ///
    /// Duplicates are dropped (first occurrence wins) and any missing
    /// primitive is put in front so the set stays a superset of them.
    #[must_use]
    pub fn from_names(names: impl IntoIterator<Item = ElementName>) -> Self {
        let listed: Vec<ElementName> = names.into_iter().collect();
        let mut set = Self { names: Vec::new() };
        for primitive in PRIMITIVES {
            if !listed.iter().any(|n| n == primitive) {
                set.names.push(primitive.into());
            }
        }
        for name in listed {
            set.insert(name);
        }
        set
    }

    /// Add a name. Returns `true` if it was not already present.
    pub fn insert(&mut self, name: ElementName) -> bool {
        if self.contains(name.as_str()) {
            return false;
        }
        tracing::debug!("Discovered {name}");
        self.names.push(name);
        true
    }

    /// Add names in order, returning those that were new.
    pub fn extend<'a>(&mut self, names: impl IntoIterator<Item = &'a ElementName>) -> Vec<ElementName> {
        names
            .into_iter()
            .filter(|name| self.insert((*name).clone()))
            .cloned()
            .collect()
    }

    /// Check whether a name has been discovered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Reset to the primitives only.
    pub fn wipe(&mut self) {
        tracing::info!("Wiping {} discovered elements", self.names.len());
        *self = Self::new();
    }

    /// Replace the contents with a superseding snapshot.
    pub fn restore(&mut self, names: impl IntoIterator<Item = ElementName>) {
        *self = Self::from_names(names);
    }

    /// Names in discovery order.
    #[must_use]
    pub fn as_slice(&self) -> &[ElementName] {
        &self.names
    }

    /// Iterate names in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &ElementName> {
        self.names.iter()
    }

    /// Number of discovered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always `false`; the primitives are never removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Serialize to a JSON array of strings.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> AlchemyResult<String> {
        Ok(serde_json::to_string(&self.names)?)
    }

    /// Parse a JSON array of strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not an array of strings.
    pub fn from_json(json: &str) -> AlchemyResult<Self> {
        let names: Vec<ElementName> = serde_json::from_str(json)?;
        Ok(Self::from_names(names))
    }
}

impl Default for DiscoverySet {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<ElementName>> for DiscoverySet {
    fn from(names: Vec<ElementName>) -> Self {
        Self::from_names(names)
    }
}

impl From<DiscoverySet> for Vec<ElementName> {
    fn from(set: DiscoverySet) -> Self {
        set.names
    }
}
