//! Recipe catalog - symmetric lookup from element pairs to outputs.
//!
//! The catalog file format is a JSON object keyed by `"a+b"`:
//!
//! ```text
//! {
//!   "water+air": ["steam"],
//!   "water+lava": ["steam", "stone"]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::{AlchemyError, AlchemyResult, ElementName};

/// Recipes shipped with the game.
const BUILTIN_RECIPES: &[(&str, &str, &[&str])] = &[
    ("water", "air", &["steam"]),
    ("air", "fire", &["energy"]),
    ("air", "earth", &["dust"]),
    ("earth", "fire", &["lava"]),
    ("water", "earth", &["swamp"]),
    ("water", "fire", &["alcohol"]),
    ("water", "lava", &["steam", "stone"]),
    ("air", "stone", &["sand"]),
    ("water", "stone", &["sand"]),
    ("stone", "fire", &["metal"]),
];

/// Unordered pair key: the two names in sorted order.
type PairKey = (ElementName, ElementName);

fn pair_key(a: &str, b: &str) -> PairKey {
    if a <= b {
        (a.into(), b.into())
    } else {
        (b.into(), a.into())
    }
}

/// Static mapping from unordered element pairs to output lists.
///
/// `resolve(a, b)` and `resolve(b, a)` always agree. Self-combination
/// (`a == b`) is allowed.
#[derive(Debug, Clone, Default)]
pub struct RecipeCatalog {
    entries: HashMap<PairKey, Vec<ElementName>>,
}

impl RecipeCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in recipe table.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for (a, b, outputs) in BUILTIN_RECIPES {
            catalog.insert(a, b, outputs.iter().map(|&o| o.into()).collect());
        }
        catalog
    }

    /// Register a recipe.
    ///
    /// The first registration of an unordered pair wins; later ones for the
    /// same pair (in either order) are ignored.
    pub fn insert(&mut self, a: &str, b: &str, outputs: Vec<ElementName>) {
        let key = pair_key(a, b);
        if self.entries.contains_key(&key) {
            tracing::debug!("Ignoring duplicate recipe {a}+{b}");
            return;
        }
        self.entries.insert(key, outputs);
    }

    /// Look up the outputs for a pair, in either order.
    ///
    /// Returns `None` when the pair has no recipe (or an empty output list).
    #[must_use]
    pub fn resolve(&self, a: &str, b: &str) -> Option<&[ElementName]> {
        self.entries
            .get(&pair_key(a, b))
            .map(Vec::as_slice)
            .filter(|outputs| !outputs.is_empty())
    }

    /// Check whether a pair has a recipe.
    #[must_use]
    pub fn can_combine(&self, a: &str, b: &str) -> bool {
        self.resolve(a, b).is_some()
    }

    /// Number of recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog has no recipes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a catalog from its JSON form.
    ///
    /// Keys are processed in sorted order so duplicate handling is
    /// deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a key has no `+`.
    pub fn from_json(json: &str) -> AlchemyResult<Self> {
        let raw: BTreeMap<String, Vec<ElementName>> = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for (key, outputs) in raw {
            let (a, b) = key
                .split_once('+')
                .ok_or_else(|| AlchemyError::InvalidRecipeKey(key.clone()))?;
            catalog.insert(a.trim(), b.trim(), outputs);
        }
        tracing::info!("Loaded {} recipes", catalog.len());
        Ok(catalog)
    }

    /// Serialize the catalog to its JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> AlchemyResult<String> {
        let raw: BTreeMap<String, &Vec<ElementName>> = self
            .entries
            .iter()
            .map(|((a, b), outputs)| (format!("{a}+{b}"), outputs))
            .collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }
}
