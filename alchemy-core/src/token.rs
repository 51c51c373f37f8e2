//! Tokens - live, positioned element instances on the table.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of allocated token ids (`el-1`, `el-2`, ...).
const ID_PREFIX: &str = "el-";

/// Token footprint width in pixels, centred on the token position.
pub const TOKEN_WIDTH: f32 = 80.0;

/// Token footprint height in pixels, centred on the token position.
pub const TOKEN_HEIGHT: f32 = 64.0;

/// Name of an element kind, e.g. `"fire"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementName(String);

impl ElementName {
    /// Create an element name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive prefix match used by the palette filter.
    #[must_use]
    pub fn starts_with_ignore_case(&self, prefix: &str) -> bool {
        self.0.to_lowercase().starts_with(&prefix.to_lowercase())
    }
}

impl fmt::Display for ElementName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ElementName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for ElementName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ElementName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ElementName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Unique identifier of a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Build the id for the given allocator index.
    #[must_use]
    pub fn from_index(index: u64) -> Self {
        Self(format!("{ID_PREFIX}{index}"))
    }

    /// The numeric suffix of an allocator-issued id, if this is one.
    #[must_use]
    pub fn index(&self) -> Option<u64> {
        self.0.strip_prefix(ID_PREFIX)?.parse().ok()
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Visual status of a token.
///
/// A single tag per token instead of separate reactive/shaking/exploding
/// flag sets, so no token can be in two of these at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    /// No visual affordance.
    #[default]
    Idle,
    /// Part of a resolvable pair under the current drag.
    Reactive,
    /// Rejected pair, shaking before being pushed apart.
    Shaking,
    /// Scheduled for removal.
    Exploding,
    /// Recently repositioned by a bounce or a push.
    PushedOut,
}

/// A live element instance on the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Unique identifier.
    pub id: TokenId,
    /// Element kind.
    pub name: ElementName,
    /// X position (centre, pixels from left).
    pub x: f32,
    /// Y position (centre, pixels from top).
    pub y: f32,
    /// Transient display status, never persisted.
    #[serde(skip)]
    pub status: TokenStatus,
}

impl Token {
    /// Create a token at the given position.
    #[must_use]
    pub fn new(id: TokenId, name: ElementName, x: f32, y: f32) -> Self {
        Self {
            id,
            name,
            x,
            y,
            status: TokenStatus::Idle,
        }
    }

    /// Check if a point lies within this token's footprint.
    #[must_use]
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        (x - self.x).abs() <= TOKEN_WIDTH / 2.0 && (y - self.y).abs() <= TOKEN_HEIGHT / 2.0
    }

    /// Euclidean distance between the positions of two tokens.
    #[must_use]
    pub fn distance_to(&self, other: &Token) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Monotonic token id allocator.
///
/// Owned by the table. After a restore it is advanced past the highest id in
/// the snapshot so that new ids never collide with restored ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    /// Create an allocator whose first id is `el-1`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id. Wraps back to `el-1` once the index space is
    /// exhausted; the table skips ids that are still live.
    pub fn allocate(&mut self) -> TokenId {
        self.last = self.last.checked_add(1).unwrap_or(1);
        TokenId::from_index(self.last)
    }

    /// Ensure every future id is greater than every allocator-style id given.
    ///
    /// `el-18446744073709551615` cannot be advanced past and is ignored.
    pub fn advance_past<'a>(&mut self, ids: impl IntoIterator<Item = &'a TokenId>) {
        if let Some(max) = ids
            .into_iter()
            .filter_map(TokenId::index)
            .filter(|&index| index < u64::MAX)
            .max()
        {
            self.last = self.last.max(max);
        }
    }
}
