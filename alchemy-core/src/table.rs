//! Table state - the authoritative set of live tokens.

use serde::{Deserialize, Serialize};

use crate::{AlchemyResult, ElementName, IdAllocator, Token, TokenId, TokenStatus};

/// All live tokens on the table.
///
/// Sequence order is paint and hit-test order: the last token is topmost.
/// Every mutation is total; unknown ids are ignored.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Tokens in z-order.
    tokens: Vec<Token>,
    /// Id allocator for spawned tokens.
    ids: IdAllocator,
    /// Bumped on every change to persisted token fields.
    revision: u64,
}

/// Persisted form of the table, `[{id, name, x, y}, ...]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSnapshot(pub Vec<Token>);

impl Table {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a new token at the given position on top of the others.
    pub fn spawn(&mut self, name: ElementName, x: f32, y: f32) -> Token {
        let mut id = self.ids.allocate();
        while self.contains(&id) {
            id = self.ids.allocate();
        }
        let token = Token::new(id, name, x, y);
        tracing::debug!("Spawned {} ({}) at ({x}, {y})", token.id, token.name);
        self.tokens.push(token.clone());
        self.revision += 1;
        token
    }

    /// Move a token. No-op if the id is absent.
    pub fn move_to(&mut self, id: &TokenId, x: f32, y: f32) {
        if let Some(token) = self.get_mut(id) {
            token.x = x;
            token.y = y;
            self.revision += 1;
        }
    }

    /// Move a token to the top of the z-order, keeping the others in order.
    pub fn bring_to_front(&mut self, id: &TokenId) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        if index + 1 == self.tokens.len() {
            return;
        }
        let token = self.tokens.remove(index);
        self.tokens.push(token);
        self.revision += 1;
    }

    /// Remove every token whose id is listed. Returns the removed tokens.
    pub fn remove(&mut self, ids: &[TokenId]) -> Vec<Token> {
        let mut removed = Vec::new();
        self.tokens.retain(|token| {
            if ids.contains(&token.id) {
                removed.push(token.clone());
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            self.revision += 1;
        }
        removed
    }

    /// Replace every token, advancing the allocator past the new ids.
    pub fn replace_all(&mut self, tokens: Vec<Token>) {
        self.ids.advance_past(tokens.iter().map(|t| &t.id));
        self.tokens = tokens;
        self.revision += 1;
    }

    /// Remove all tokens. The allocator keeps counting.
    pub fn clear(&mut self) {
        if !self.tokens.is_empty() {
            self.tokens.clear();
            self.revision += 1;
        }
    }

    /// Get a token by id.
    #[must_use]
    pub fn get(&self, id: &TokenId) -> Option<&Token> {
        self.tokens.iter().find(|t| &t.id == id)
    }

    fn get_mut(&mut self, id: &TokenId) -> Option<&mut Token> {
        self.tokens.iter_mut().find(|t| &t.id == id)
    }

    fn index_of(&self, id: &TokenId) -> Option<usize> {
        self.tokens.iter().position(|t| &t.id == id)
    }

    /// Check whether a token is live.
    #[must_use]
    pub fn contains(&self, id: &TokenId) -> bool {
        self.index_of(id).is_some()
    }

    /// Position of a token.
    #[must_use]
    pub fn position(&self, id: &TokenId) -> Option<(f32, f32)> {
        self.get(id).map(|t| (t.x, t.y))
    }

    /// Set the display status of a token. No-op if absent.
    ///
    /// Status is transient and does not bump the revision.
    pub fn set_status(&mut self, id: &TokenId, status: TokenStatus) {
        if let Some(token) = self.get_mut(id) {
            token.status = status;
        }
    }

    /// Reset every token with the given status back to idle.
    pub fn clear_status(&mut self, status: TokenStatus) {
        for token in self.tokens.iter_mut().filter(|t| t.status == status) {
            token.status = TokenStatus::Idle;
        }
    }

    /// Ids of tokens currently carrying the given status, in z-order.
    #[must_use]
    pub fn ids_with_status(&self, status: TokenStatus) -> Vec<TokenId> {
        self.tokens
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.id.clone())
            .collect()
    }

    /// Topmost token whose footprint contains the point.
    #[must_use]
    pub fn token_at(&self, x: f32, y: f32) -> Option<TokenId> {
        self.tokens
            .iter()
            .rev()
            .find(|t| t.contains_point(x, y))
            .map(|t| t.id.clone())
    }

    /// Iterate tokens in z-order (bottom first).
    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    /// Number of live tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if the table has no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Change counter for persisted fields (ids, names, positions, order).
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Snapshot of the tokens for persistence.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot(self.tokens.clone())
    }

    /// Serialize the table snapshot to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> AlchemyResult<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Build a table from a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a token array.
    pub fn from_json(json: &str) -> AlchemyResult<Self> {
        let snapshot: TableSnapshot = serde_json::from_str(json)?;
        let mut table = Self::new();
        table.replace_all(snapshot.0);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(table: &Table) -> Vec<String> {
        table.iter().map(|t| t.id.to_string()).collect()
    }

    #[test]
    fn test_spawn_appends_with_fresh_ids() {
        let mut table = Table::new();
        assert!(table.is_empty());

        let a = table.spawn("fire".into(), 10.0, 20.0);
        let b = table.spawn("water".into(), 30.0, 40.0);

        assert_ne!(a.id, b.id);
        assert_eq!(table.len(), 2);
        assert_eq!(table.position(&b.id), Some((30.0, 40.0)));
        assert_eq!(names(&table), vec!["el-1", "el-2"]);
    }

    #[test]
    fn test_move_unknown_id_is_noop() {
        let mut table = Table::new();
        table.spawn("fire".into(), 0.0, 0.0);
        let revision = table.revision();

        table.move_to(&TokenId::from("el-99"), 5.0, 5.0);
        assert_eq!(table.revision(), revision);
    }

    #[test]
    fn test_bring_to_front_preserves_relative_order() {
        let mut table = Table::new();
        for name in ["air", "fire", "earth", "water"] {
            table.spawn(name.into(), 0.0, 0.0);
        }

        table.bring_to_front(&TokenId::from("el-2"));
        assert_eq!(names(&table), vec!["el-1", "el-3", "el-4", "el-2"]);

        // Idempotent
        let revision = table.revision();
        table.bring_to_front(&TokenId::from("el-2"));
        assert_eq!(names(&table), vec!["el-1", "el-3", "el-4", "el-2"]);
        assert_eq!(table.revision(), revision);

        // Unknown id
        table.bring_to_front(&TokenId::from("missing"));
        assert_eq!(names(&table), vec!["el-1", "el-3", "el-4", "el-2"]);
    }

    #[test]
    fn test_remove_ignores_unknown_ids() {
        let mut table = Table::new();
        let a = table.spawn("air".into(), 0.0, 0.0);
        let b = table.spawn("fire".into(), 0.0, 0.0);

        let removed = table.remove(&[a.id.clone(), TokenId::from("el-42")]);
        assert_eq!(removed.len(), 1);
        assert!(!table.contains(&a.id));
        assert!(table.contains(&b.id));
    }

    #[test]
    fn test_token_at_prefers_topmost() {
        let mut table = Table::new();
        let bottom = table.spawn("air".into(), 100.0, 100.0);
        let top = table.spawn("fire".into(), 110.0, 100.0);

        assert_eq!(table.token_at(105.0, 100.0), Some(top.id.clone()));
        table.bring_to_front(&bottom.id);
        assert_eq!(table.token_at(105.0, 100.0), Some(bottom.id));
        assert_eq!(table.token_at(500.0, 500.0), None);
    }

    #[test]
    fn test_status_does_not_bump_revision() {
        let mut table = Table::new();
        let token = table.spawn("air".into(), 0.0, 0.0);
        let revision = table.revision();

        table.set_status(&token.id, TokenStatus::Reactive);
        assert_eq!(table.ids_with_status(TokenStatus::Reactive), vec![token.id]);
        table.clear_status(TokenStatus::Reactive);
        assert!(table.ids_with_status(TokenStatus::Reactive).is_empty());
        assert_eq!(table.revision(), revision);
    }

    #[test]
    fn test_restore_advances_allocator() {
        let json = r#"[{"id":"el-5","name":"fire","x":1.0,"y":2.0},
                       {"id":"el-12","name":"water","x":3.0,"y":4.0}]"#;
        let mut table = Table::from_json(json).expect("should parse");
        assert_eq!(table.len(), 2);

        let spawned = table.spawn("air".into(), 0.0, 0.0);
        assert_eq!(spawned.id.as_str(), "el-13");
    }

    #[test]
    fn test_restore_with_largest_id_spawns_without_panic() {
        let mut table = Table::new();
        table.replace_all(vec![Token::new(
            TokenId::from("el-18446744073709551615"),
            "fire".into(),
            0.0,
            0.0,
        )]);
        let spawned = table.spawn("air".into(), 0.0, 0.0);
        assert_eq!(spawned.id.as_str(), "el-1");
    }

    #[test]
    fn test_spawn_skips_live_ids_after_wrapping() {
        let mut table = Table::new();
        table.replace_all(
            ["el-18446744073709551614", "el-18446744073709551615", "el-1"]
                .into_iter()
                .map(|id| Token::new(TokenId::from(id), "fire".into(), 0.0, 0.0))
                .collect(),
        );
        let spawned = table.spawn("air".into(), 0.0, 0.0);
        assert_eq!(spawned.id.as_str(), "el-2");
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let mut table = Table::new();
        table.spawn("air".into(), 1.0, 1.0);
        table.spawn("fire".into(), 2.0, 2.0);
        table.bring_to_front(&TokenId::from("el-1"));

        let json = table.to_json().expect("serialize");
        let restored = Table::from_json(&json).expect("deserialize");
        assert_eq!(names(&restored), vec!["el-2", "el-1"]);
    }

    #[test]
    fn test_malformed_snapshot_is_an_error() {
        assert!(Table::from_json("{not json").is_err());
    }
}
