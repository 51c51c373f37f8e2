//! Wire types for remote progress, shared by the client and the server.

use serde::{Deserialize, Serialize};

use crate::{AlchemyError, AlchemyResult, DiscoverySet, ElementName, Table, Token};

/// Caps applied to every save payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressLimits {
    /// Only the most recent tokens of the table are saved.
    pub max_table_tokens: usize,
    /// Serialized payloads above this size are skipped entirely.
    pub max_payload_bytes: usize,
}

impl Default for ProgressLimits {
    fn default() -> Self {
        Self {
            max_table_tokens: 20,
            max_payload_bytes: 32_000,
        }
    }
}

/// Response of the init endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    /// Names the user has discovered remotely.
    #[serde(default)]
    pub discovered_names: Vec<ElementName>,
    /// Remote table, if any was saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_tokens: Option<Vec<Token>>,
    /// Display name of the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Body of a progress save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    /// Full discovery list in discovery order.
    pub discovered_names: Vec<ElementName>,
    /// Most recent table tokens.
    #[serde(default)]
    pub table_tokens: Vec<Token>,
}

impl SaveRequest {
    /// Build a save from the current state, keeping only the most recent
    /// tokens.
    #[must_use]
    pub fn new(discovery: &DiscoverySet, table: &Table, limits: &ProgressLimits) -> Self {
        Self {
            discovered_names: discovery.as_slice().to_vec(),
            table_tokens: table.iter().cloned().collect(),
        }
        .capped(limits)
    }

    /// Drop all but the last `max_table_tokens` tokens.
    #[must_use]
    pub fn capped(mut self, limits: &ProgressLimits) -> Self {
        let excess = self
            .table_tokens
            .len()
            .saturating_sub(limits.max_table_tokens);
        self.table_tokens.drain(..excess);
        self
    }

    /// Size of the JSON body, measured without building it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encoded_len(&self) -> AlchemyResult<usize> {
        let mut counter = ByteCounter::default();
        serde_json::to_writer(&mut counter, self)?;
        Ok(counter.0)
    }

    /// Check the body against the byte ceiling and return its size.
    ///
    /// # Errors
    ///
    /// Returns [`AlchemyError::PayloadTooLarge`] if the encoded body exceeds
    /// the ceiling, or a serialization error.
    pub fn check_size(&self, limits: &ProgressLimits) -> AlchemyResult<usize> {
        let size = self.encoded_len()?;
        if size > limits.max_payload_bytes {
            return Err(AlchemyError::PayloadTooLarge {
                size,
                limit: limits.max_payload_bytes,
            });
        }
        Ok(size)
    }
}

/// Write sink that only counts bytes.
#[derive(Default)]
struct ByteCounter(usize);

impl std::io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Response of the save endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    /// Whether the save was accepted.
    pub success: bool,
}
