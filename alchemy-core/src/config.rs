//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{GestureConfig, MergeConfig, PaletteLayout};

/// Size of the play area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl Viewport {
    /// Create a viewport.
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(400.0, 800.0)
    }
}

/// Every tunable of the engine in one place.
///
/// All fields have defaults, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Initial viewport.
    pub viewport: Viewport,
    /// Palette geometry.
    pub palette: PaletteLayout,
    /// Gesture thresholds.
    pub gesture: GestureConfig,
    /// Merge distances and feedback delays.
    pub merge: MergeConfig,
    /// Time between an explode request and removal of the token.
    pub explode_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            palette: PaletteLayout::default(),
            gesture: GestureConfig::default(),
            merge: MergeConfig::default(),
            explode_ms: 300,
        }
    }
}

impl EngineConfig {
    /// Use a different initial viewport.
    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"explode_ms": 10}"#).expect("should parse");
        assert_eq!(config.explode_ms, 10);
        assert_eq!(config.merge, MergeConfig::default());
        assert_eq!(config.viewport, Viewport::default());
    }
}
