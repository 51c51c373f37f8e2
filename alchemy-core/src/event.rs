//! Input events consumed by the engine and the events it emits.

use serde::{Deserialize, Serialize};

use crate::{ElementName, TokenId};

/// Phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    /// Pointer pressed.
    Down,
    /// Pointer moved.
    Move,
    /// Pointer released.
    Up,
    /// Pointer capture lost; treated as a release without merge.
    Cancel,
}

/// A pointer event in table coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Phase of this event.
    pub phase: PointerPhase,
    /// X position in pixels.
    pub x: f32,
    /// Y position in pixels.
    pub y: f32,
    /// Timestamp in milliseconds since session start.
    pub timestamp_ms: u64,
}

impl PointerEvent {
    /// Create a new pointer event.
    #[must_use]
    pub const fn new(phase: PointerPhase, x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self {
            phase,
            x,
            y,
            timestamp_ms,
        }
    }

    /// Pointer pressed at a point.
    #[must_use]
    pub const fn down(x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerPhase::Down, x, y, timestamp_ms)
    }

    /// Pointer moved to a point.
    #[must_use]
    pub const fn moved(x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerPhase::Move, x, y, timestamp_ms)
    }

    /// Pointer released at a point.
    #[must_use]
    pub const fn up(x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerPhase::Up, x, y, timestamp_ms)
    }

    /// Pointer capture lost.
    #[must_use]
    pub const fn cancel(x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerPhase::Cancel, x, y, timestamp_ms)
    }
}

/// All input the engine accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Pointer input.
    Pointer(PointerEvent),

    /// Single-character palette filter input; `None` clears the filter.
    Filter {
        /// The filter character.
        #[serde(default)]
        ch: Option<char>,
    },

    /// Viewport resize.
    Resize {
        /// New viewport width in pixels.
        width: f32,
        /// New viewport height in pixels.
        height: f32,
    },

    /// Explode a single token.
    Explode {
        /// Token to explode.
        id: TokenId,
    },

    /// Explode every token on the table.
    ClearTable,

    /// Reset discoveries and the table.
    WipeProgress,

    /// Advance the clock without other input.
    Tick {
        /// Timestamp in milliseconds since session start.
        timestamp_ms: u64,
    },
}

impl InputEvent {
    /// The timestamp carried by the event, if any.
    #[must_use]
    pub const fn timestamp_ms(&self) -> Option<u64> {
        match self {
            Self::Pointer(pointer) => Some(pointer.timestamp_ms),
            Self::Tick { timestamp_ms } => Some(*timestamp_ms),
            _ => None,
        }
    }
}

/// Named events emitted by the engine for renderers and hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A token was spawned from the palette.
    Spawned {
        /// New token id.
        id: TokenId,
        /// Element kind.
        name: ElementName,
    },
    /// A dragged token was dropped on the palette and discarded.
    Discarded {
        /// Discarded token id.
        id: TokenId,
    },
    /// Two tokens merged into new ones.
    Merged {
        /// The consumed tokens (dragged, target).
        sources: [TokenId; 2],
        /// The produced tokens, in recipe order.
        outputs: Vec<TokenId>,
        /// Midpoint X.
        x: f32,
        /// Midpoint Y.
        y: f32,
    },
    /// A name entered the discovery set.
    Discovered {
        /// The new name.
        name: ElementName,
    },
    /// A proximate pair had no recipe.
    Rejected {
        /// The dragged token.
        dragged: TokenId,
        /// The target token.
        target: TokenId,
    },
    /// Tokens were repositioned by a bounce or a push.
    Repositioned {
        /// Moved token ids.
        ids: Vec<TokenId>,
    },
    /// Success flash started at a point.
    FlashStarted {
        /// Flash sequence number.
        flash_id: u64,
        /// Centre X.
        x: f32,
        /// Centre Y.
        y: f32,
    },
    /// Success flash finished.
    FlashCleared {
        /// Flash sequence number.
        flash_id: u64,
    },
    /// A token was removed by an explosion.
    Exploded {
        /// Removed token id.
        id: TokenId,
    },
    /// A palette entry was tapped without dragging.
    Tapped {
        /// The tapped element.
        name: ElementName,
    },
    /// The active palette page changed.
    PageChanged {
        /// New page index.
        page: usize,
    },
    /// Discoveries and table were reset.
    Wiped,
}
