//! # Alchemy Core
//!
//! Engine for an element-combining sandbox: drag elements from a paged
//! palette onto a table, drop one on another, and discover what they make.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Game (state)                 │
//! ├──────────────────────────────────────────────┤
//! │  Gesture Engine   │  Merge Resolver          │
//! │  - Spawn / drag   │  - Proximity search      │
//! │  - Page swipes    │  - Merge / reject        │
//! ├──────────────────────────────────────────────┤
//! │  Table  │  Discovery Set  │  Palette  │ Timers│
//! ├──────────────────────────────────────────────┤
//! │  Recipe Catalog   │  Local store / Sync policy│
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Everything here is synchronous and deterministic. Remote I/O lives in
//! `alchemy-client`; this crate only decides when a save is due.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod event;
pub mod gesture;
pub mod palette;
pub mod progress;
pub mod recipe;
pub mod resolver;
pub mod state;
pub mod store;
pub mod sync;
pub mod table;
pub mod timer;
pub mod token;

pub use config::{EngineConfig, Viewport};
pub use discovery::{DiscoverySet, PRIMITIVES};
pub use error::{AlchemyError, AlchemyResult};
pub use event::{EngineEvent, InputEvent, PointerEvent, PointerPhase};
pub use gesture::{GestureConfig, GestureEngine, GestureState};
pub use palette::{Palette, PaletteLayout};
pub use progress::{InitResponse, ProgressLimits, SaveRequest, SaveResponse};
pub use recipe::RecipeCatalog;
pub use resolver::{MergeConfig, MergeResolver, ReleaseOutcome};
pub use state::Game;
pub use store::{FileStore, KeyValueStore, LocalProgress, LocalSnapshot, MemoryStore, StoreError};
pub use sync::{MergeReport, SavePolicy, SaveTrigger, SyncConfig, SyncStatus};
pub use table::{Table, TableSnapshot};
pub use timer::{Scheduler, TimedEffect};
pub use token::{ElementName, IdAllocator, Token, TokenId, TokenStatus, TOKEN_HEIGHT, TOKEN_WIDTH};

/// Alchemy core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
