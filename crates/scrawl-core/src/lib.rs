//! Scrawl core library.
//!
//! Platform-agnostic core of the scrawl drawing surface: every edit is an
//! [`ops::Operation`] in an append-only log, and the visible scene is a
//! pure reduction of that log. Rendering, text layout and windowing stay
//! with the embedding application.

pub mod assets;
pub mod board;
pub mod camera;
pub mod log;
pub mod ops;
pub mod raster;
pub mod selection;
pub mod sync;

pub use assets::AssetCache;
pub use board::{Board, ChangeCallback, Tool};
pub use camera::{Camera, MAX_SCALE, MIN_SCALE};
pub use log::{reduce, OperationLog};
pub use ops::{Bounds, OpBody, OpId, OpPatch, Operation, Rgba, ShapeKind, ToolKind};
pub use raster::{flatten_scene, Pixmap, SaveError};
pub use selection::{hit_test, ResizeDirection, ResizeState, HIT_PADDING};
pub use sync::{ClientMessage, ConnectionState, ServerMessage, SyncError, SyncEvent};

#[cfg(not(target_arch = "wasm32"))]
pub use sync::RelayClient;
