//! # Seamtile - Seamless Tiled Image Processing
//!
//! Seamtile runs an external per-tile transform (an inpainting or upscaling
//! model, say) over images too large or too elongated to process in one
//! pass. It splits the image into overlapping tiles, hands each tile to the
//! transform, and stitches the results back into one seamless image.
//!
//! ## Features
//!
//! - **Aspect-ratio splitting**: Images above a configurable aspect ratio are
//!   cut into overlapping strips along their long side
//! - **Grid splitting**: Fixed-size tiles for scaling transforms
//! - **Feathered merging**: Linear cross-fades hide seams between same-scale tiles
//! - **Crop merging**: Overlap margins are cropped away for integer-scaled tiles
//! - **Lockstep masks**: An auxiliary mask is split and merged with the same geometry
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seamtile::prelude::*;
//!
//! let dispatcher = SplitDispatcher::new(DispatchConfig::new().with_split_ratio(3.0))?;
//!
//! let result = dispatcher.dispatch(&image, Some(&mask), |tile, mask, request| {
//!     // Run the model on `tile`...
//!     Ok(tile.clone())
//! })?;
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Geometry types, configuration and errors
//! - [`tiling`]: Tile planning and extraction
//! - [`merge`]: Feathered and crop merging
//! - [`dispatch`]: The split/transform/merge pipeline

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod dispatch;
pub mod merge;
pub mod tiling;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use seamtile::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{Axis, PlanLayout, SplitPlan, Tile, TileRect};

    // Configuration
    pub use crate::core::config::DispatchConfig;

    // Errors
    pub use crate::core::error::{TilingError, TilingResult};

    // Tiling
    pub use crate::tiling::{extract, plan_grid, plan_strips, split, GridIterator};

    // Merging
    pub use crate::merge::{CropMerger, FeatheredMerger, MergeStrategy};

    // Dispatching
    pub use crate::dispatch::{
        aspect_ratio, ProgressCallback, ProgressUpdate, SplitDispatcher, TileRequest,
    };
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
