//! Core types and configuration for seamtile.
//!
//! This module contains the foundational pieces shared by tiling, merging
//! and dispatching:
//! - Geometry types (`TileRect`, `SplitPlan`, `Tile`)
//! - Dispatch configuration
//! - Error types

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::DispatchConfig;
pub use error::{TilingError, TilingResult};
pub use types::{Axis, PlanLayout, SplitPlan, Tile, TileRect};
