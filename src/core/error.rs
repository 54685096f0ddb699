//! Error types for seamtile.
//!
//! Uses thiserror for structured errors with context. Every failure carries
//! enough information to tell which tile or which input caused it:
//! - Geometry errors name the offending dimensions
//! - Transform errors name the tile index and its source rectangle
//! - Config errors name the offending field

use crate::core::types::TileRect;
use thiserror::Error;

/// Errors raised while planning, splitting, transforming or merging tiles.
#[derive(Error, Debug)]
pub enum TilingError {
    #[error("Tile {rect} exceeds image bounds {width}x{height}")]
    OutOfBounds {
        rect: TileRect,
        width: u32,
        height: u32,
    },

    #[error("Transform failed on tile {index} at {rect}: {source}")]
    TransformFailure {
        index: usize,
        rect: TileRect,
        #[source]
        source: anyhow::Error,
    },

    #[error("Degenerate geometry for {width}x{height} image: {reason}")]
    DegenerateGeometry {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("Shape mismatch for {what}: expected {expected_width}x{expected_height}, got {width}x{height}")]
    ShapeMismatch {
        what: String,
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Plan layout not supported by this merger: {0}")]
    UnsupportedPlan(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TilingError {
    /// Build a `DegenerateGeometry` error.
    pub fn degenerate(width: u32, height: u32, reason: impl Into<String>) -> Self {
        TilingError::DegenerateGeometry {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Get the tile index that caused this error, if applicable.
    pub fn tile_index(&self) -> Option<usize> {
        match self {
            TilingError::TransformFailure { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Whether the error points at a defect in geometry or merging rather
    /// than at the caller's input or the external transform.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            TilingError::OutOfBounds { .. } | TilingError::UnsupportedPlan(_)
        )
    }
}

/// Result type alias for tiling operations.
pub type TilingResult<T> = Result<T, TilingError>;
