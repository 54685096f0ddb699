//! Dispatch configuration.
//!
//! Configuration can be built in code with the `with_*` builders or loaded
//! from a TOML document:
//!
//! ```toml
//! split_ratio = 3.0
//! scale = 2
//! tile_size = 512
//! tile_overlap = 16
//! ```

use crate::core::error::{TilingError, TilingResult};
use crate::merge::MergeStrategy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default aspect-ratio threshold above which tiling activates.
pub const DEFAULT_SPLIT_RATIO: f64 = 3.0;

/// Default processing size forwarded to the per-tile transform.
pub const DEFAULT_TARGET_SIZE: u32 = 1024;

/// Default grid tile size in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Default grid tile overlap in pixels.
pub const DEFAULT_TILE_OVERLAP: u32 = 16;

/// Configuration for split dispatching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Aspect-ratio threshold above which the image is split. Values `<= 0`
    /// disable splitting entirely.
    pub split_ratio: f64,
    /// Integer scale factor of the per-tile transform (1 = same scale).
    pub scale: u32,
    /// Processing size forwarded untouched to the transform.
    pub target_size: u32,
    /// Tile edge length for grid dispatching.
    pub tile_size: u32,
    /// Overlap between grid tiles.
    pub tile_overlap: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            split_ratio: DEFAULT_SPLIT_RATIO,
            scale: 1,
            target_size: DEFAULT_TARGET_SIZE,
            tile_size: DEFAULT_TILE_SIZE,
            tile_overlap: DEFAULT_TILE_OVERLAP,
        }
    }
}

impl DispatchConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the split ratio threshold.
    pub fn with_split_ratio(mut self, ratio: f64) -> Self {
        self.split_ratio = ratio;
        self
    }

    /// Set the transform's scale factor.
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    /// Set the processing size forwarded to the transform.
    pub fn with_target_size(mut self, size: u32) -> Self {
        self.target_size = size;
        self
    }

    /// Set the grid tile size and overlap.
    pub fn with_grid(mut self, tile_size: u32, overlap: u32) -> Self {
        self.tile_size = tile_size;
        self.tile_overlap = overlap;
        self
    }

    /// Whether splitting can ever activate.
    pub fn splitting_enabled(&self) -> bool {
        self.split_ratio > 0.0
    }

    /// Merge strategy implied by the transform's scale.
    pub fn strategy(&self) -> MergeStrategy {
        MergeStrategy::for_scale(self.scale)
    }

    /// Check the configuration for values no dispatch can work with.
    pub fn validate(&self) -> TilingResult<()> {
        if self.split_ratio.is_nan() || self.split_ratio.is_infinite() {
            return Err(TilingError::InvalidConfig(format!(
                "split_ratio must be finite, got {}",
                self.split_ratio
            )));
        }
        if self.scale == 0 {
            return Err(TilingError::InvalidConfig("scale must be at least 1".to_string()));
        }
        if self.tile_size <= self.tile_overlap {
            return Err(TilingError::InvalidConfig(format!(
                "tile_size ({}) must exceed tile_overlap ({})",
                self.tile_size, self.tile_overlap
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> TilingResult<Self> {
        let config: DispatchConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> TilingResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}
