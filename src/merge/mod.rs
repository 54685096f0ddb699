//! Reassembly of processed tiles.
//!
//! - [`FeatheredMerger`]: same-scale output, linear cross-fade across overlaps
//! - [`CropMerger`]: integer-scaled output, half of each overlap cropped away
//!
//! [`MergeStrategy`] picks between them from the scale of the transform.

pub mod crop;
pub mod feathered;

pub use crop::CropMerger;
pub use feathered::FeatheredMerger;

use crate::core::error::TilingResult;
use crate::core::types::{SplitPlan, Tile};
use image::{ImageBuffer, Pixel};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How processed tiles are put back together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Same-scale transforms such as inpainting.
    Feathered,
    /// Scaling transforms such as upscaling.
    Crop { scale: u32 },
}

impl MergeStrategy {
    /// Strategy for a transform that scales its input by `scale`.
    pub fn for_scale(scale: u32) -> Self {
        match scale {
            1 => MergeStrategy::Feathered,
            scale => MergeStrategy::Crop { scale },
        }
    }

    /// Scale factor between source and merged output.
    pub fn scale(&self) -> u32 {
        match self {
            MergeStrategy::Feathered => 1,
            MergeStrategy::Crop { scale } => *scale,
        }
    }

    /// Merge `tiles` produced from `plan` over `original`.
    pub fn merge<P>(
        &self,
        tiles: &[Tile<P>],
        original: &ImageBuffer<P, Vec<u8>>,
        plan: &SplitPlan,
    ) -> TilingResult<ImageBuffer<P, Vec<u8>>>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        match self {
            MergeStrategy::Feathered => FeatheredMerger::new().merge(tiles, original, plan),
            MergeStrategy::Crop { scale } => {
                CropMerger::for_plan(plan, *scale)?.merge(tiles, plan.image_width, plan.image_height)
            }
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::Feathered => write!(f, "feathered"),
            MergeStrategy::Crop { scale } => write!(f, "crop x{}", scale),
        }
    }
}
