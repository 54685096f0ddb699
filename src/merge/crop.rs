//! Scaled reassembly by cropping overlap margins.
//!
//! Tiles coming back from a scaling transform are not blended. Each tile
//! loses half of the (scaled) overlap on every side that faces a
//! neighbour, and the remainder is pasted at its scaled position. Sides on
//! the image border keep their full extent.

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::{SplitPlan, Tile};
use image::{ImageBuffer, Pixel};

/// Reassembles tiles scaled by an integer factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropMerger {
    scale: u32,
    overlap: u32,
}

impl CropMerger {
    /// Create a merger for tiles scaled by `scale` that overlapped by
    /// `overlap` source pixels.
    pub fn new(scale: u32, overlap: u32) -> TilingResult<Self> {
        if scale == 0 {
            return Err(TilingError::InvalidConfig("scale must be at least 1".to_string()));
        }
        Ok(Self { scale, overlap })
    }

    /// Create a merger matching `plan`.
    pub fn for_plan(plan: &SplitPlan, scale: u32) -> TilingResult<Self> {
        Self::new(scale, plan.merge_overlap())
    }

    /// Scale factor applied by the transform.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Size of the merged output for a `width` x `height` source.
    pub fn output_size(&self, width: u32, height: u32) -> TilingResult<(u32, u32)> {
        match (width.checked_mul(self.scale), height.checked_mul(self.scale)) {
            (Some(w), Some(h)) => Ok((w, h)),
            _ => Err(TilingError::InvalidConfig(format!(
                "{}x{} scaled by {} overflows",
                width, height, self.scale
            ))),
        }
    }

    /// Merge `tiles` into a black canvas `scale` times the source size.
    pub fn merge<P>(
        &self,
        tiles: &[Tile<P>],
        width: u32,
        height: u32,
    ) -> TilingResult<ImageBuffer<P, Vec<u8>>>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        let (output_width, output_height) = self.output_size(width, height)?;
        let mut output: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(output_width, output_height);

        let half_overlap = self.overlap * self.scale / 2;

        for tile in tiles {
            let rect = tile.rect;
            if !rect.is_within_bounds(width, height) {
                return Err(TilingError::OutOfBounds { rect, width, height });
            }
            let (tile_width, tile_height) = tile.data.dimensions();
            if tile_width == 0 || tile_height == 0 {
                return Err(TilingError::ShapeMismatch {
                    what: format!("tile {}", tile.index),
                    expected_width: rect.width * self.scale,
                    expected_height: rect.height * self.scale,
                    width: tile_width,
                    height: tile_height,
                });
            }

            let (crop_left, crop_right) =
                crop_span(rect.x == 0, rect.right() >= width, half_overlap, tile_width);
            let (crop_top, crop_bottom) =
                crop_span(rect.y == 0, rect.bottom() >= height, half_overlap, tile_height);

            let cropped = image::imageops::crop_imm(
                &tile.data,
                crop_left,
                crop_top,
                crop_right - crop_left,
                crop_bottom - crop_top,
            )
            .to_image();

            // Pull the paste back inside the canvas if the tile came back oversized.
            let paste_x = (rect.x * self.scale + crop_left)
                .min(output_width.saturating_sub(cropped.width()));
            let paste_y = (rect.y * self.scale + crop_top)
                .min(output_height.saturating_sub(cropped.height()));

            log::trace!(
                "Pasting tile {} ({}x{}) at ({}, {})",
                tile.index,
                cropped.width(),
                cropped.height(),
                paste_x,
                paste_y
            );
            image::imageops::replace(&mut output, &cropped, paste_x as i64, paste_y as i64);
        }

        Ok(output)
    }
}

/// Kept range `[start, end)` of a tile along one axis.
fn crop_span(at_start: bool, at_end: bool, half_overlap: u32, length: u32) -> (u32, u32) {
    let start = if at_start { 0 } else { half_overlap.min(length - 1) };
    let end = if at_end {
        length
    } else {
        length.saturating_sub(half_overlap)
    };
    (start, end.min(length).max(start + 1))
}
