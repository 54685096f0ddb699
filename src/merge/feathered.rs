//! Same-scale reassembly with linear feathering across strip overlaps.
//!
//! Each overlap between two strips is handled in halves. Half of it is a
//! hard boundary; across the other half (`blend_size = overlap / 2` lines)
//! the incoming strip fades in linearly over what is already in the output,
//! and the outgoing strip fades out against the output below it. Blending
//! runs along the traversal axis only and is broadcast across the full
//! perpendicular extent and every channel.

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::{Axis, SplitPlan, Tile};
use image::{ImageBuffer, Pixel};

/// Reassembles processed strips into an image the size of the original.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatheredMerger;

impl FeatheredMerger {
    /// Create a new feathered merger.
    pub fn new() -> Self {
        Self
    }

    /// Merge `tiles` (one per plan rectangle, in plan order) over a copy of
    /// `original`.
    pub fn merge<P>(
        &self,
        tiles: &[Tile<P>],
        original: &ImageBuffer<P, Vec<u8>>,
        plan: &SplitPlan,
    ) -> TilingResult<ImageBuffer<P, Vec<u8>>>
    where
        P: Pixel<Subpixel = u8>,
    {
        let axis = plan.axis().ok_or_else(|| {
            TilingError::UnsupportedPlan("feathering needs a strip plan, got a grid".to_string())
        })?;
        let (width, height) = original.dimensions();
        if (width, height) != (plan.image_width, plan.image_height) {
            return Err(TilingError::ShapeMismatch {
                what: "original image".to_string(),
                expected_width: plan.image_width,
                expected_height: plan.image_height,
                width,
                height,
            });
        }
        if tiles.len() != plan.len() {
            return Err(TilingError::UnsupportedPlan(format!(
                "{} tiles supplied for a plan of {}",
                tiles.len(),
                plan.len()
            )));
        }

        let mut output = original.clone();
        let blend_size = plan.merge_overlap() / 2;
        let last = tiles.len().saturating_sub(1);

        for (i, tile) in tiles.iter().enumerate() {
            check_tile(tile, width, height)?;
            let (start, end) = tile.rect.span(axis);
            let length = end - start;

            if tiles.len() == 1 || blend_size == 0 {
                for pos in 0..length {
                    write_line(&mut output, tile, axis, pos, |src, _| *src);
                }
                continue;
            }

            let leading = if i > 0 { blend_size.min(length) } else { 0 };
            let trailing = if i < last { blend_size.min(length - leading) } else { 0 };

            for j in 0..leading {
                let alpha = j as f32 / blend_size as f32;
                write_line(&mut output, tile, axis, j, |src, dst| cross_fade(src, dst, alpha));
            }

            for pos in leading..length - trailing {
                write_line(&mut output, tile, axis, pos, |src, _| *src);
            }

            for j in 0..trailing {
                let alpha = 1.0 - j as f32 / blend_size as f32;
                let pos = length - trailing + j;
                write_line(&mut output, tile, axis, pos, |src, dst| cross_fade(src, dst, alpha));
            }
        }

        Ok(output)
    }
}

fn check_tile<P>(tile: &Tile<P>, width: u32, height: u32) -> TilingResult<()>
where
    P: Pixel<Subpixel = u8>,
{
    let rect = tile.rect;
    if !rect.is_within_bounds(width, height) {
        return Err(TilingError::OutOfBounds { rect, width, height });
    }
    let (tile_width, tile_height) = tile.data.dimensions();
    if (tile_width, tile_height) != (rect.width, rect.height) {
        return Err(TilingError::ShapeMismatch {
            what: format!("tile {}", tile.index),
            expected_width: rect.width,
            expected_height: rect.height,
            width: tile_width,
            height: tile_height,
        });
    }
    Ok(())
}

/// Combine line `pos` (tile coordinates, along `axis`) of `tile` into `output`.
fn write_line<P, F>(
    output: &mut ImageBuffer<P, Vec<u8>>,
    tile: &Tile<P>,
    axis: Axis,
    pos: u32,
    mut op: F,
) where
    P: Pixel<Subpixel = u8>,
    F: FnMut(&P, &P) -> P,
{
    let rect = tile.rect;
    let across = match axis {
        Axis::Vertical => rect.width,
        Axis::Horizontal => rect.height,
    };

    for k in 0..across {
        let (tx, ty) = match axis {
            Axis::Vertical => (k, pos),
            Axis::Horizontal => (pos, k),
        };
        let src = tile.data.get_pixel(tx, ty);
        let dst = output.get_pixel_mut(rect.x + tx, rect.y + ty);
        *dst = op(src, &*dst);
    }
}

/// `alpha * src + (1 - alpha) * dst`, per channel, rounded to nearest.
fn cross_fade<P>(src: &P, dst: &P, alpha: f32) -> P
where
    P: Pixel<Subpixel = u8>,
{
    src.map2(dst, |s, d| {
        (alpha * s as f32 + (1.0 - alpha) * d as f32)
            .round()
            .clamp(0.0, 255.0) as u8
    })
}
