//! Extraction of tile pixels from a source buffer.
//!
//! Tiles are always copied out of the source. A transform may hold on to a
//! tile, process tiles out of order or hand them to another thread, so a
//! tile must never alias its neighbours.

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::{SplitPlan, Tile, TileRect};
use image::{ImageBuffer, Pixel};

/// Copy the pixels under `rect` out of `image` into a new tile.
pub fn extract<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    rect: TileRect,
    index: usize,
) -> TilingResult<Tile<P>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (width, height) = image.dimensions();
    if !rect.is_within_bounds(width, height) {
        return Err(TilingError::OutOfBounds { rect, width, height });
    }

    let data = image::imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
    Ok(Tile::new(index, rect, data))
}

/// Lazily extract every tile of `plan`, in plan order.
pub fn split<'a, P>(
    image: &'a ImageBuffer<P, Vec<u8>>,
    plan: &'a SplitPlan,
) -> impl Iterator<Item = TilingResult<Tile<P>>> + 'a
where
    P: Pixel<Subpixel = u8> + 'static,
{
    plan.rects
        .iter()
        .enumerate()
        .map(move |(index, rect)| extract(image, *rect, index))
}
