//! Tile geometry: where each tile sits in the source image.
//!
//! Two planners are provided:
//! - [`plan_strips`] splits an image with an extreme aspect ratio into
//!   full-width (or full-height) strips laid out along its long side. This
//!   is the layout the feathered merger understands.
//! - [`plan_grid`] covers an image with a row-major grid of square tiles,
//!   the layout used for scaling transforms.
//!
//! Both planners are deterministic. Boundaries come from integer floor/ceil
//! arithmetic and must not drift: any off-by-one here shows up as a seam
//! after merging.

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::{Axis, PlanLayout, SplitPlan, TileRect};

/// Share of the short side used as strip overlap, as `short / OVERLAP_DIVISOR`.
const OVERLAP_DIVISOR: u32 = 10;

/// Plan strip tiles for a `width` x `height` image.
///
/// The image is cut along its long side into `ceil(long / (short * target_ratio))`
/// strips, each spanning the full short side. Neighbouring strips overlap by
/// `floor(short * 0.1)` pixels. When one strip suffices the plan holds a single
/// rectangle covering the whole image.
pub fn plan_strips(width: u32, height: u32, target_ratio: f64) -> TilingResult<SplitPlan> {
    if width == 0 || height == 0 {
        return Err(TilingError::degenerate(width, height, "image has a zero-sized side"));
    }
    if !target_ratio.is_finite() || target_ratio <= 0.0 {
        return Err(TilingError::degenerate(
            width,
            height,
            format!("target ratio must be positive, got {}", target_ratio),
        ));
    }

    let axis = Axis::for_dimensions(width, height);
    let (long_side, short_side) = match axis {
        Axis::Vertical => (height, width),
        Axis::Horizontal => (width, height),
    };

    let overlap = short_side / OVERLAP_DIVISOR;
    let count = (long_side as f64 / (short_side as f64 * target_ratio)).ceil().max(1.0);
    if count > long_side as f64 {
        return Err(TilingError::degenerate(
            width,
            height,
            format!("{} tiles requested for a side of {} pixels", count, long_side),
        ));
    }
    let num_tiles = count as u64;

    if num_tiles == 1 {
        return Ok(SplitPlan {
            image_width: width,
            image_height: height,
            overlap,
            layout: PlanLayout::Strips { axis },
            rects: vec![TileRect::full(width, height)],
        });
    }

    let long = long_side as u64;
    let tile_extent = (long + overlap as u64 * (num_tiles - 1)) / num_tiles;
    if tile_extent <= overlap as u64 {
        return Err(TilingError::degenerate(
            width,
            height,
            format!("tile extent {} does not exceed overlap {}", tile_extent, overlap),
        ));
    }
    let step = tile_extent - overlap as u64;

    let rects = (0..num_tiles)
        .map(|i| {
            let start = i * step;
            // Floored extents can leave the last strip short of the far edge.
            let end = if i + 1 == num_tiles {
                long
            } else {
                (start + tile_extent).min(long)
            };
            strip_rect(axis, start as u32, (end - start) as u32, short_side)
        })
        .collect();

    Ok(SplitPlan {
        image_width: width,
        image_height: height,
        overlap,
        layout: PlanLayout::Strips { axis },
        rects,
    })
}

fn strip_rect(axis: Axis, start: u32, length: u32, short_side: u32) -> TileRect {
    match axis {
        Axis::Vertical => TileRect::new(0, start, short_side, length),
        Axis::Horizontal => TileRect::new(start, 0, length, short_side),
    }
}

/// Plan a row-major grid of `tile_size` tiles overlapping by `overlap` pixels.
///
/// Tiles step by `tile_size - overlap`; the last tile of a row or column is
/// cut at the image edge and no tile starts once the edge has been reached.
pub fn plan_grid(width: u32, height: u32, tile_size: u32, overlap: u32) -> TilingResult<SplitPlan> {
    if width == 0 || height == 0 {
        return Err(TilingError::degenerate(width, height, "image has a zero-sized side"));
    }
    if tile_size <= overlap {
        return Err(TilingError::degenerate(
            width,
            height,
            format!("tile size {} does not exceed overlap {}", tile_size, overlap),
        ));
    }

    let tiles = GridIterator::new(width, height, tile_size, overlap);
    let columns = tiles.columns();
    let rows = tiles.rows();

    Ok(SplitPlan {
        image_width: width,
        image_height: height,
        overlap,
        layout: PlanLayout::Grid { columns, rows },
        rects: tiles.collect(),
    })
}

/// Iterator over overlapping grid tiles in row-major order.
pub struct GridIterator {
    image_width: u32,
    image_height: u32,
    tile_size: u32,
    stride: u32,
    current_x: u32,
    current_y: u32,
    finished: bool,
}

impl GridIterator {
    /// Create a new grid iterator. `tile_size` must exceed `overlap`.
    pub fn new(image_width: u32, image_height: u32, tile_size: u32, overlap: u32) -> Self {
        Self {
            image_width,
            image_height,
            tile_size,
            stride: tile_size.saturating_sub(overlap).max(1),
            current_x: 0,
            current_y: 0,
            finished: image_width == 0 || image_height == 0,
        }
    }

    /// Number of tile columns.
    pub fn columns(&self) -> u32 {
        steps_along(self.image_width, self.tile_size, self.stride)
    }

    /// Number of tile rows.
    pub fn rows(&self) -> u32 {
        steps_along(self.image_height, self.tile_size, self.stride)
    }

    /// Get the total number of tiles.
    pub fn tile_count(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }
}

fn steps_along(length: u32, tile_size: u32, stride: u32) -> u32 {
    if length <= tile_size {
        1
    } else {
        (length - tile_size).div_ceil(stride) + 1
    }
}

impl Iterator for GridIterator {
    type Item = TileRect;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let x = self.current_x;
        let y = self.current_y;
        let width = self.tile_size.min(self.image_width - x);
        let height = self.tile_size.min(self.image_height - y);
        let rect = TileRect::new(x, y, width, height);

        // Move to next tile
        if rect.right() >= self.image_width {
            self.current_x = 0;
            if rect.bottom() >= self.image_height {
                self.finished = true;
            } else {
                self.current_y += self.stride;
            }
        } else {
            self.current_x += self.stride;
        }

        Some(rect)
    }
}
