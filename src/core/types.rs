//! Core geometry and buffer types shared by the splitter and the mergers.

use image::{ImageBuffer, Pixel};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a rectangular region within an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    /// X offset from the image origin
    pub x: u32,
    /// Y offset from the image origin
    pub y: u32,
    /// Width of the region
    pub width: u32,
    /// Height of the region
    pub height: u32,
}

impl TileRect {
    /// Create a new tile rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Get the right edge coordinate (exclusive).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Get the bottom edge coordinate (exclusive).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Calculate the area of this region in pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check if this region is non-empty and entirely within the given bounds.
    pub fn is_within_bounds(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && (self.x as u64 + self.width as u64) <= width as u64
            && (self.y as u64 + self.height as u64) <= height as u64
    }

    /// Start and end (exclusive) of this rectangle along `axis`.
    pub fn span(&self, axis: Axis) -> (u32, u32) {
        match axis {
            Axis::Vertical => (self.y, self.bottom()),
            Axis::Horizontal => (self.x, self.right()),
        }
    }
}

impl fmt::Display for TileRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Direction along which strip tiles are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Tiles stacked top to bottom (tall images).
    Vertical,
    /// Tiles placed left to right (wide images).
    Horizontal,
}

impl Axis {
    /// Traversal axis for an image: vertical when taller than wide.
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        if height > width {
            Axis::Vertical
        } else {
            Axis::Horizontal
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Vertical => write!(f, "height"),
            Axis::Horizontal => write!(f, "width"),
        }
    }
}

/// How the rectangles of a plan are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlanLayout {
    /// Full-width or full-height strips along a single axis.
    Strips { axis: Axis },
    /// Row-major 2-D grid.
    Grid { columns: u32, rows: u32 },
}

/// Ordered tile rectangles covering an image, plus the overlap used to build them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    /// Source image width.
    pub image_width: u32,
    /// Source image height.
    pub image_height: u32,
    /// Overlap between neighbouring tiles, in source pixels.
    pub overlap: u32,
    /// Tile arrangement.
    pub layout: PlanLayout,
    /// Tile rectangles in processing order.
    pub rects: Vec<TileRect>,
}

impl SplitPlan {
    /// Number of tiles in the plan.
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    /// Check if the plan has no tiles.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// A plan with one rectangle covering the whole image.
    pub fn is_single(&self) -> bool {
        self.rects.len() == 1
    }

    /// Traversal axis for strip plans.
    pub fn axis(&self) -> Option<Axis> {
        match self.layout {
            PlanLayout::Strips { axis } => Some(axis),
            PlanLayout::Grid { .. } => None,
        }
    }

    /// Overlap that mergers must account for; zero for single-tile plans.
    pub fn merge_overlap(&self) -> u32 {
        if self.is_single() {
            0
        } else {
            self.overlap
        }
    }
}

/// An owned tile of pixels together with where it came from.
#[derive(Debug, Clone)]
pub struct Tile<P: Pixel> {
    /// Position of the tile in the plan.
    pub index: usize,
    /// Source rectangle in original image coordinates.
    pub rect: TileRect,
    /// Pixel data; may be scaled relative to `rect` after processing.
    pub data: ImageBuffer<P, Vec<P::Subpixel>>,
}

impl<P: Pixel> Tile<P> {
    /// Create a new tile.
    pub fn new(index: usize, rect: TileRect, data: ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self { index, rect, data }
    }

    /// Replace the pixel data, keeping index and source rectangle.
    pub fn with_data(self, data: ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            index: self.index,
            rect: self.rect,
            data,
        }
    }

    /// Memory size of the pixel data in subpixels.
    pub fn memory_size(&self) -> usize {
        self.data.as_raw().len()
    }
}
