//! Tiling: planning tile rectangles and copying tile pixels out of an image.

pub mod geometry;
pub mod splitter;

pub use geometry::{plan_grid, plan_strips, GridIterator};
pub use splitter::{extract, split};
