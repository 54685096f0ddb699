//! Progress reporting for split dispatching.

use crate::core::types::{Axis, TileRect};
use crate::merge::MergeStrategy;
use std::sync::Arc;
use std::time::Instant;

/// A progress update event.
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    /// Tiling has started.
    Started {
        total_tiles: usize,
        axis: Option<Axis>,
        overlap: u32,
    },
    /// A tile is about to be handed to the transform.
    TileStarted {
        index: usize,
        total: usize,
        rect: TileRect,
    },
    /// The transform returned for a tile.
    TileCompleted {
        index: usize,
        total: usize,
        duration_ms: u64,
        estimated_remaining_ms: Option<u64>,
    },
    /// All tiles are processed and are being merged.
    Merging {
        strategy: MergeStrategy,
    },
    /// Dispatch finished.
    Completed {
        total_duration_ms: u64,
        tiles_processed: usize,
    },
    /// A tile failed; no output will be produced.
    Error {
        index: Option<usize>,
        message: String,
    },
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Tracks progress of a single dispatch.
pub struct ProgressTracker {
    total_tiles: usize,
    completed_tiles: usize,
    start_time: Instant,
    tile_times: Vec<u64>,
    callback: Option<Arc<ProgressCallback>>,
}

impl ProgressTracker {
    /// Create a tracker for `total_tiles` tiles.
    pub fn new(total_tiles: usize, callback: Option<Arc<ProgressCallback>>) -> Self {
        Self {
            total_tiles,
            completed_tiles: 0,
            start_time: Instant::now(),
            tile_times: Vec::with_capacity(total_tiles),
            callback,
        }
    }

    /// Start tracking.
    pub fn start(&mut self, axis: Option<Axis>, overlap: u32) {
        self.start_time = Instant::now();
        self.send_update(ProgressUpdate::Started {
            total_tiles: self.total_tiles,
            axis,
            overlap,
        });
    }

    /// Report that a tile has started.
    pub fn tile_started(&self, index: usize, rect: TileRect) {
        self.send_update(ProgressUpdate::TileStarted {
            index,
            total: self.total_tiles,
            rect,
        });
    }

    /// Report that a tile has completed.
    pub fn tile_completed(&mut self, index: usize, duration_ms: u64) {
        self.completed_tiles += 1;
        self.tile_times.push(duration_ms);
        self.send_update(ProgressUpdate::TileCompleted {
            index,
            total: self.total_tiles,
            duration_ms,
            estimated_remaining_ms: self.estimated_remaining_ms(),
        });
    }

    /// Report that merging has begun.
    pub fn merging(&self, strategy: MergeStrategy) {
        self.send_update(ProgressUpdate::Merging { strategy });
    }

    /// Report an error.
    pub fn report_error(&self, index: Option<usize>, message: String) {
        self.send_update(ProgressUpdate::Error { index, message });
    }

    /// Complete tracking.
    pub fn complete(&self) {
        self.send_update(ProgressUpdate::Completed {
            total_duration_ms: self.elapsed_ms(),
            tiles_processed: self.completed_tiles,
        });
    }

    /// Milliseconds since tracking started.
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Get current progress percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.total_tiles == 0 {
            return 100.0;
        }
        (self.completed_tiles as f32 / self.total_tiles as f32) * 100.0
    }

    /// Estimate remaining time in milliseconds.
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        if self.tile_times.is_empty() {
            return None;
        }

        let avg_time = self.tile_times.iter().sum::<u64>() / self.tile_times.len() as u64;
        let remaining = self.total_tiles.saturating_sub(self.completed_tiles);
        Some(avg_time * remaining as u64)
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }
}
