//! Dispatching: the pipeline that decides on splitting, drives the external
//! per-tile transform and merges the results.

pub mod dispatcher;
pub mod progress;

pub use dispatcher::{aspect_ratio, SplitDispatcher, TileRequest};
pub use progress::{ProgressCallback, ProgressTracker, ProgressUpdate};
