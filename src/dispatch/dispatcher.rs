//! Split dispatcher implementation.
//!
//! The dispatcher decides whether an image needs splitting, runs the
//! external transform over every tile in plan order and merges the results.
//! Tiles are processed one at a time; a failing tile aborts the whole
//! dispatch and nothing is merged. An auxiliary mask is split with the same
//! geometry and, through [`SplitDispatcher::dispatch_with_aux`], merged back
//! with the same strategy.

use crate::core::config::DispatchConfig;
use crate::core::error::{TilingError, TilingResult};
use crate::core::types::{SplitPlan, TileRect};
use crate::dispatch::progress::{ProgressCallback, ProgressTracker, ProgressUpdate};
use crate::merge::MergeStrategy;
use crate::tiling::{extract, plan_grid, plan_strips, split};
use image::{GrayImage, RgbImage};
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Instant;

/// What the transform is being asked to process.
///
/// Only `target_size` is forwarded from the configuration. Transforms that
/// need further settings capture their own configuration in the closure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRequest {
    /// Position of the tile in the plan.
    pub index: usize,
    /// Number of tiles in the plan.
    pub total: usize,
    /// Source rectangle of the tile.
    pub rect: TileRect,
    /// Processing size forwarded from the configuration.
    pub target_size: u32,
}

/// Aspect ratio of an image, always `>= 1`.
pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    let (w, h) = (width as f64, height as f64);
    (w / h).max(h / w)
}

/// Routes images through a per-tile transform, splitting when needed.
pub struct SplitDispatcher {
    config: DispatchConfig,
    progress: Option<Arc<ProgressCallback>>,
}

impl std::fmt::Debug for SplitDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitDispatcher")
            .field("config", &self.config)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl SplitDispatcher {
    /// Create a dispatcher; the configuration is validated up front.
    pub fn new(config: DispatchConfig) -> TilingResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress: None,
        })
    }

    /// Set progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        let callback: ProgressCallback = Box::new(callback);
        self.progress = Some(Arc::new(callback));
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Whether an image of this size is split by [`dispatch`](Self::dispatch).
    pub fn needs_split(&self, width: u32, height: u32) -> bool {
        self.config.splitting_enabled() && aspect_ratio(width, height) > self.config.split_ratio
    }

    /// Strip plan [`dispatch`](Self::dispatch) would use for an image of this size.
    pub fn plan(&self, width: u32, height: u32) -> TilingResult<SplitPlan> {
        plan_strips(width, height, self.config.split_ratio)
    }

    /// Run `transform` over `image`, splitting it into strips when its aspect
    /// ratio exceeds the configured threshold.
    ///
    /// `aux` (typically an inpainting mask) is split with the same geometry
    /// and handed to the transform alongside each tile.
    pub fn dispatch<F>(
        &self,
        image: &RgbImage,
        aux: Option<&GrayImage>,
        mut transform: F,
    ) -> TilingResult<RgbImage>
    where
        F: FnMut(&RgbImage, Option<&GrayImage>, &TileRequest) -> anyhow::Result<RgbImage>,
    {
        let (width, height) = image.dimensions();
        check_inputs(image, aux)?;

        if !self.needs_split(width, height) {
            debug!(
                "Image {}x{} (aspect {:.2}) processed whole",
                width,
                height,
                aspect_ratio(width, height)
            );
            let rect = TileRect::full(width, height);
            let request = TileRequest {
                index: 0,
                total: 1,
                rect,
                target_size: self.config.target_size,
            };
            return transform(image, aux, &request).map_err(|source| TilingError::TransformFailure {
                index: 0,
                rect,
                source,
            });
        }

        let plan = self.plan(width, height)?;
        info!(
            "Image {}x{} (aspect {:.2}) split into {} tiles along {}, overlap {}",
            width,
            height,
            aspect_ratio(width, height),
            plan.len(),
            plan.axis().map(|a| a.to_string()).unwrap_or_default(),
            plan.overlap
        );
        let (merged, _) = self.run_plan(image, aux, &plan, self.config.strategy(), |tile, aux, request| {
            transform(tile, aux, request).map(|output| (output, None))
        })?;
        Ok(merged)
    }

    /// Like [`dispatch`](Self::dispatch), but the transform also returns a
    /// processed version of its auxiliary tile, and the auxiliary tiles are
    /// merged with the same strategy and geometry as the image.
    pub fn dispatch_with_aux<F>(
        &self,
        image: &RgbImage,
        aux: &GrayImage,
        mut transform: F,
    ) -> TilingResult<(RgbImage, GrayImage)>
    where
        F: FnMut(&RgbImage, &GrayImage, &TileRequest) -> anyhow::Result<(RgbImage, GrayImage)>,
    {
        let (width, height) = image.dimensions();
        check_inputs(image, Some(aux))?;

        if !self.needs_split(width, height) {
            let rect = TileRect::full(width, height);
            let request = TileRequest {
                index: 0,
                total: 1,
                rect,
                target_size: self.config.target_size,
            };
            return transform(image, aux, &request).map_err(|source| TilingError::TransformFailure {
                index: 0,
                rect,
                source,
            });
        }

        let plan = self.plan(width, height)?;
        info!(
            "Image {}x{} split with its auxiliary input into {} tiles, overlap {}",
            width,
            height,
            plan.len(),
            plan.overlap
        );
        let (merged, merged_aux) =
            self.run_plan(image, Some(aux), &plan, self.config.strategy(), |tile, aux_tile, request| {
                let aux_tile = aux_tile.ok_or_else(|| anyhow::anyhow!("missing auxiliary tile"))?;
                transform(tile, aux_tile, request).map(|(output, aux_output)| (output, Some(aux_output)))
            })?;
        let merged_aux = merged_aux.ok_or_else(|| {
            TilingError::UnsupportedPlan("auxiliary tiles were not merged".to_string())
        })?;
        Ok((merged, merged_aux))
    }

    /// Run `transform` over a 2-D grid of `tile_size` tiles and crop-merge the
    /// results, regardless of aspect ratio.
    pub fn dispatch_grid<F>(
        &self,
        image: &RgbImage,
        aux: Option<&GrayImage>,
        mut transform: F,
    ) -> TilingResult<RgbImage>
    where
        F: FnMut(&RgbImage, Option<&GrayImage>, &TileRequest) -> anyhow::Result<RgbImage>,
    {
        let (width, height) = image.dimensions();
        check_inputs(image, aux)?;

        let plan = plan_grid(width, height, self.config.tile_size, self.config.tile_overlap)?;
        info!(
            "Image {}x{} split into {} grid tiles of {}px, overlap {}",
            width,
            height,
            plan.len(),
            self.config.tile_size,
            plan.overlap
        );
        let strategy = MergeStrategy::Crop {
            scale: self.config.scale,
        };
        let (merged, _) = self.run_plan(image, aux, &plan, strategy, |tile, aux, request| {
            transform(tile, aux, request).map(|output| (output, None))
        })?;
        Ok(merged)
    }

    /// Process every tile of `plan`, then merge the image tiles and, when the
    /// transform returned one for every tile, the auxiliary tiles.
    fn run_plan<F>(
        &self,
        image: &RgbImage,
        aux: Option<&GrayImage>,
        plan: &SplitPlan,
        strategy: MergeStrategy,
        mut transform: F,
    ) -> TilingResult<(RgbImage, Option<GrayImage>)>
    where
        F: FnMut(
            &RgbImage,
            Option<&GrayImage>,
            &TileRequest,
        ) -> anyhow::Result<(RgbImage, Option<GrayImage>)>,
    {
        let mut tracker = ProgressTracker::new(plan.len(), self.progress.clone());
        tracker.start(plan.axis(), plan.overlap);

        let mut processed = Vec::with_capacity(plan.len());
        let mut processed_aux = Vec::with_capacity(if aux.is_some() { plan.len() } else { 0 });
        for tile in split(image, plan) {
            let tile = tile?;
            let aux_tile = aux.map(|mask| extract(mask, tile.rect, tile.index)).transpose()?;
            let request = TileRequest {
                index: tile.index,
                total: plan.len(),
                rect: tile.rect,
                target_size: self.config.target_size,
            };

            debug!(
                "Processing tile {}/{}: {} ({} px)",
                tile.index + 1,
                plan.len(),
                tile.rect,
                tile.rect.area()
            );
            tracker.tile_started(tile.index, tile.rect);
            let started = Instant::now();

            let (output, aux_output) = match transform(&tile.data, aux_tile.as_ref().map(|t| &t.data), &request) {
                Ok(output) => output,
                Err(source) => {
                    tracker.report_error(Some(tile.index), source.to_string());
                    return Err(TilingError::TransformFailure {
                        index: tile.index,
                        rect: tile.rect,
                        source,
                    });
                }
            };

            tracker.tile_completed(tile.index, started.elapsed().as_millis() as u64);
            let tile = tile.with_data(output);
            debug!(
                "Tile {} returned {} subpixels, {:.0}% done",
                tile.index,
                tile.memory_size(),
                tracker.progress_percent()
            );
            processed.push(tile);
            if let (Some(aux_tile), Some(aux_output)) = (aux_tile, aux_output) {
                processed_aux.push(aux_tile.with_data(aux_output));
            }
        }

        tracker.merging(strategy);
        let merged = strategy
            .merge(&processed, image, plan)
            .map_err(|e| merge_failed(&tracker, e))?;
        let merged_aux = match aux {
            Some(mask) if processed_aux.len() == processed.len() => Some(
                strategy
                    .merge(&processed_aux, mask, plan)
                    .map_err(|e| merge_failed(&tracker, e))?,
            ),
            _ => None,
        };
        debug!(
            "Merged {} tiles ({}) in {}ms",
            processed.len(),
            strategy,
            tracker.elapsed_ms()
        );
        tracker.complete();
        Ok((merged, merged_aux))
    }
}

fn merge_failed(tracker: &ProgressTracker, e: TilingError) -> TilingError {
    if e.is_internal() {
        error!("Merge rejected its own plan: {}", e);
    }
    tracker.report_error(None, e.to_string());
    e
}

fn check_inputs(image: &RgbImage, aux: Option<&GrayImage>) -> TilingResult<()> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(TilingError::degenerate(width, height, "image has a zero-sized side"));
    }
    if let Some(mask) = aux {
        if mask.dimensions() != (width, height) {
            return Err(TilingError::ShapeMismatch {
                what: "auxiliary input".to_string(),
                expected_width: width,
                expected_height: height,
                width: mask.width(),
                height: mask.height(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn markers(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 250 + 1) as u8, (y % 250 + 1) as u8, ((x * 3 + y) % 250 + 1) as u8])
        })
    }

    fn invert(image: &RgbImage) -> RgbImage {
        let mut out = image.clone();
        image::imageops::invert(&mut out);
        out
    }

    fn upscale(image: &RgbImage, scale: u32) -> RgbImage {
        RgbImage::from_fn(image.width() * scale, image.height() * scale, |x, y| {
            *image.get_pixel(x / scale, y / scale)
        })
    }

    fn upscale_mask(mask: &GrayImage, scale: u32) -> GrayImage {
        GrayImage::from_fn(mask.width() * scale, mask.height() * scale, |x, y| {
            *mask.get_pixel(x / scale, y / scale)
        })
    }

    fn dispatcher(config: DispatchConfig) -> SplitDispatcher {
        SplitDispatcher::new(config).unwrap()
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(aspect_ratio(100, 100), 1.0);
        assert_eq!(aspect_ratio(2000, 100), 20.0);
        assert_eq!(aspect_ratio(100, 400), 4.0);
    }

    #[test]
    fn test_below_threshold_calls_transform_once() {
        let image = markers(300, 200);
        let calls = Cell::new(0);
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(2.0));
        assert!(!dispatcher.needs_split(300, 200));

        let result = dispatcher
            .dispatch(&image, None, |tile: &RgbImage, _: Option<&GrayImage>, request: &TileRequest| {
                calls.set(calls.get() + 1);
                assert_eq!(request.total, 1);
                assert_eq!(request.rect, TileRect::full(300, 200));
                Ok(invert(tile))
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(result, invert(&image));
    }

    #[test]
    fn test_non_positive_ratio_disables_splitting() {
        let image = markers(2000, 100);
        let calls = Cell::new(0);
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(0.0));
        assert!(!dispatcher.needs_split(2000, 100));

        dispatcher
            .dispatch(&image, None, |tile: &RgbImage, _: Option<&GrayImage>, _: &TileRequest| {
                calls.set(calls.get() + 1);
                Ok(tile.clone())
            })
            .unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_ratio_at_threshold_is_not_split() {
        let image = markers(600, 200);
        let calls = Cell::new(0);
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(3.0));
        assert_eq!(aspect_ratio(600, 200), 3.0);

        let result = dispatcher
            .dispatch(&image, None, |tile: &RgbImage, _: Option<&GrayImage>, request: &TileRequest| {
                calls.set(calls.get() + 1);
                assert_eq!(request.rect, TileRect::full(600, 200));
                Ok(tile.clone())
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(result, image);
    }

    #[test]
    fn test_negative_ratio_dispatches_whole_image() {
        let image = markers(2000, 100);
        let calls = Cell::new(0);
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(-1.0));

        let result = dispatcher
            .dispatch(&image, None, |tile: &RgbImage, _: Option<&GrayImage>, request: &TileRequest| {
                calls.set(calls.get() + 1);
                assert_eq!(request.total, 1);
                assert_eq!(request.rect, TileRect::full(2000, 100));
                Ok(invert(tile))
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(result, invert(&image));
    }

    #[test]
    fn test_split_identity_reproduces_image() {
        let image = markers(2000, 100);
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(1.0));
        let expected_tiles = dispatcher.plan(2000, 100).unwrap().len();
        assert_eq!(expected_tiles, 20);

        let mut seen = Vec::new();
        let result = dispatcher
            .dispatch(&image, None, |tile: &RgbImage, _: Option<&GrayImage>, request: &TileRequest| {
                seen.push(request.index);
                Ok(tile.clone())
            })
            .unwrap();

        assert_eq!(result, image);
        assert_eq!(seen, (0..expected_tiles).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_pointwise_transform_is_seamless() {
        let image = markers(90, 800);
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(3.0));
        assert!(dispatcher.needs_split(90, 800));

        let result = dispatcher
            .dispatch(&image, None, |tile: &RgbImage, _: Option<&GrayImage>, _: &TileRequest| {
                Ok(invert(tile))
            })
            .unwrap();
        assert_eq!(result, invert(&image));
    }

    #[test]
    fn test_mask_is_split_in_lockstep() {
        let image = markers(600, 50);
        let mask = GrayImage::from_fn(600, 50, |x, y| Luma([((x + y) % 256) as u8]));
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(2.0).with_target_size(512));

        dispatcher
            .dispatch(&image, Some(&mask), |tile: &RgbImage, aux: Option<&GrayImage>, request: &TileRequest| {
                let aux = aux.expect("mask tile");
                assert_eq!(aux.dimensions(), tile.dimensions());
                assert_eq!(aux.get_pixel(0, 0)[0], (request.rect.x % 256) as u8);
                assert_eq!(request.target_size, 512);
                Ok(tile.clone())
            })
            .unwrap();
    }

    fn threshold(mask: &GrayImage) -> GrayImage {
        GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
            Luma([if mask.get_pixel(x, y)[0] >= 128 { 255 } else { 0 }])
        })
    }

    #[test]
    fn test_aux_is_merged_in_lockstep() {
        let image = markers(1200, 100);
        let mask = GrayImage::from_fn(1200, 100, |x, y| Luma([((x * 7 + y) % 256) as u8]));
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(2.0));
        assert!(dispatcher.plan(1200, 100).unwrap().len() > 1);

        let mut calls = 0;
        let (result, merged_mask) = dispatcher
            .dispatch_with_aux(&image, &mask, |tile: &RgbImage, aux: &GrayImage, _: &TileRequest| {
                calls += 1;
                assert_eq!(aux.dimensions(), tile.dimensions());
                Ok((invert(tile), threshold(aux)))
            })
            .unwrap();

        assert!(calls > 1);
        assert_eq!(result, invert(&image));
        assert_eq!(merged_mask, threshold(&mask));
    }

    #[test]
    fn test_aux_below_threshold_is_returned_directly() {
        let image = markers(100, 100);
        let mask = GrayImage::from_fn(100, 100, |x, _| Luma([x as u8]));
        let dispatcher = dispatcher(DispatchConfig::new());

        let (result, merged_mask) = dispatcher
            .dispatch_with_aux(&image, &mask, |tile: &RgbImage, aux: &GrayImage, request: &TileRequest| {
                assert_eq!(request.total, 1);
                Ok((tile.clone(), threshold(aux)))
            })
            .unwrap();

        assert_eq!(result, image);
        assert_eq!(merged_mask, threshold(&mask));
    }

    #[test]
    fn test_scaled_aux_is_crop_merged() {
        let image = markers(600, 50);
        let mask = GrayImage::from_fn(600, 50, |x, y| Luma([((x + 3 * y) % 256) as u8]));
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(2.0).with_scale(2));

        let (result, merged_mask) = dispatcher
            .dispatch_with_aux(&image, &mask, |tile: &RgbImage, aux: &GrayImage, _: &TileRequest| {
                Ok((upscale(tile, 2), upscale_mask(aux, 2)))
            })
            .unwrap();

        assert_eq!(result, upscale(&image, 2));
        assert_eq!(merged_mask, upscale_mask(&mask, 2));
    }

    #[test]
    fn test_transform_failure_aborts_without_output() {
        let image = markers(500, 100);
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(1.0));
        assert_eq!(dispatcher.plan(500, 100).unwrap().len(), 5);

        let calls = Cell::new(0);
        let result = dispatcher.dispatch(&image, None, |tile: &RgbImage, _: Option<&GrayImage>, request: &TileRequest| {
            calls.set(calls.get() + 1);
            if request.index == 2 {
                anyhow::bail!("inference failed");
            }
            Ok(tile.clone())
        });

        match result {
            Err(TilingError::TransformFailure { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected transform failure, got {:?}", other.map(|i| i.dimensions())),
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_scaled_transform_uses_crop_merge() {
        let image = markers(600, 50);
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(2.0).with_scale(2));

        let result = dispatcher
            .dispatch(&image, None, |tile: &RgbImage, _: Option<&GrayImage>, _: &TileRequest| {
                Ok(upscale(tile, 2))
            })
            .unwrap();
        assert_eq!(result, upscale(&image, 2));
    }

    #[test]
    fn test_grid_dispatch_upscales_seamlessly() {
        let image = markers(150, 100);
        let dispatcher = dispatcher(DispatchConfig::new().with_scale(3).with_grid(64, 8));

        let mut count = 0;
        let result = dispatcher
            .dispatch_grid(&image, None, |tile: &RgbImage, _: Option<&GrayImage>, _: &TileRequest| {
                count += 1;
                Ok(upscale(tile, 3))
            })
            .unwrap();
        assert_eq!(count, 6);
        assert_eq!(result, upscale(&image, 3));
    }

    #[test]
    fn test_wrong_sized_output_is_rejected() {
        let image = markers(400, 100);
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(1.0));

        let result = dispatcher.dispatch(&image, None, |_: &RgbImage, _: Option<&GrayImage>, _: &TileRequest| {
            Ok(RgbImage::new(8, 8))
        });
        assert!(matches!(result, Err(TilingError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_merge_failure_is_reported_to_progress() {
        let errors = Arc::new(AtomicUsize::new(0));
        let sink = errors.clone();
        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(1.0)).with_progress(move |update| {
            if let ProgressUpdate::Error { index: None, .. } = update {
                sink.fetch_add(1, Ordering::Relaxed);
            }
        });

        let image = markers(400, 100);
        let result = dispatcher.dispatch(&image, None, |_: &RgbImage, _: Option<&GrayImage>, _: &TileRequest| {
            Ok(RgbImage::new(8, 8))
        });

        match result {
            Err(error) => assert!(!error.is_internal()),
            Ok(_) => panic!("wrong-sized tiles must not merge"),
        }
        assert_eq!(errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let dispatcher = dispatcher(DispatchConfig::new());
        let identity = |tile: &RgbImage, _: Option<&GrayImage>, _: &TileRequest| -> anyhow::Result<RgbImage> {
            Ok(tile.clone())
        };

        let empty = RgbImage::new(0, 10);
        assert!(matches!(
            dispatcher.dispatch(&empty, None, identity),
            Err(TilingError::DegenerateGeometry { .. })
        ));

        let image = markers(40, 40);
        let mask = GrayImage::new(40, 20);
        assert!(matches!(
            dispatcher.dispatch(&image, Some(&mask), identity),
            Err(TilingError::ShapeMismatch { .. })
        ));

        assert!(SplitDispatcher::new(DispatchConfig::new().with_scale(0)).is_err());
    }

    #[test]
    fn test_progress_reports_every_tile() {
        let started = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let (started_sink, completed_sink) = (started.clone(), completed.clone());

        let dispatcher = dispatcher(DispatchConfig::new().with_split_ratio(1.0)).with_progress(move |update| {
            match update {
                ProgressUpdate::TileStarted { .. } => {
                    started_sink.fetch_add(1, Ordering::Relaxed);
                }
                ProgressUpdate::Completed { tiles_processed, .. } => {
                    completed_sink.store(tiles_processed, Ordering::Relaxed);
                }
                _ => {}
            }
        });

        let image = markers(500, 100);
        dispatcher
            .dispatch(&image, None, |tile: &RgbImage, _: Option<&GrayImage>, _: &TileRequest| {
                Ok(tile.clone())
            })
            .unwrap();

        assert_eq!(started.load(Ordering::Relaxed), 5);
        assert_eq!(completed.load(Ordering::Relaxed), 5);
    }
}
