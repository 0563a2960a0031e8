// Camera movement estimation.
//
// Broadcast cameras pan to follow play; apparent player motion mixes
// true on-pitch displacement with camera motion. This stage estimates a
// per-frame (dx, dy) camera displacement from sparse flow on background
// features and subtracts it from every tracked position.
//
// Feature points are corner-like pixels restricted to configured margin
// bands (regions unlikely to contain players) and re-seeded from the
// current frame every frame, so drift accumulates only in the
// displacement sequence, never in the feature set. Flow is a SAD block
// match per feature against the previous frame.

use nalgebra::Vector2;
use tracing::debug;

use crate::tracking::TrackSet;
use crate::types::{CameraMovementConfig, RgbFrame};

/// Grayscale frame, row-major, pixel at (x, y) = data[y * width + x].
#[derive(Clone)]
pub struct GrayFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl GrayFrame {
    pub fn from_rgb(frame: &RgbFrame) -> Self {
        let mut gray = Vec::with_capacity(frame.width * frame.height);
        for pixel in frame.data.chunks_exact(3) {
            // ITU-R BT.601 luma
            let g = (0.299 * pixel[0] as f32
                + 0.587 * pixel[1] as f32
                + 0.114 * pixel[2] as f32) as u8;
            gray.push(g);
        }
        Self {
            data: gray,
            width: frame.width,
            height: frame.height,
        }
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Reduces per-feature flow vectors to one camera displacement per frame.
///
/// The compatible default keeps the single largest vector; the trait
/// exists so a robust average can replace it without touching the
/// pipeline.
pub trait FlowAggregator {
    fn aggregate(&self, flows: &[Vector2<f32>]) -> Vector2<f32>;
}

/// Take the largest-magnitude flow vector; if even that is below the
/// minimum distance, assume the camera did not move this frame.
pub struct LargestDisplacement {
    pub min_distance: f32,
}

impl FlowAggregator for LargestDisplacement {
    fn aggregate(&self, flows: &[Vector2<f32>]) -> Vector2<f32> {
        let mut best = Vector2::zeros();
        let mut best_norm = 0.0f32;
        for flow in flows {
            let norm = flow.norm();
            if norm > best_norm {
                best_norm = norm;
                best = *flow;
            }
        }
        if best_norm > self.min_distance {
            best
        } else {
            Vector2::zeros()
        }
    }
}

pub struct CameraMovementEstimator {
    config: CameraMovementConfig,
    aggregator: Box<dyn FlowAggregator>,
}

impl CameraMovementEstimator {
    pub fn new(config: CameraMovementConfig) -> Self {
        let aggregator = Box::new(LargestDisplacement {
            min_distance: config.min_distance,
        });
        Self { config, aggregator }
    }

    pub fn with_aggregator(config: CameraMovementConfig, aggregator: Box<dyn FlowAggregator>) -> Self {
        Self { config, aggregator }
    }

    /// Per-frame camera displacement, frame i holding the motion from
    /// frame i-1 to frame i. Frame 0 is (0, 0) by convention.
    pub fn estimate(&self, frames: &[RgbFrame]) -> Vec<Vector2<f32>> {
        let mut movement = vec![Vector2::zeros(); frames.len()];
        if frames.len() < 2 {
            return movement;
        }

        let mut prev = GrayFrame::from_rgb(&frames[0]);
        let mut features = self.select_features(&prev);

        for frame_num in 1..frames.len() {
            let current = GrayFrame::from_rgb(&frames[frame_num]);

            let flows: Vec<Vector2<f32>> = features
                .iter()
                .filter_map(|&(x, y)| {
                    self.track_feature(&prev, &current, x, y).map(|(dx, dy)| {
                        // old minus new: a scene shift left means the
                        // camera panned right.
                        Vector2::new(-(dx as f32), -(dy as f32))
                    })
                })
                .collect();

            movement[frame_num] = self.aggregator.aggregate(&flows);
            debug!(
                frame = frame_num,
                features = features.len(),
                dx = movement[frame_num].x,
                dy = movement[frame_num].y,
                "camera displacement"
            );

            features = self.select_features(&current);
            prev = current;
        }

        movement
    }

    /// Shi-Tomasi style corner picking inside the mask bands: minimum
    /// eigenvalue of the gradient structure tensor, quality-relative
    /// threshold, greedy minimum-spacing suppression.
    fn select_features(&self, gray: &GrayFrame) -> Vec<(usize, usize)> {
        let win = self.config.corner_window;
        let margin = win + 1;
        if gray.width <= 2 * margin || gray.height <= 2 * margin {
            return Vec::new();
        }

        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for band in &self.config.mask_bands {
            let x_start = band[0].max(margin);
            let x_end = band[1].min(gray.width - margin);
            for y in margin..gray.height - margin {
                for x in x_start..x_end {
                    let score = corner_score(gray, x, y, win);
                    if score > 0.0 {
                        candidates.push((score, x, y));
                    }
                }
            }
        }

        if candidates.is_empty() {
            return Vec::new();
        }

        let max_score = candidates
            .iter()
            .map(|c| c.0)
            .fold(0.0f32, f32::max);
        let threshold = max_score * self.config.quality_level;
        candidates.retain(|c| c.0 >= threshold);
        candidates.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (a.2, a.1).cmp(&(b.2, b.1)))
        });

        let min_spacing_sq = (self.config.min_feature_spacing * self.config.min_feature_spacing) as i64;
        let mut picked: Vec<(usize, usize)> = Vec::new();
        for (_, x, y) in candidates {
            if picked.len() >= self.config.max_features {
                break;
            }
            let far_enough = picked.iter().all(|&(px, py)| {
                let dx = px as i64 - x as i64;
                let dy = py as i64 - y as i64;
                dx * dx + dy * dy >= min_spacing_sq
            });
            if far_enough {
                picked.push((x, y));
            }
        }
        picked
    }

    /// Best SAD match of the patch around (fx, fy) in `prev` within the
    /// search radius in `current`. Returns (dx, dy), new minus old.
    fn track_feature(
        &self,
        prev: &GrayFrame,
        current: &GrayFrame,
        fx: usize,
        fy: usize,
    ) -> Option<(i32, i32)> {
        let patch = self.config.patch_radius as i32;
        let radius = self.config.search_radius as i32;
        let (w, h) = (prev.width as i32, prev.height as i32);
        let (fx, fy) = (fx as i32, fy as i32);

        if fx - patch < 0 || fy - patch < 0 || fx + patch >= w || fy + patch >= h {
            return None;
        }

        let mut best_sad = u32::MAX;
        let mut best = (0i32, 0i32);
        for dy in -radius..=radius {
            let cy = fy + dy;
            if cy - patch < 0 || cy + patch >= h {
                continue;
            }
            for dx in -radius..=radius {
                let cx = fx + dx;
                if cx - patch < 0 || cx + patch >= w {
                    continue;
                }
                let sad = sad_patch(prev, current, fx, fy, cx, cy, patch);
                if sad < best_sad {
                    best_sad = sad;
                    best = (dx, dy);
                }
            }
        }

        if best_sad == u32::MAX {
            None
        } else {
            Some(best)
        }
    }
}

/// Minimum eigenvalue of the gradient structure tensor over a
/// (2*win+1)² window, central differences.
fn corner_score(gray: &GrayFrame, x: usize, y: usize, win: usize) -> f32 {
    let mut ixx = 0.0f32;
    let mut iyy = 0.0f32;
    let mut ixy = 0.0f32;
    let win = win as i32;
    for dy in -win..=win {
        for dx in -win..=win {
            let px = (x as i32 + dx) as usize;
            let py = (y as i32 + dy) as usize;
            let gx = (gray.pixel(px + 1, py) as f32 - gray.pixel(px - 1, py) as f32) / 2.0;
            let gy = (gray.pixel(px, py + 1) as f32 - gray.pixel(px, py - 1) as f32) / 2.0;
            ixx += gx * gx;
            iyy += gy * gy;
            ixy += gx * gy;
        }
    }
    let trace = ixx + iyy;
    let diff = ixx - iyy;
    0.5 * (trace - (diff * diff + 4.0 * ixy * ixy).sqrt())
}

/// Sum of absolute differences between the patch at (fx, fy) in `a` and
/// the patch at (cx, cy) in `b`.
#[inline]
fn sad_patch(a: &GrayFrame, b: &GrayFrame, fx: i32, fy: i32, cx: i32, cy: i32, patch: i32) -> u32 {
    let mut sum = 0u32;
    for dy in -patch..=patch {
        for dx in -patch..=patch {
            let pa = a.pixel((fx + dx) as usize, (fy + dy) as usize) as i32;
            let pb = b.pixel((cx + dx) as usize, (cy + dy) as usize) as i32;
            sum += (pa - pb).unsigned_abs();
        }
    }
    sum
}

/// `position_adjusted = position - camera_movement[frame]` for every
/// record in every category.
pub fn add_adjusted_positions(tracks: &mut TrackSet, movement: &[Vector2<f32>]) {
    for frames in [
        &mut tracks.players,
        &mut tracks.referees,
        &mut tracks.ball,
    ] {
        for (frame_num, frame) in frames.iter_mut().enumerate() {
            let shift = movement.get(frame_num).copied().unwrap_or_else(Vector2::zeros);
            for record in frame.values_mut() {
                record.position_adjusted = record.position.map(|p| p - shift);
            }
        }
    }
}
