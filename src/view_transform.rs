// Pixel-to-pitch perspective transform.
//
// A four-point calibration (visible pitch boundary in pixels, matching
// coordinates in meters) defines a homography. Camera-adjusted positions
// inside the calibrated trapezoid are mapped to pitch space; anything
// outside stays untransformed so downstream stages skip it.

use anyhow::{bail, Result};
use nalgebra::{Matrix3, Point2, SMatrix, SVector};
use tracing::debug;

use crate::tracking::TrackSet;
use crate::types::CalibrationConfig;

pub struct ViewTransformer {
    homography: Matrix3<f64>,
    polygon: Vec<Point2<f32>>,
}

impl ViewTransformer {
    pub fn new(calibration: &CalibrationConfig) -> Result<Self> {
        if calibration.pixel_vertices.len() != 4 || calibration.pitch_vertices.len() != 4 {
            bail!(
                "calibration needs exactly 4 vertex pairs, got {} pixel / {} pitch",
                calibration.pixel_vertices.len(),
                calibration.pitch_vertices.len()
            );
        }

        let homography = solve_homography(&calibration.pixel_vertices, &calibration.pitch_vertices)?;
        let polygon = calibration
            .pixel_vertices
            .iter()
            .map(|v| Point2::new(v[0], v[1]))
            .collect();

        Ok(Self {
            homography,
            polygon,
        })
    }

    /// Map a pixel-space point to pitch meters. `None` when the point is
    /// outside the calibrated region or numerically degenerate.
    pub fn transform_point(&self, point: Point2<f32>) -> Option<Point2<f32>> {
        if !in_polygon(&self.polygon, point) {
            return None;
        }
        let v = self.homography * nalgebra::Vector3::new(point.x as f64, point.y as f64, 1.0);
        if v.z.abs() < 1e-7 {
            return None;
        }
        Some(Point2::new((v.x / v.z) as f32, (v.y / v.z) as f32))
    }

    /// Fill `position_transformed` from `position_adjusted` for every
    /// record in every category.
    pub fn add_transformed_positions(&self, tracks: &mut TrackSet) {
        let mut inside = 0usize;
        let mut outside = 0usize;
        for frames in [
            &mut tracks.players,
            &mut tracks.referees,
            &mut tracks.ball,
        ] {
            for frame in frames.iter_mut() {
                for record in frame.values_mut() {
                    record.position_transformed = record
                        .position_adjusted
                        .and_then(|p| self.transform_point(p));
                    match record.position_transformed {
                        Some(_) => inside += 1,
                        None => outside += 1,
                    }
                }
            }
        }
        debug!(inside, outside, "positions transformed to pitch space");
    }
}

/// Direct linear transform for 4 correspondences, h33 fixed to 1. The
/// 8x8 system is solved by LU; a degenerate calibration (collinear
/// points) surfaces as a solve failure.
fn solve_homography(src: &[[f32; 2]], dst: &[[f32; 2]]) -> Result<Matrix3<f64>> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for i in 0..4 {
        let (x, y) = (src[i][0] as f64, src[i][1] as f64);
        let (u, v) = (dst[i][0] as f64, dst[i][1] as f64);
        let (r0, r1) = (2 * i, 2 * i + 1);

        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let h = a
        .lu()
        .solve(&b)
        .ok_or_else(|| anyhow::anyhow!("degenerate calibration, homography solve failed"))?;

    Ok(Matrix3::new(
        h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0,
    ))
}

/// Ray-cast point-in-polygon with an explicit on-edge check, so points
/// exactly on the boundary (the calibration corners included) count as
/// inside.
fn in_polygon(polygon: &[Point2<f32>], p: Point2<f32>) -> bool {
    let n = polygon.len();
    for i in 0..n {
        if on_segment(polygon[i], polygon[(i + 1) % n], p) {
            return true;
        }
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_segment(a: Point2<f32>, b: Point2<f32>, p: Point2<f32>) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if cross.abs() > 1e-3 {
        return false;
    }
    p.x >= a.x.min(b.x) - 1e-3
        && p.x <= a.x.max(b.x) + 1e-3
        && p.y >= a.y.min(b.y) - 1e-3
        && p.y <= a.y.max(b.y) + 1e-3
}
