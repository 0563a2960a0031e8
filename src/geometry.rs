// Bounding-box and point helpers shared by every pipeline stage.
//
// Bboxes are [x1, y1, x2, y2] in raw pixel space, top-left origin.

use nalgebra::Point2;

/// Geometric center of a bbox.
#[inline]
pub fn bbox_center(bbox: &[f32; 4]) -> Point2<f32> {
    Point2::new((bbox[0] + bbox[2]) / 2.0, (bbox[1] + bbox[3]) / 2.0)
}

#[inline]
pub fn bbox_width(bbox: &[f32; 4]) -> f32 {
    bbox[2] - bbox[0]
}

/// Reference point for players and referees: center of the bottom edge.
#[inline]
pub fn foot_position(bbox: &[f32; 4]) -> Point2<f32> {
    Point2::new((bbox[0] + bbox[2]) / 2.0, bbox[3])
}

#[inline]
pub fn euclidean_distance(a: Point2<f32>, b: Point2<f32>) -> f32 {
    (a - b).norm()
}

/// Signed per-axis offsets from `b` to `a`: positive dx means `a` is to
/// the right of `b`, positive dy means `a` is below `b`.
#[inline]
pub fn xy_distance(a: Point2<f32>, b: Point2<f32>) -> (f32, f32) {
    (a.x - b.x, a.y - b.y)
}
