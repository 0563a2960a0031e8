// Ball possession.
//
// The ball belongs to the player whose nearer bottom bbox corner (either
// foot) is closest to the ball center, provided that distance is under
// the configured maximum. Frames where nobody qualifies inherit the last
// possessing team; leading frames before any possession stay unresolved.

use nalgebra::Point2;
use tracing::debug;

use crate::geometry::{bbox_center, euclidean_distance};
use crate::tracking::{FrameTracks, TrackSet};

/// Player closest to the ball within `max_distance` pixels, measured
/// from the nearer of the bbox's two bottom corners. Strictly-closer
/// comparison, so the lowest id wins exact ties.
pub fn assign_ball_to_player(
    players: &FrameTracks,
    ball_bbox: &[f32; 4],
    max_distance: f32,
) -> Option<u32> {
    let ball = bbox_center(ball_bbox);

    let mut assigned: Option<u32> = None;
    let mut min_distance = f32::MAX;
    for (&player_id, record) in players {
        let bbox = record.bbox;
        let left = euclidean_distance(Point2::new(bbox[0], bbox[3]), ball);
        let right = euclidean_distance(Point2::new(bbox[2], bbox[3]), ball);
        let distance = left.min(right);
        // strict: a player at exactly max_distance does not qualify
        if distance < max_distance && distance < min_distance {
            min_distance = distance;
            assigned = Some(player_id);
        }
    }
    assigned
}

/// Flag the possessing player per frame and return the per-frame team in
/// control. `None` entries are frames before possession is ever
/// established.
pub fn add_ball_possession(tracks: &mut TrackSet, max_distance: f32) -> Vec<Option<u8>> {
    let num_frames = tracks.num_frames();
    let mut control: Vec<Option<u8>> = Vec::with_capacity(num_frames);

    for frame_num in 0..num_frames {
        let assigned = tracks
            .ball_bbox(frame_num)
            .and_then(|bbox| assign_ball_to_player(&tracks.players[frame_num], &bbox, max_distance));

        // a holder without a team keeps the previous team in control
        let carried = control.last().copied().flatten();
        match assigned {
            Some(player_id) => {
                if let Some(record) = tracks.players[frame_num].get_mut(&player_id) {
                    record.has_ball = true;
                    control.push(record.team.or(carried));
                } else {
                    control.push(carried);
                }
            }
            None => control.push(carried),
        }
    }

    let resolved = control.iter().filter(|c| c.is_some()).count();
    debug!(
        frames = num_frames,
        resolved,
        "ball possession assigned"
    );

    control
}
