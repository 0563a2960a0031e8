// Speed and cumulative distance over pitch-space positions.
//
// Positions are sampled every `window` frames; the straight-line
// distance between window endpoints gives an average speed stamped onto
// every frame of the window. Players and referees get speeds; the ball
// is excluded. A window is skipped when either endpoint has no
// pitch-space position.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::geometry::euclidean_distance;
use crate::tracking::{FrameTracks, TrackSet};

const MPS_TO_KMH: f32 = 3.6;

pub fn add_speed_and_distance(tracks: &mut TrackSet, window: usize, frame_rate: f32) {
    if window == 0 || frame_rate <= 0.0 {
        warn!(window, frame_rate, "invalid speed parameters, stage skipped");
        return;
    }

    let players = stamp_category(&mut tracks.players, window, frame_rate);
    let referees = stamp_category(&mut tracks.referees, window, frame_rate);
    debug!(players, referees, "speed and distance computed");
}

/// Windowed speed/distance over one category's frames. Returns the
/// number of entities that received at least one window.
fn stamp_category(frames: &mut [FrameTracks], window: usize, frame_rate: f32) -> usize {
    let num_frames = frames.len();
    if num_frames == 0 {
        return 0;
    }

    let mut total_distance: BTreeMap<u32, f32> = BTreeMap::new();

    let mut frame_num = 0;
    while frame_num < num_frames {
        let last_frame = (frame_num + window).min(num_frames - 1);
        if last_frame == frame_num {
            break;
        }

        let ids: Vec<u32> = frames[frame_num].keys().copied().collect();
        for id in ids {
            let start = frames[frame_num]
                .get(&id)
                .and_then(|r| r.position_transformed);
            let end = frames[last_frame]
                .get(&id)
                .and_then(|r| r.position_transformed);
            let (start, end) = match (start, end) {
                (Some(s), Some(e)) => (s, e),
                _ => continue,
            };

            let distance = euclidean_distance(start, end);
            let elapsed = (last_frame - frame_num) as f32 / frame_rate;
            let speed_kmh = distance / elapsed * MPS_TO_KMH;

            let total = total_distance.entry(id).or_insert(0.0);
            *total += distance;
            let total = *total;

            for f in frame_num..=last_frame {
                if let Some(record) = frames[f].get_mut(&id) {
                    record.speed_kmh = Some(speed_kmh);
                    record.distance_m = Some(total);
                }
            }
        }

        frame_num += window;
    }

    total_distance.len()
}

/// Total distance covered per player over the whole clip, read back from
/// the last stamped record of each track.
pub fn total_distances(tracks: &TrackSet) -> BTreeMap<u32, f32> {
    let mut totals = BTreeMap::new();
    for frame in &tracks.players {
        for (&id, record) in frame {
            if let Some(d) = record.distance_m {
                let entry = totals.entry(id).or_insert(0.0f32);
                if d > *entry {
                    *entry = d;
                }
            }
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::TrackRecord;
    use nalgebra::Point2;

    /// One player moving 1 m per frame along x.
    fn constant_velocity_tracks(frames: usize) -> TrackSet {
        let mut tracks = TrackSet::with_frames(frames);
        for f in 0..frames {
            let mut record = TrackRecord::from_bbox([0.0; 4]);
            record.position_transformed = Some(Point2::new(f as f32, 0.0));
            tracks.players[f].insert(10, record);
        }
        tracks
    }

    #[test]
    fn test_constant_velocity_speed_and_distance() {
        let mut tracks = constant_velocity_tracks(10);
        add_speed_and_distance(&mut tracks, 5, 10.0);

        // 1 m/frame at 10 fps is 10 m/s, 36 km/h, in both windows.
        for f in 0..10 {
            let speed = tracks.players[f][&10].speed_kmh.unwrap();
            assert!((speed - 36.0).abs() < 1e-3, "speed at frame {f}: {speed}");
        }

        // First window covers 5 m, the truncated second one 4 more.
        assert!((tracks.players[4][&10].distance_m.unwrap() - 5.0).abs() < 1e-3);
        assert!((tracks.players[9][&10].distance_m.unwrap() - 9.0).abs() < 1e-3);
        assert!((total_distances(&tracks)[&10] - 9.0).abs() < 1e-3);
    }

    #[test]
    fn test_missing_transformed_position_skips_window() {
        let mut tracks = constant_velocity_tracks(10);
        tracks.players[5].get_mut(&10).unwrap().position_transformed = None;
        add_speed_and_distance(&mut tracks, 5, 10.0);

        // Both windows end or start at frame 5, so nothing is stamped.
        assert!(tracks.players[0][&10].speed_kmh.is_none());
        assert!(tracks.players[9][&10].speed_kmh.is_none());
    }

    #[test]
    fn test_player_absent_at_window_end_is_skipped() {
        let mut tracks = constant_velocity_tracks(10);
        tracks.players[5].remove(&10);
        add_speed_and_distance(&mut tracks, 5, 10.0);
        assert!(tracks.players[0][&10].speed_kmh.is_none());
    }

    #[test]
    fn test_referees_get_speeds_like_players() {
        let mut tracks = TrackSet::with_frames(10);
        for f in 0..10 {
            let mut record = TrackRecord::from_bbox([0.0; 4]);
            record.position_transformed = Some(Point2::new(f as f32, 0.0));
            tracks.referees[f].insert(3, record);
        }
        add_speed_and_distance(&mut tracks, 5, 10.0);

        let speed = tracks.referees[0][&3].speed_kmh.unwrap();
        assert!((speed - 36.0).abs() < 1e-3, "referee speed: {speed}");
        assert!((tracks.referees[9][&3].distance_m.unwrap() - 9.0).abs() < 1e-3);
    }

    #[test]
    fn test_ball_gets_no_speed() {
        let mut tracks = TrackSet::with_frames(6);
        for f in 0..6 {
            let mut record = TrackRecord::from_bbox([0.0; 4]);
            record.position_transformed = Some(Point2::new(f as f32, 0.0));
            tracks.ball[f].insert(crate::tracking::BALL_TRACK_ID, record);
        }
        add_speed_and_distance(&mut tracks, 5, 10.0);
        assert!(tracks.ball[0][&crate::tracking::BALL_TRACK_ID]
            .speed_kmh
            .is_none());
    }

    #[test]
    fn test_degenerate_parameters_do_not_panic() {
        let mut tracks = constant_velocity_tracks(3);
        add_speed_and_distance(&mut tracks, 0, 10.0);
        add_speed_and_distance(&mut tracks, 5, 0.0);
        let mut empty = TrackSet::with_frames(0);
        add_speed_and_distance(&mut empty, 5, 10.0);
        assert!(tracks.players[0][&10].speed_kmh.is_none());
    }
}
