// Detection-to-track builder.
//
// Converts the external detector's per-frame output into persistent
// per-entity tracks keyed by stable id, split into player / referee /
// ball categories. Later stages only add fields to the records built
// here; nothing removes or renumbers entities.

use std::collections::BTreeMap;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{bbox_center, foot_position};
use crate::types::{ObjectClass, RawDetection};

/// Only one ball is tracked, under a fixed sentinel id.
pub const BALL_TRACK_ID: u32 = 1;

/// Per-frame, per-entity state. Fields other than `bbox` are filled in
/// by later pipeline stages; `None` means the stage could not produce a
/// value for this record and consumers must skip it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackRecord {
    /// [x1, y1, x2, y2] in raw pixel space. Set once, immutable afterward.
    pub bbox: [f32; 4],
    /// Foot position for players/referees, center for the ball.
    pub position: Option<Point2<f32>>,
    /// `position` minus this frame's camera displacement.
    pub position_adjusted: Option<Point2<f32>>,
    /// `position_adjusted` mapped into pitch space (meters); `None` when
    /// the point falls outside the calibrated trapezoid.
    pub position_transformed: Option<Point2<f32>>,
    pub team: Option<u8>,
    pub team_color: Option<[u8; 3]>,
    pub has_ball: bool,
    pub speed_kmh: Option<f32>,
    pub distance_m: Option<f32>,
}

impl TrackRecord {
    pub fn from_bbox(bbox: [f32; 4]) -> Self {
        Self {
            bbox,
            ..Self::default()
        }
    }
}

/// BTreeMap keeps iteration order stable across runs; the possession
/// tie-break depends on it.
pub type FrameTracks = BTreeMap<u32, TrackRecord>;

/// Track collection for one whole clip: one slot per frame per category,
/// empty maps for frames with no detections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackSet {
    pub players: Vec<FrameTracks>,
    pub referees: Vec<FrameTracks>,
    pub ball: Vec<FrameTracks>,
}

impl TrackSet {
    pub fn with_frames(n: usize) -> Self {
        Self {
            players: vec![FrameTracks::new(); n],
            referees: vec![FrameTracks::new(); n],
            ball: vec![FrameTracks::new(); n],
        }
    }

    pub fn num_frames(&self) -> usize {
        self.players.len()
    }

    pub fn ball_bbox(&self, frame: usize) -> Option<[f32; 4]> {
        self.ball
            .get(frame)
            .and_then(|m| m.get(&BALL_TRACK_ID))
            .map(|r| r.bbox)
    }

    /// Unique ids seen in a category across the whole clip.
    pub fn unique_ids(frames: &[FrameTracks]) -> usize {
        let mut ids = std::collections::BTreeSet::new();
        for frame in frames {
            ids.extend(frame.keys().copied());
        }
        ids.len()
    }
}

/// Split raw detections into the three category streams. Goalkeepers are
/// normalized to players; ball detections collapse onto the sentinel id,
/// keeping the highest-confidence box per frame (first one wins ties, so
/// the result is deterministic).
pub fn build(detections_per_frame: &[Vec<RawDetection>]) -> TrackSet {
    let mut tracks = TrackSet::with_frames(detections_per_frame.len());

    for (frame_num, detections) in detections_per_frame.iter().enumerate() {
        let mut best_ball: Option<&RawDetection> = None;

        for det in detections {
            match det.class {
                ObjectClass::Player | ObjectClass::Goalkeeper => {
                    tracks.players[frame_num]
                        .insert(det.track_id, TrackRecord::from_bbox(det.bbox));
                }
                ObjectClass::Referee => {
                    tracks.referees[frame_num]
                        .insert(det.track_id, TrackRecord::from_bbox(det.bbox));
                }
                ObjectClass::Ball => match best_ball {
                    Some(current) if det.confidence <= current.confidence => {}
                    _ => best_ball = Some(det),
                },
            }
        }

        if let Some(ball) = best_ball {
            tracks.ball[frame_num].insert(BALL_TRACK_ID, TrackRecord::from_bbox(ball.bbox));
        }
    }

    debug!(
        frames = tracks.num_frames(),
        players = TrackSet::unique_ids(&tracks.players),
        referees = TrackSet::unique_ids(&tracks.referees),
        "tracks built"
    );

    tracks
}

/// Attach the pixel-space reference point to every record: foot position
/// for players/referees, center for the ball. Pure function of `bbox`.
pub fn add_positions(tracks: &mut TrackSet) {
    for frame in tracks.players.iter_mut().chain(tracks.referees.iter_mut()) {
        for record in frame.values_mut() {
            record.position = Some(foot_position(&record.bbox));
        }
    }
    for frame in tracks.ball.iter_mut() {
        for record in frame.values_mut() {
            record.position = Some(bbox_center(&record.bbox));
        }
    }
}

/// Fill ball gaps by linear interpolation of the bbox between the two
/// nearest detected frames. Frames before the first detection or after
/// the last stay missing; a ball-free clip stays all-missing.
pub fn interpolate_ball(ball: &[FrameTracks]) -> Vec<FrameTracks> {
    let known: Vec<(usize, [f32; 4])> = ball
        .iter()
        .enumerate()
        .filter_map(|(i, m)| m.get(&BALL_TRACK_ID).map(|r| (i, r.bbox)))
        .collect();

    let mut out = ball.to_vec();

    for pair in known.windows(2) {
        let (f0, b0) = pair[0];
        let (f1, b1) = pair[1];
        for frame in f0 + 1..f1 {
            let t = (frame - f0) as f32 / (f1 - f0) as f32;
            let mut bbox = [0.0f32; 4];
            for (k, v) in bbox.iter_mut().enumerate() {
                *v = b0[k] + (b1[k] - b0[k]) * t;
            }
            out[frame].insert(BALL_TRACK_ID, TrackRecord::from_bbox(bbox));
        }
    }

    let filled = out.iter().filter(|m| !m.is_empty()).count();
    debug!(
        detected = known.len(),
        interpolated = filled.saturating_sub(known.len()),
        "ball gaps interpolated"
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class: ObjectClass, id: u32, bbox: [f32; 4], confidence: f32) -> RawDetection {
        RawDetection {
            bbox,
            class,
            track_id: id,
            confidence,
        }
    }

    #[test]
    fn test_build_splits_categories_and_normalizes_goalkeeper() {
        let frames = vec![vec![
            det(ObjectClass::Player, 7, [0.0, 0.0, 10.0, 20.0], 0.9),
            det(ObjectClass::Goalkeeper, 3, [5.0, 0.0, 15.0, 20.0], 0.8),
            det(ObjectClass::Referee, 12, [20.0, 0.0, 30.0, 20.0], 0.7),
            det(ObjectClass::Ball, 55, [40.0, 0.0, 44.0, 4.0], 0.6),
        ]];
        let tracks = build(&frames);

        assert_eq!(tracks.num_frames(), 1);
        assert!(tracks.players[0].contains_key(&7));
        assert!(tracks.players[0].contains_key(&3), "goalkeeper is a player");
        assert!(tracks.referees[0].contains_key(&12));
        assert!(tracks.ball[0].contains_key(&BALL_TRACK_ID));
        assert!(!tracks.ball[0].contains_key(&55));
    }

    #[test]
    fn test_build_keeps_highest_confidence_ball() {
        let frames = vec![vec![
            det(ObjectClass::Ball, 1, [0.0, 0.0, 4.0, 4.0], 0.3),
            det(ObjectClass::Ball, 2, [10.0, 0.0, 14.0, 4.0], 0.8),
            det(ObjectClass::Ball, 3, [20.0, 0.0, 24.0, 4.0], 0.8),
        ]];
        let tracks = build(&frames);
        // 0.8 beats 0.3; the first 0.8 wins the tie.
        assert_eq!(tracks.ball_bbox(0).unwrap(), [10.0, 0.0, 14.0, 4.0]);
    }

    #[test]
    fn test_build_leaves_empty_frames_in_place() {
        let frames = vec![
            vec![],
            vec![det(ObjectClass::Player, 1, [0.0, 0.0, 1.0, 1.0], 0.5)],
            vec![],
        ];
        let tracks = build(&frames);
        assert_eq!(tracks.num_frames(), 3);
        assert!(tracks.players[0].is_empty());
        assert!(tracks.players[2].is_empty());
    }

    #[test]
    fn test_add_positions() {
        let frames = vec![vec![
            det(ObjectClass::Player, 1, [10.0, 20.0, 30.0, 60.0], 0.9),
            det(ObjectClass::Ball, 1, [0.0, 0.0, 4.0, 4.0], 0.9),
        ]];
        let mut tracks = build(&frames);
        add_positions(&mut tracks);

        let player = &tracks.players[0][&1];
        assert_eq!(player.position.unwrap(), Point2::new(20.0, 60.0));
        let ball = &tracks.ball[0][&BALL_TRACK_ID];
        assert_eq!(ball.position.unwrap(), Point2::new(2.0, 2.0));
    }

    #[test]
    fn test_interpolate_ball_fills_interior_gaps_only() {
        let mut ball = vec![FrameTracks::new(); 10];
        ball[2].insert(BALL_TRACK_ID, TrackRecord::from_bbox([10.0, 10.0, 20.0, 20.0]));
        ball[8].insert(BALL_TRACK_ID, TrackRecord::from_bbox([40.0, 10.0, 50.0, 20.0]));

        let out = interpolate_ball(&ball);

        // No extrapolation outside the detected span.
        assert!(out[0].is_empty());
        assert!(out[1].is_empty());
        assert!(out[9].is_empty());

        // Strictly monotonic linear interpolants in between.
        let mut prev_x = 10.0;
        for frame in 3..8 {
            let bbox = out[frame][&BALL_TRACK_ID].bbox;
            assert!(bbox[0] > prev_x, "x1 must increase at frame {frame}");
            prev_x = bbox[0];
            assert_eq!(bbox[1], 10.0);
            assert_eq!(bbox[3], 20.0);
        }
        assert_eq!(out[5][&BALL_TRACK_ID].bbox, [25.0, 10.0, 35.0, 20.0]);
    }

    #[test]
    fn test_interpolate_ball_free_clip_stays_missing() {
        let ball = vec![FrameTracks::new(); 5];
        let out = interpolate_ball(&ball);
        assert!(out.iter().all(|m| m.is_empty()));
    }
}
