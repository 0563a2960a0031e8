// Stage wiring.
//
// Runs the whole analysis in a fixed order: tracks from detections,
// ball interpolation, reference positions, camera-movement adjustment,
// pitch-space transform, speed/distance, team assignment, ball
// possession, annotation. Each stage only adds fields to the track
// records, so the order is the only coupling between them.

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Result};
use nalgebra::Vector2;
use tracing::{info, warn};

use crate::annotation;
use crate::ball_assignment;
use crate::camera_movement::{self, CameraMovementEstimator};
use crate::speed_distance;
use crate::stub_cache::{self, StubData};
use crate::team_assignment::TeamAssigner;
use crate::tracking::{self, TrackSet};
use crate::types::{Config, RawDetection, RgbFrame};
use crate::video_io;
use crate::view_transform::ViewTransformer;

pub struct Analysis {
    pub tracks: TrackSet,
    pub camera_movement: Vec<Vector2<f32>>,
    pub team_control: Vec<Option<u8>>,
    pub annotated: Vec<RgbFrame>,
    pub stub_used: bool,
}

#[derive(Debug)]
pub struct PipelineStats {
    pub frames: usize,
    pub players: usize,
    pub referees: usize,
    pub ball_frames: usize,
    pub team1_control_pct: f32,
    pub team2_control_pct: f32,
    pub stub_used: bool,
    pub elapsed_secs: f32,
}

/// Full file-to-file run: read frames and detections, analyze, write the
/// annotated clip.
pub fn run(config: &Config) -> Result<PipelineStats> {
    let started = Instant::now();

    let frames = video_io::read_frames(Path::new(&config.video.input_dir))?;
    let detections = video_io::read_detections(Path::new(&config.video.detections_path))?;
    let analysis = analyze(config, &frames, &detections)?;
    video_io::write_frames(Path::new(&config.video.output_dir), &analysis.annotated)?;

    let last_frame = analysis.team_control.len().saturating_sub(1);
    let (team1, team2) =
        annotation::control_percentages(&analysis.team_control, last_frame).unwrap_or((0.0, 0.0));

    let stats = PipelineStats {
        frames: frames.len(),
        players: TrackSet::unique_ids(&analysis.tracks.players),
        referees: TrackSet::unique_ids(&analysis.tracks.referees),
        ball_frames: analysis
            .tracks
            .ball
            .iter()
            .filter(|m| !m.is_empty())
            .count(),
        team1_control_pct: team1,
        team2_control_pct: team2,
        stub_used: analysis.stub_used,
        elapsed_secs: started.elapsed().as_secs_f32(),
    };

    info!(
        frames = stats.frames,
        players = stats.players,
        referees = stats.referees,
        ball_frames = stats.ball_frames,
        team1_control_pct = stats.team1_control_pct,
        team2_control_pct = stats.team2_control_pct,
        stub_used = stats.stub_used,
        elapsed_secs = stats.elapsed_secs,
        "analysis complete"
    );

    Ok(stats)
}

/// In-memory analysis over already-loaded frames and detections.
pub fn analyze(
    config: &Config,
    frames: &[RgbFrame],
    detections: &[Vec<RawDetection>],
) -> Result<Analysis> {
    if frames.len() != detections.len() {
        bail!(
            "frame/detection count mismatch: {} frames vs {} detection lists",
            frames.len(),
            detections.len()
        );
    }

    let stub_path = config.cache.stub_path.as_deref().map(Path::new);
    let cached = match stub_path {
        Some(path) => stub_cache::load(path, frames.len())?,
        None => None,
    };
    let stub_used = cached.is_some();

    let (mut tracks, movement) = match cached {
        Some(stub) => (stub.tracks, stub.camera_movement),
        None => {
            let mut tracks = tracking::build(detections);
            tracks.ball = tracking::interpolate_ball(&tracks.ball);
            tracking::add_positions(&mut tracks);

            let estimator = CameraMovementEstimator::new(config.camera_movement.clone());
            let movement = estimator.estimate(frames);

            if config.cache.write_stub {
                if let Some(path) = stub_path {
                    stub_cache::save(
                        path,
                        &StubData {
                            num_frames: frames.len(),
                            tracks: tracks.clone(),
                            camera_movement: movement.clone(),
                        },
                    )?;
                }
            }
            (tracks, movement)
        }
    };

    camera_movement::add_adjusted_positions(&mut tracks, &movement);

    let transformer = ViewTransformer::new(&config.calibration)?;
    transformer.add_transformed_positions(&mut tracks);

    speed_distance::add_speed_and_distance(
        &mut tracks,
        config.speed.window,
        config.video.frame_rate,
    );

    let mut assigner = TeamAssigner::new(config.team.clone());
    if let Err(e) = assigner.assign(frames, &mut tracks) {
        warn!(error = %e, "team assignment skipped");
    }

    let team_control =
        ball_assignment::add_ball_possession(&mut tracks, config.possession.max_ball_distance);

    let annotated = annotation::draw_annotations(frames, &tracks, &team_control, &movement);

    Ok(Analysis {
        tracks,
        camera_movement: movement,
        team_control,
        annotated,
        stub_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CalibrationConfig, CameraMovementConfig, ObjectClass, SpeedConfig, VideoConfig,
    };

    const PITCH: [u8; 3] = [30, 120, 30];
    const RED: [u8; 3] = [200, 20, 20];
    const BLUE: [u8; 3] = [20, 20, 200];

    /// 200x200 clip, 0.1 m per pixel: player 10 (red) moves 10 px per
    /// frame, player 20 (blue) stands still, the ball hugs player 10's
    /// feet and drops out on frame 5.
    fn synthetic_clip(frames: usize) -> (Vec<RgbFrame>, Vec<Vec<RawDetection>>) {
        let mut clip = Vec::new();
        let mut detections = Vec::new();

        for f in 0..frames {
            let fx = 10.0 * f as f32;
            let bbox_a = [20.0 + fx, 20.0, 40.0 + fx, 100.0];
            let bbox_b = [150.0, 120.0, 170.0, 190.0];
            let ball = [26.0 + fx, 96.0, 34.0 + fx, 104.0];

            let mut frame = RgbFrame::filled(200, 200, PITCH);
            draw_jersey(&mut frame, &bbox_a, RED);
            draw_jersey(&mut frame, &bbox_b, BLUE);

            let mut dets = vec![
                RawDetection {
                    bbox: bbox_a,
                    class: ObjectClass::Player,
                    track_id: 10,
                    confidence: 0.9,
                },
                RawDetection {
                    bbox: bbox_b,
                    class: ObjectClass::Player,
                    track_id: 20,
                    confidence: 0.9,
                },
            ];
            if f != 5 {
                dets.push(RawDetection {
                    bbox: ball,
                    class: ObjectClass::Ball,
                    track_id: 99,
                    confidence: 0.8,
                });
            }

            clip.push(frame);
            detections.push(dets);
        }

        (clip, detections)
    }

    fn draw_jersey(frame: &mut RgbFrame, bbox: &[f32; 4], color: [u8; 3]) {
        let (x1, y1, x2) = (bbox[0] as usize, bbox[1] as usize, bbox[2] as usize);
        let half = y1 + ((bbox[3] as usize) - y1) / 2;
        for y in y1 + 2..half.saturating_sub(2) {
            for x in x1 + 2..x2.saturating_sub(2) {
                frame.set_pixel(x, y, color);
            }
        }
    }

    fn test_config() -> Config {
        Config {
            video: VideoConfig {
                frame_rate: 10.0,
                ..VideoConfig::default()
            },
            camera_movement: CameraMovementConfig {
                // static margin only, away from both players
                mask_bands: vec![[0, 10]],
                ..CameraMovementConfig::default()
            },
            calibration: CalibrationConfig {
                pixel_vertices: vec![[0.0, 0.0], [200.0, 0.0], [200.0, 200.0], [0.0, 200.0]],
                pitch_vertices: vec![[0.0, 0.0], [20.0, 0.0], [20.0, 20.0], [0.0, 20.0]],
            },
            speed: SpeedConfig { window: 5 },
            ..Config::default()
        }
    }

    #[test]
    fn test_end_to_end_synthetic_clip() {
        let (frames, detections) = synthetic_clip(10);
        let analysis = analyze(&test_config(), &frames, &detections).unwrap();

        // Flat background in the feature band, so no camera motion.
        assert!(analysis
            .camera_movement
            .iter()
            .all(|m| *m == Vector2::zeros()));

        // Ball gap at frame 5 is interpolated away.
        assert!(analysis.tracks.ball.iter().all(|m| !m.is_empty()));

        // Opposing jerseys land on opposite teams.
        let team_a = analysis.tracks.players[0][&10].team.unwrap();
        let team_b = analysis.tracks.players[0][&20].team.unwrap();
        assert_ne!(team_a, team_b);

        // The moving player covers 1 m per frame at 10 fps: 36 km/h.
        for f in 0..10 {
            let speed = analysis.tracks.players[f][&10].speed_kmh.unwrap();
            assert!((speed - 36.0).abs() < 0.5, "frame {f}: {speed} km/h");
            let still = analysis.tracks.players[f][&20].speed_kmh.unwrap();
            assert!(still.abs() < 0.5, "frame {f}: standing player moved");
        }
        let total = analysis.tracks.players[9][&10].distance_m.unwrap();
        assert!((total - 9.0).abs() < 0.2, "total distance {total}");

        // The ball never leaves player 10's feet.
        assert!(analysis.tracks.players[3][&10].has_ball);
        assert!(analysis
            .team_control
            .iter()
            .all(|c| *c == Some(team_a)));

        assert_eq!(analysis.annotated.len(), 10);
        assert!(!analysis.stub_used);
    }

    #[test]
    fn test_mismatched_inputs_are_rejected() {
        let (frames, mut detections) = synthetic_clip(4);
        detections.pop();
        assert!(analyze(&test_config(), &frames, &detections).is_err());
    }

    #[test]
    fn test_second_run_uses_stub() {
        let stub = std::env::temp_dir().join(format!(
            "pitchtrack-pipeline-stub-{}.json",
            std::process::id()
        ));
        let mut config = test_config();
        config.cache.stub_path = Some(stub.to_string_lossy().into_owned());
        config.cache.write_stub = true;

        let (frames, detections) = synthetic_clip(10);
        let first = analyze(&config, &frames, &detections).unwrap();
        let second = analyze(&config, &frames, &detections).unwrap();

        assert!(!first.stub_used);
        assert!(second.stub_used);
        assert_eq!(
            second.tracks.players[9][&10].distance_m,
            first.tracks.players[9][&10].distance_m
        );

        std::fs::remove_file(&stub).unwrap();
    }
}
