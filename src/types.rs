use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub video: VideoConfig,
    pub camera_movement: CameraMovementConfig,
    pub calibration: CalibrationConfig,
    pub speed: SpeedConfig,
    pub possession: PossessionConfig,
    pub team: TeamConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub detections_path: String,
    pub frame_rate: f32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "input_frames".to_string(),
            output_dir: "output_frames".to_string(),
            detections_path: "detections.json".to_string(),
            frame_rate: 24.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraMovementConfig {
    /// Minimum flow magnitude (px) for a frame to count as camera motion.
    pub min_distance: f32,
    /// Maximum number of feature points tracked per frame.
    pub max_features: usize,
    /// Corner score threshold relative to the strongest corner [0, 1].
    pub quality_level: f32,
    /// Minimum pixel spacing between selected features.
    pub min_feature_spacing: usize,
    /// Half-size of the corner-response window.
    pub corner_window: usize,
    /// Half-size of the SAD matching patch.
    pub patch_radius: usize,
    /// Maximum displacement searched per feature (±px, both axes).
    pub search_radius: usize,
    /// Vertical image bands [x_start, x_end) where features may be picked.
    /// Restricted to static margins so players do not pollute the flow.
    pub mask_bands: Vec<[usize; 2]>,
}

impl Default for CameraMovementConfig {
    fn default() -> Self {
        Self {
            min_distance: 5.0,
            max_features: 100,
            quality_level: 0.3,
            min_feature_spacing: 3,
            corner_window: 3,
            patch_radius: 3,
            search_radius: 12,
            mask_bands: vec![[0, 20], [900, 1050]],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Source quadrilateral in pixel space (visible pitch boundary).
    pub pixel_vertices: Vec<[f32; 2]>,
    /// Matching pitch-space coordinates in meters.
    pub pitch_vertices: Vec<[f32; 2]>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            pixel_vertices: vec![
                [110.0, 1035.0],
                [265.0, 275.0],
                [910.0, 260.0],
                [1700.0, 915.0],
            ],
            pitch_vertices: vec![[0.0, 68.0], [0.0, 0.0], [23.32, 0.0], [23.32, 68.0]],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedConfig {
    /// Number of frames per speed/distance window.
    pub window: usize,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self { window: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PossessionConfig {
    /// Maximum foot-to-ball distance (px) for a player to claim the ball.
    pub max_ball_distance: f32,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            max_ball_distance: 70.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    pub kmeans_max_iters: usize,
    /// Operator workaround for misclassified goalkeepers: these ids skip
    /// jersey classification entirely.
    pub overrides: Vec<TeamOverride>,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            kmeans_max_iters: 20,
            overrides: vec![
                TeamOverride {
                    player_id: 78,
                    team: 2,
                },
                TeamOverride {
                    player_id: 188,
                    team: 1,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TeamOverride {
    pub player_id: u32,
    pub team: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Precomputed tracks + camera movement blob; recomputed when absent
    /// or incompatible.
    pub stub_path: Option<String>,
    #[serde(default)]
    pub write_stub: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Decoded video frame, packed RGB (3 bytes per pixel, row-major).
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl RgbFrame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height * 3);
        Self {
            data,
            width,
            height,
        }
    }

    /// Uniform-color frame, mostly useful in tests.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y * self.width + x) * 3;
        self.data[idx] = rgb[0];
        self.data[idx + 1] = rgb[1];
        self.data[idx + 2] = rgb[2];
    }
}

/// Object classes produced by the external detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Player,
    Goalkeeper,
    Referee,
    Ball,
}

/// One detection from the external multi-object tracker: a bbox with a
/// persistent track id. Goalkeepers are folded into the player stream
/// when tracks are built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    /// [x1, y1, x2, y2] in raw pixel space.
    pub bbox: [f32; 4],
    pub class: ObjectClass,
    pub track_id: u32,
    pub confidence: f32,
}
