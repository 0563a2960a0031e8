pub mod annotation;
pub mod ball_assignment;
pub mod camera_movement;
pub mod config;
pub mod geometry;
pub mod pipeline;
pub mod speed_distance;
pub mod stub_cache;
pub mod team_assignment;
pub mod tracking;
pub mod types;
pub mod video_io;
pub mod view_transform;

pub use types::{Config, ObjectClass, RawDetection, RgbFrame};
