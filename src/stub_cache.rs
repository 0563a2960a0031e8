// Track stub cache.
//
// Tracking and camera-movement estimation dominate run time, so their
// combined result can be persisted as JSON and reused across runs. A
// stale stub (wrong frame count, unreadable, old layout) is discarded
// and recomputed rather than trusted.

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::tracking::TrackSet;

#[derive(Serialize, Deserialize)]
pub struct StubData {
    pub num_frames: usize,
    pub tracks: TrackSet,
    pub camera_movement: Vec<Vector2<f32>>,
}

/// Load a stub if it exists and matches the clip length. Any mismatch or
/// decode failure means "no stub"; only a real I/O error propagates.
pub fn load(path: &Path, expected_frames: usize) -> Result<Option<StubData>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("opening stub {}", path.display())),
    };

    let stub: StubData = match serde_json::from_reader(BufReader::new(file)) {
        Ok(stub) => stub,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "stub unreadable, recomputing");
            return Ok(None);
        }
    };

    if stub.num_frames != expected_frames || stub.camera_movement.len() != expected_frames {
        warn!(
            path = %path.display(),
            stub_frames = stub.num_frames,
            expected_frames,
            "stub frame count mismatch, recomputing"
        );
        return Ok(None);
    }

    info!(path = %path.display(), frames = stub.num_frames, "loaded track stub");
    Ok(Some(stub))
}

pub fn save(path: &Path, stub: &StubData) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating stub dir {}", parent.display()))?;
        }
    }
    let file = fs::File::create(path)
        .with_context(|| format!("writing stub {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), stub)
        .with_context(|| format!("encoding stub {}", path.display()))?;
    info!(path = %path.display(), frames = stub.num_frames, "wrote track stub");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::TrackRecord;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pitchtrack-{}-{}.json", name, std::process::id()))
    }

    fn sample_stub() -> StubData {
        let mut tracks = TrackSet::with_frames(3);
        tracks.players[1].insert(7, TrackRecord::from_bbox([1.0, 2.0, 3.0, 4.0]));
        StubData {
            num_frames: 3,
            tracks,
            camera_movement: vec![Vector2::zeros(), Vector2::new(-2.0, 1.0), Vector2::zeros()],
        }
    }

    #[test]
    fn test_round_trip() {
        let path = temp_path("round-trip");
        save(&path, &sample_stub()).unwrap();

        let loaded = load(&path, 3).unwrap().expect("stub must load");
        assert_eq!(loaded.num_frames, 3);
        assert_eq!(loaded.tracks.players[1][&7].bbox, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(loaded.camera_movement[1], Vector2::new(-2.0, 1.0));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_none() {
        let path = temp_path("missing-nonexistent");
        assert!(load(&path, 3).unwrap().is_none());
    }

    #[test]
    fn test_frame_count_mismatch_is_discarded() {
        let path = temp_path("mismatch");
        save(&path, &sample_stub()).unwrap();
        assert!(load(&path, 5).unwrap().is_none());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_garbage_file_is_discarded() {
        let path = temp_path("garbage");
        fs::write(&path, b"not json at all").unwrap();
        assert!(load(&path, 3).unwrap().is_none());
        fs::remove_file(&path).unwrap();
    }
}
