// Frame and detection I/O.
//
// Clips are exchanged as directories of binary PPM (P6) images, one per
// frame, ordered by file name. Detections come from the external
// tracker as one JSON array per frame.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;
use walkdir::WalkDir;

use crate::types::{RawDetection, RgbFrame};

/// All `.ppm` frames under `dir`, in file-name order.
pub fn read_frames(dir: &Path) -> Result<Vec<RgbFrame>> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map(|ext| ext == "ppm").unwrap_or(false))
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("no .ppm frames found under {}", dir.display());
    }

    let mut frames: Vec<RgbFrame> = Vec::with_capacity(paths.len());
    for path in &paths {
        let bytes =
            fs::read(path).with_context(|| format!("reading frame {}", path.display()))?;
        let frame =
            decode_ppm(&bytes).with_context(|| format!("decoding frame {}", path.display()))?;
        if let Some(first) = frames.first() {
            if frame.width != first.width || frame.height != first.height {
                bail!(
                    "frame size mismatch at {}: {}x{} vs {}x{}",
                    path.display(),
                    frame.width,
                    frame.height,
                    first.width,
                    first.height
                );
            }
        }
        frames.push(frame);
    }

    info!(
        frames = frames.len(),
        width = frames[0].width,
        height = frames[0].height,
        dir = %dir.display(),
        "frames loaded"
    );
    Ok(frames)
}

/// Write frames as `frame_00000.ppm`, `frame_00001.ppm`, ... under `dir`.
pub fn write_frames(dir: &Path, frames: &[RgbFrame]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for (i, frame) in frames.iter().enumerate() {
        let path = dir.join(format!("frame_{i:05}.ppm"));
        fs::write(&path, encode_ppm(frame))
            .with_context(|| format!("writing frame {}", path.display()))?;
    }
    info!(frames = frames.len(), dir = %dir.display(), "frames written");
    Ok(())
}

/// Per-frame detection lists from the external tracker.
pub fn read_detections(path: &Path) -> Result<Vec<Vec<RawDetection>>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading detections {}", path.display()))?;
    let detections: Vec<Vec<RawDetection>> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing detections {}", path.display()))?;
    Ok(detections)
}

fn decode_ppm(bytes: &[u8]) -> Result<RgbFrame> {
    let mut pos = 0usize;

    let magic = next_token(bytes, &mut pos)?;
    if magic != b"P6" {
        bail!("not a binary PPM (magic {:?})", String::from_utf8_lossy(&magic));
    }

    let width: usize = parse_number(bytes, &mut pos)?;
    let height: usize = parse_number(bytes, &mut pos)?;
    let maxval: usize = parse_number(bytes, &mut pos)?;
    if maxval != 255 {
        bail!("unsupported PPM maxval {maxval}, expected 255");
    }
    // exactly one whitespace byte separates the header from pixel data
    pos += 1;

    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(3))
        .context("frame dimensions overflow")?;
    let data = bytes
        .get(pos..pos + expected)
        .with_context(|| format!("truncated PPM, wanted {expected} pixel bytes"))?;

    Ok(RgbFrame::new(data.to_vec(), width, height))
}

fn encode_ppm(frame: &RgbFrame) -> Vec<u8> {
    let header = format!("P6\n{} {}\n255\n", frame.width, frame.height);
    let mut out = Vec::with_capacity(header.len() + frame.data.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&frame.data);
    out
}

/// Next whitespace-delimited token, skipping `#` comment lines.
fn next_token(bytes: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    loop {
        while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
            *pos += 1;
        }
        if *pos < bytes.len() && bytes[*pos] == b'#' {
            while *pos < bytes.len() && bytes[*pos] != b'\n' {
                *pos += 1;
            }
            continue;
        }
        break;
    }
    if *pos >= bytes.len() {
        bail!("unexpected end of PPM header");
    }
    let start = *pos;
    while *pos < bytes.len() && !bytes[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
    Ok(bytes[start..*pos].to_vec())
}

fn parse_number(bytes: &[u8], pos: &mut usize) -> Result<usize> {
    let token = next_token(bytes, pos)?;
    std::str::from_utf8(&token)
        .ok()
        .and_then(|s| s.parse().ok())
        .with_context(|| format!("bad PPM header field {:?}", String::from_utf8_lossy(&token)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectClass;

    #[test]
    fn test_ppm_round_trip() {
        let mut frame = RgbFrame::filled(4, 3, [10, 20, 30]);
        frame.set_pixel(2, 1, [200, 100, 50]);

        let decoded = decode_ppm(&encode_ppm(&frame)).unwrap();
        assert_eq!(decoded.width, 4);
        assert_eq!(decoded.height, 3);
        assert_eq!(decoded.pixel(2, 1), [200, 100, 50]);
        assert_eq!(decoded.pixel(0, 0), [10, 20, 30]);
    }

    #[test]
    fn test_ppm_header_comments_are_skipped() {
        let mut bytes = b"P6\n# made by some tool\n2 1\n255\n".to_vec();
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        let frame = decode_ppm(&bytes).unwrap();
        assert_eq!(frame.pixel(1, 0), [4, 5, 6]);
    }

    #[test]
    fn test_ppm_rejects_wrong_magic_and_truncation() {
        assert!(decode_ppm(b"P3\n2 1\n255\n1 2 3 4 5 6\n").is_err());
        let mut bytes = b"P6\n2 1\n255\n".to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(decode_ppm(&bytes).is_err());
    }

    #[test]
    fn test_frame_dir_round_trip() {
        let dir = std::env::temp_dir().join(format!("pitchtrack-frames-{}", std::process::id()));
        let frames = vec![
            RgbFrame::filled(6, 4, [1, 2, 3]),
            RgbFrame::filled(6, 4, [4, 5, 6]),
        ];
        write_frames(&dir, &frames).unwrap();

        let loaded = read_frames(&dir).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].pixel(0, 0), [1, 2, 3]);
        assert_eq!(loaded[1].pixel(5, 3), [4, 5, 6]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_read_detections() {
        let path = std::env::temp_dir().join(format!("pitchtrack-dets-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"[[{"bbox":[1.0,2.0,3.0,4.0],"class":"player","track_id":7,"confidence":0.9}],[]]"#,
        )
        .unwrap();

        let dets = read_detections(&path).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0][0].class, ObjectClass::Player);
        assert_eq!(dets[0][0].track_id, 7);
        assert!(dets[1].is_empty());

        fs::remove_file(&path).unwrap();
    }
}
