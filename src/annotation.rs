// Frame annotation.
//
// Draws the analysis results back onto the frames: a team-colored
// ellipse under each player (with the track id in a tag), a triangle
// over the ball and over the possessing player, speed/distance text
// under players, and two overlay panels (ball-control percentages,
// camera displacement). Everything is rendered with plain pixel writes
// and a small built-in glyph set, no image library.

use nalgebra::Vector2;

use crate::geometry::{bbox_center, bbox_width};
use crate::tracking::{TrackSet, BALL_TRACK_ID};
use crate::types::RgbFrame;

const RED: [u8; 3] = [255, 0, 0];
const GREEN: [u8; 3] = [0, 255, 0];
const YELLOW: [u8; 3] = [255, 255, 0];
const WHITE: [u8; 3] = [255, 255, 255];
const BLACK: [u8; 3] = [0, 0, 0];

pub fn draw_annotations(
    frames: &[RgbFrame],
    tracks: &TrackSet,
    team_control: &[Option<u8>],
    camera_movement: &[Vector2<f32>],
) -> Vec<RgbFrame> {
    let mut output = Vec::with_capacity(frames.len());

    for (frame_num, frame) in frames.iter().enumerate() {
        let mut canvas = frame.clone();

        if let Some(players) = tracks.players.get(frame_num) {
            for (&id, record) in players {
                let color = record.team_color.unwrap_or(RED);
                draw_ellipse(&mut canvas, &record.bbox, color, Some(id));
                if record.has_ball {
                    let top = bbox_center(&record.bbox);
                    draw_triangle(&mut canvas, top.x as i32, record.bbox[1] as i32, RED);
                }
                draw_player_stats(&mut canvas, record.bbox, record.speed_kmh, record.distance_m);
            }
        }

        if let Some(referees) = tracks.referees.get(frame_num) {
            for record in referees.values() {
                draw_ellipse(&mut canvas, &record.bbox, YELLOW, None);
            }
        }

        if let Some(ball) = tracks.ball.get(frame_num).and_then(|m| m.get(&BALL_TRACK_ID)) {
            let top = bbox_center(&ball.bbox);
            draw_triangle(&mut canvas, top.x as i32, ball.bbox[1] as i32, GREEN);
        }

        draw_team_ball_control(&mut canvas, frame_num, team_control);
        if let Some(movement) = camera_movement.get(frame_num) {
            draw_camera_movement(&mut canvas, movement);
        }

        output.push(canvas);
    }

    output
}

/// Flattened ellipse under the bbox, open at the top (an arc from -45 to
/// 235 degrees), plus an id tag below it for players.
fn draw_ellipse(frame: &mut RgbFrame, bbox: &[f32; 4], color: [u8; 3], track_id: Option<u32>) {
    let cx = (bbox[0] + bbox[2]) / 2.0;
    let cy = bbox[3];
    let rx = bbox_width(bbox).max(2.0);
    let ry = 0.35 * rx;

    let mut deg = -45.0f32;
    while deg <= 235.0 {
        let rad = deg.to_radians();
        for t in 0..2 {
            let x = cx + (rx - t as f32) * rad.cos();
            let y = cy + (ry - t as f32) * rad.sin();
            if x >= 0.0 && y >= 0.0 {
                frame.set_pixel(x as usize, y as usize, color);
            }
        }
        deg += 0.5;
    }

    if let Some(id) = track_id {
        let tag_w = 30i32;
        let tag_h = 12i32;
        let x0 = cx as i32 - tag_w / 2;
        let y0 = (cy + ry) as i32 + 2;
        fill_rect(frame, x0, y0, x0 + tag_w, y0 + tag_h, color);
        draw_text(frame, x0 + 3, y0 + 2, &id.to_string(), BLACK, 1);
    }
}

/// Downward-pointing filled triangle with the tip at (x, y).
fn draw_triangle(frame: &mut RgbFrame, x: i32, y: i32, color: [u8; 3]) {
    let height = 16i32;
    let half_base = 8i32;
    for row in 0..=height {
        let half = half_base * (height - row) / height;
        let py = y - height + row;
        for px in x - half..=x + half {
            if px >= 0 && py >= 0 {
                frame.set_pixel(px as usize, py as usize, color);
            }
        }
    }
}

fn draw_player_stats(frame: &mut RgbFrame, bbox: [f32; 4], speed: Option<f32>, distance: Option<f32>) {
    let x = bbox[0] as i32;
    let mut y = bbox[3] as i32 + 18;
    if let Some(speed) = speed {
        draw_text(frame, x, y, &format!("{speed:.2} KM/H"), BLACK, 1);
        y += 8;
    }
    if let Some(distance) = distance {
        draw_text(frame, x, y, &format!("{distance:.1} M"), BLACK, 1);
    }
}

/// Ball-control share of each team over frames seen so far. Unresolved
/// frames are excluded from the ratio.
pub fn control_percentages(control: &[Option<u8>], up_to: usize) -> Option<(f32, f32)> {
    let seen = &control[..control.len().min(up_to + 1)];
    let team1 = seen.iter().filter(|c| **c == Some(1)).count() as f32;
    let team2 = seen.iter().filter(|c| **c == Some(2)).count() as f32;
    let total = team1 + team2;
    if total == 0.0 {
        return None;
    }
    Some((team1 / total * 100.0, team2 / total * 100.0))
}

fn draw_team_ball_control(frame: &mut RgbFrame, frame_num: usize, control: &[Option<u8>]) {
    let Some((pct1, pct2)) = control_percentages(control, frame_num) else {
        return;
    };

    let x0 = (frame.width as f32 * 0.70) as i32;
    let y0 = (frame.height as f32 * 0.80) as i32;
    let x1 = frame.width as i32 - 4;
    let y1 = y0 + 26;
    blend_rect(frame, x0, y0, x1, y1, WHITE, 0.4);
    draw_text(frame, x0 + 4, y0 + 4, &format!("TEAM 1: {pct1:.1}%"), BLACK, 1);
    draw_text(frame, x0 + 4, y0 + 14, &format!("TEAM 2: {pct2:.1}%"), BLACK, 1);
}

fn draw_camera_movement(frame: &mut RgbFrame, movement: &Vector2<f32>) {
    let x1 = (frame.width as f32 * 0.30) as i32;
    blend_rect(frame, 4, 4, x1, 20, WHITE, 0.4);
    draw_text(
        frame,
        8,
        8,
        &format!("X: {:.2} Y: {:.2}", movement.x, movement.y),
        BLACK,
        1,
    );
}

fn fill_rect(frame: &mut RgbFrame, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 3]) {
    for y in y0.max(0)..y1.max(0) {
        for x in x0.max(0)..x1.max(0) {
            frame.set_pixel(x as usize, y as usize, color);
        }
    }
}

fn blend_rect(frame: &mut RgbFrame, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 3], alpha: f32) {
    for y in y0.max(0)..y1.max(0) {
        for x in x0.max(0)..x1.max(0) {
            let (x, y) = (x as usize, y as usize);
            if x >= frame.width || y >= frame.height {
                continue;
            }
            let old = frame.pixel(x, y);
            let mut blended = [0u8; 3];
            for k in 0..3 {
                blended[k] =
                    (old[k] as f32 * (1.0 - alpha) + color[k] as f32 * alpha) as u8;
            }
            frame.set_pixel(x, y, blended);
        }
    }
}

/// 3x5 bitmap glyphs for the handful of characters the overlays use.
/// Unknown characters render as blanks.
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        'K' => [0b101, 0b110, 0b100, 0b110, 0b101],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        _ => [0; 5],
    }
}

fn draw_text(frame: &mut RgbFrame, x: i32, y: i32, text: &str, color: [u8; 3], scale: i32) {
    let scale = scale.max(1);
    let mut cursor = x;
    for c in text.chars() {
        let rows = glyph(c);
        for (gy, row) in rows.iter().enumerate() {
            for gx in 0..3 {
                if row & (0b100 >> gx) != 0 {
                    for sy in 0..scale {
                        for sx in 0..scale {
                            let px = cursor + gx as i32 * scale + sx;
                            let py = y + gy as i32 * scale + sy;
                            if px >= 0 && py >= 0 {
                                frame.set_pixel(px as usize, py as usize, color);
                            }
                        }
                    }
                }
            }
        }
        cursor += 4 * scale;
    }
}
