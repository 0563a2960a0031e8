// Team assignment from jersey color.
//
// A player's jersey color is the foreground centroid of a 2-means
// clustering over the top half of their bbox crop; the cluster holding
// the majority of the crop's corner pixels is taken as background. Team
// colors come from a second 2-means pass over all jersey colors of the
// fitting frame. Assignments are memoized per track id, so a player keeps
// one team for the whole clip.
//
// The clustering is plain Lloyd's with a deterministic seed (first point
// plus the point farthest from it), so runs are reproducible.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::tracking::{FrameTracks, TrackSet};
use crate::types::{RgbFrame, TeamConfig};

pub struct TeamAssigner {
    config: TeamConfig,
    team_colors: [[f32; 3]; 2],
    assignments: BTreeMap<u32, u8>,
    fitted: bool,
}

impl TeamAssigner {
    pub fn new(config: TeamConfig) -> Self {
        Self {
            config,
            team_colors: [[0.0; 3]; 2],
            assignments: BTreeMap::new(),
            fitted: false,
        }
    }

    /// Learn the two team colors from one frame's players. Needs at
    /// least two usable jersey colors.
    pub fn fit(&mut self, frame: &RgbFrame, players: &FrameTracks) -> Result<()> {
        let colors: Vec<[f32; 3]> = players
            .values()
            .filter_map(|r| player_color(frame, &r.bbox, self.config.kmeans_max_iters))
            .collect();
        if colors.len() < 2 {
            bail!(
                "need at least two player colors to fit teams, got {}",
                colors.len()
            );
        }

        let (centroids, _) = match kmeans2(&colors, self.config.kmeans_max_iters) {
            Some(result) => result,
            None => bail!("team color clustering failed"),
        };
        self.team_colors = centroids;
        self.fitted = true;
        debug!(
            team1 = ?self.team_colors[0],
            team2 = ?self.team_colors[1],
            "team colors fitted"
        );
        Ok(())
    }

    /// Team for a player: configured override first, then the memoized
    /// assignment, then nearest fitted team color.
    pub fn team_for_player(
        &mut self,
        frame: &RgbFrame,
        bbox: &[f32; 4],
        player_id: u32,
    ) -> Option<u8> {
        if let Some(ov) = self
            .config
            .overrides
            .iter()
            .find(|o| o.player_id == player_id)
        {
            let team = ov.team;
            self.assignments.insert(player_id, team);
            return Some(team);
        }
        if let Some(&team) = self.assignments.get(&player_id) {
            return Some(team);
        }
        if !self.fitted {
            return None;
        }

        let color = player_color(frame, bbox, self.config.kmeans_max_iters)?;
        let team = if dist2(&color, &self.team_colors[0]) <= dist2(&color, &self.team_colors[1]) {
            1
        } else {
            2
        };
        self.assignments.insert(player_id, team);
        Some(team)
    }

    pub fn team_color(&self, team: u8) -> [u8; 3] {
        let c = self.team_colors[usize::from(team == 2)];
        [c[0] as u8, c[1] as u8, c[2] as u8]
    }

    /// Fit on the first frame holding at least two players, then stamp
    /// `team` and `team_color` onto every player record.
    pub fn assign(&mut self, frames: &[RgbFrame], tracks: &mut TrackSet) -> Result<()> {
        let num_frames = tracks.num_frames().min(frames.len());
        let fit_frame = (0..num_frames).find(|&f| tracks.players[f].len() >= 2);
        let Some(fit_frame) = fit_frame else {
            bail!("no frame with at least two players to fit team colors");
        };
        let fit_players = tracks.players[fit_frame].clone();
        self.fit(&frames[fit_frame], &fit_players)?;

        for frame_num in 0..num_frames {
            let boxes: Vec<(u32, [f32; 4])> = tracks.players[frame_num]
                .iter()
                .map(|(&id, r)| (id, r.bbox))
                .collect();
            for (player_id, bbox) in boxes {
                match self.team_for_player(&frames[frame_num], &bbox, player_id) {
                    Some(team) => {
                        if let Some(record) = tracks.players[frame_num].get_mut(&player_id) {
                            record.team = Some(team);
                            record.team_color = Some(self.team_color(team));
                        }
                    }
                    None => {
                        warn!(player_id, frame = frame_num, "no jersey color for player")
                    }
                }
            }
        }
        Ok(())
    }
}

/// Foreground (jersey) centroid of the top half of the player's bbox.
/// `None` when the crop is too small to cluster.
pub fn player_color(frame: &RgbFrame, bbox: &[f32; 4], max_iters: usize) -> Option<[f32; 3]> {
    let x1 = bbox[0].max(0.0) as usize;
    let y1 = bbox[1].max(0.0) as usize;
    let x2 = (bbox[2].max(0.0) as usize).min(frame.width);
    let y2 = (bbox[3].max(0.0) as usize).min(frame.height);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let width = x2 - x1;
    let height = (y2 - y1) / 2;
    if width < 2 || height < 2 {
        return None;
    }

    let mut pixels = Vec::with_capacity(width * height);
    for y in y1..y1 + height {
        for x in x1..x2 {
            let [r, g, b] = frame.pixel(x, y);
            pixels.push([r as f32, g as f32, b as f32]);
        }
    }

    let (centroids, labels) = kmeans2(&pixels, max_iters)?;

    // Crop corners are almost always pitch, not jersey.
    let corners = [
        labels[0],
        labels[width - 1],
        labels[(height - 1) * width],
        labels[height * width - 1],
    ];
    let zeros = corners.iter().filter(|&&l| l == 0).count();
    let background = if zeros >= 2 { 0 } else { 1 };
    let player_cluster = 1 - background;

    Some(centroids[player_cluster])
}

/// Deterministic 2-means over RGB points: seeded with the first point
/// and the point farthest from it, then Lloyd iterations until labels
/// stabilize or `max_iters` is hit.
fn kmeans2(points: &[[f32; 3]], max_iters: usize) -> Option<([[f32; 3]; 2], Vec<u8>)> {
    if points.len() < 2 {
        return None;
    }

    let c0 = points[0];
    let c1 = points
        .iter()
        .max_by(|a, b| {
            dist2(a, &c0)
                .partial_cmp(&dist2(b, &c0))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .copied()?;

    let mut centroids = [c0, c1];
    let mut labels = vec![0u8; points.len()];

    for _ in 0..max_iters.max(1) {
        let mut changed = false;
        for (point, label) in points.iter().zip(labels.iter_mut()) {
            let next = u8::from(dist2(point, &centroids[1]) < dist2(point, &centroids[0]));
            if next != *label {
                *label = next;
                changed = true;
            }
        }

        for cluster in 0..2 {
            let mut sum = [0.0f32; 3];
            let mut count = 0usize;
            for (point, &label) in points.iter().zip(&labels) {
                if label == cluster as u8 {
                    for k in 0..3 {
                        sum[k] += point[k];
                    }
                    count += 1;
                }
            }
            if count > 0 {
                centroids[cluster] = [
                    sum[0] / count as f32,
                    sum[1] / count as f32,
                    sum[2] / count as f32,
                ];
            }
        }

        if !changed {
            break;
        }
    }

    Some((centroids, labels))
}

#[inline]
fn dist2(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let mut sum = 0.0;
    for k in 0..3 {
        let d = a[k] - b[k];
        sum += d * d;
    }
    sum
}
