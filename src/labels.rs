use glam::DVec2;
use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::cache::MatchRecord;
use crate::config::{DegeneratePolicy, GeodesicMetric};
use crate::geometry::{project_with_depth, relative_pose};
use crate::types::{CameraPose, ImageFeatures};
use crate::{Error, Result};

/// Labeled training tuple for one image pair. One row per surviving
/// (keypoint-i, candidate-j) combination; classification never filters
/// rows, it only feeds the split statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairLabel {
    /// `[x1, y1, x2, y2]` in normalized camera-plane coordinates.
    pub coordinates: Vec<[f64; 4]>,
    /// `[geodesic distance, squared reprojection error]` per row.
    pub labels: Vec<[f64; 2]>,
    pub rotation: na::Matrix3<f64>,
    /// Unit-normalized relative translation.
    pub translation: na::Vector3<f64>,
}

/// Running good/bad totals for one split, reported once after all pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStats {
    pub total: usize,
    pub good: usize,
    pub bad: usize,
}

impl SplitStats {
    pub fn record(&mut self, good: bool) {
        self.total += 1;
        if good {
            self.good += 1;
        } else {
            self.bad += 1;
        }
    }

    pub fn good_ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.good as f64 / self.total as f64)
    }

    pub fn bad_ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.bad as f64 / self.total as f64)
    }
}

/// Builds the label tuple for one pair from both feature caches and the
/// pair's match cache. Returns `None` when a degenerate pair is skipped
/// under [`DegeneratePolicy::Skip`].
#[allow(clippy::too_many_arguments)]
pub fn build_pair_label(
    i: usize,
    j: usize,
    features_i: &ImageFeatures,
    features_j: &ImageFeatures,
    pose_i: &CameraPose,
    pose_j: &CameraPose,
    matches: &MatchRecord,
    metric: GeodesicMetric,
    geodesic_threshold: f64,
    policy: DegeneratePolicy,
    stats: &mut SplitStats,
) -> Result<Option<PairLabel>> {
    let (dr, dt) = relative_pose(pose_i, pose_j);

    let norm = dt.norm();
    if norm <= 1e-5 {
        match policy {
            DegeneratePolicy::Abort => {
                return Err(Error::DegeneratePair { i, j, norm });
            }
            DegeneratePolicy::Skip => {
                log::warn!(
                    "skipping pair ({}, {}): relative translation norm {:.3e}",
                    i,
                    j,
                    norm
                );
                return Ok(None);
            }
        }
    }

    // Depth-based projection of every image-i keypoint into image j's
    // canonical plane.
    let projected: Vec<DVec2> = features_i
        .keypoints
        .iter()
        .zip(features_i.depths.iter())
        .map(|(&p, &z)| project_with_depth(p, z, &dr, &dt))
        .collect();

    // Candidates are restricted to the cached K nearest neighbors, not all
    // of image j's keypoints.
    let mut x1s = Vec::new();
    let mut x1ps = Vec::new();
    let mut x2s = Vec::new();
    for (row, cols) in matches.indices.iter().enumerate() {
        for &col in cols {
            x1s.push(features_i.keypoints[row]);
            x1ps.push(projected[row]);
            x2s.push(features_j.keypoints[col]);
        }
    }

    let geodesic = metric.evaluate(&x1s, &x2s, &dr, &dt);

    let mut coordinates = Vec::with_capacity(x1s.len());
    let mut labels = Vec::with_capacity(x1s.len());
    for idx in 0..x1s.len() {
        let reprojection = (x2s[idx] - x1ps[idx]).length_squared();
        stats.record(geodesic[idx] < geodesic_threshold);
        coordinates.push([x1s[idx].x, x1s[idx].y, x2s[idx].x, x2s[idx].y]);
        labels.push([geodesic[idx], reprojection]);
    }

    Ok(Some(PairLabel {
        coordinates,
        labels,
        rotation: dr,
        translation: dt / norm,
    }))
}
