use glam::DVec2;
use image::DynamicImage;
use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pinhole intrinsics in pixel units. The principal point already includes
/// the image-center term, see [`ImageRecord::intrinsics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub cx: f64,
    pub cy: f64,
    pub fx: f64,
    pub fy: f64,
}

/// Focal length as stored in the output bundle. Collapses to a single value
/// when both axes agree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Focal {
    Single(f64),
    Split(f64, f64),
}

impl CameraIntrinsics {
    /// Normalize a pixel coordinate onto the canonical camera plane.
    pub fn normalize(&self, p: DVec2) -> DVec2 {
        DVec2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }

    /// Map a normalized coordinate back to pixel space.
    pub fn denormalize(&self, p: DVec2) -> DVec2 {
        DVec2::new(p.x * self.fx + self.cx, p.y * self.fy + self.cy)
    }

    pub fn focal(&self) -> Focal {
        if (self.fx - self.fy).abs() <= 1e-9 * self.fx.abs().max(self.fy.abs()).max(1.0) {
            Focal::Single(self.fx)
        } else {
            Focal::Split(self.fx, self.fy)
        }
    }
}

/// World-to-camera extrinsics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub rotation: na::Matrix3<f64>,
    pub translation: na::Vector3<f64>,
}

/// One loaded image with its calibration. Immutable once loaded.
pub struct ImageRecord {
    pub raster: DynamicImage,
    pub path: PathBuf,
    pub pose: CameraPose,
    /// 3x3 calibration matrix. The principal point entries are stored as
    /// offsets from the image center, not absolute pixel positions.
    pub k: na::Matrix3<f64>,
}

impl ImageRecord {
    /// Principal point = image center plus the K offset entries; focals are
    /// taken from the K diagonal.
    pub fn intrinsics(&self) -> CameraIntrinsics {
        let w = self.raster.width() as f64;
        let h = self.raster.height() as f64;
        CameraIntrinsics {
            cx: (w - 1.0) * 0.5 + self.k[(0, 2)],
            cy: (h - 1.0) * 0.5 + self.k[(1, 2)],
            fx: self.k[(0, 0)],
            fy: self.k[(1, 1)],
        }
    }
}

/// Dense depth map aligned with an image raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthMap {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl DepthMap {
    /// Sample at the nearest pixel. Coordinates outside the map clamp to the
    /// border, matching how keypoints at the image edge behave.
    pub fn sample(&self, p_px: DVec2) -> f64 {
        let c = (p_px.x.round().max(0.0) as usize).min(self.width - 1);
        let r = (p_px.y.round().max(0.0) as usize).min(self.height - 1);
        self.values[r * self.width + c] as f64
    }
}

/// Per-image features in their cached form: normalized keypoints with a
/// depth value and a descriptor per point. All three run index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFeatures {
    pub keypoints: Vec<DVec2>,
    pub depths: Vec<f64>,
    pub descriptors: Vec<Vec<f32>>,
}

impl ImageFeatures {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Keypoints and descriptors supplied by an external detector, already in
/// normalized camera-plane coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecomputedFeatures {
    pub keypoints: Vec<[f64; 2]>,
    pub descriptors: Vec<Vec<f32>>,
}

/// Everything the orchestrator needs for one split, fully resident in
/// memory before any pairwise work starts.
pub struct SplitData {
    pub images: Vec<ImageRecord>,
    /// Row-major N x N shared-overlap scores.
    pub visibility: Vec<Vec<f64>>,
    pub depths: Vec<Option<DepthMap>>,
    pub precomputed: Vec<Option<PrecomputedFeatures>>,
}
