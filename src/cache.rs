use std::path::{Path, PathBuf};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::io::{object_from_json, object_to_json};
use crate::types::ImageFeatures;
use crate::{Error, Result};

/// On-disk record of one image's features: normalized keypoints, one depth
/// value and one descriptor per keypoint, all index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub keypoints: Vec<[f64; 2]>,
    pub depths: Vec<f64>,
    pub descriptors: Vec<Vec<f32>>,
}

impl FeatureRecord {
    pub fn from_features(features: &ImageFeatures) -> FeatureRecord {
        FeatureRecord {
            keypoints: features.keypoints.iter().map(|p| [p.x, p.y]).collect(),
            depths: features.depths.clone(),
            descriptors: features.descriptors.clone(),
        }
    }

    pub fn into_features(self) -> ImageFeatures {
        ImageFeatures {
            keypoints: self
                .keypoints
                .iter()
                .map(|p| DVec2::new(p[0], p[1]))
                .collect(),
            depths: self.depths,
            descriptors: self.descriptors,
        }
    }
}

/// On-disk record of one pair's K nearest descriptor neighbors: for each
/// keypoint of the first image, the selected column indices into the second
/// image's keypoints and their distances, both in ascending-distance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub indices: Vec<Vec<usize>>,
    pub distances: Vec<Vec<f32>>,
}

/// Identity-addressed record store shared by every pipeline stage. Records
/// are keyed by image index or pair indices only; content staleness is never
/// checked. That is sound here because feature records are themselves cached
/// and never recomputed while present.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dump_dir: PathBuf,
}

impl CacheStore {
    pub fn new(dump_dir: impl Into<PathBuf>) -> Result<CacheStore> {
        let dump_dir = dump_dir.into();
        std::fs::create_dir_all(&dump_dir)?;
        Ok(CacheStore { dump_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dump_dir
    }

    pub fn feature_path(&self, index: usize) -> PathBuf {
        self.dump_dir.join(format!("kp-z-desc-{}.json", index))
    }

    pub fn match_path(&self, i: usize, j: usize) -> PathBuf {
        self.dump_dir.join(format!("knn-{}-{}.json", i, j))
    }

    pub fn has_features(&self, index: usize) -> bool {
        self.feature_path(index).exists()
    }

    pub fn write_features(&self, index: usize, record: &FeatureRecord) -> Result<()> {
        object_to_json(&self.feature_path(index), record)
    }

    pub fn load_features(&self, index: usize) -> Result<FeatureRecord> {
        let path = self.feature_path(index);
        if !path.exists() {
            return Err(Error::MissingFeatureRecord(index));
        }
        object_from_json(&path)
    }

    pub fn has_matches(&self, i: usize, j: usize) -> bool {
        self.match_path(i, j).exists()
    }

    pub fn write_matches(&self, i: usize, j: usize, record: &MatchRecord) -> Result<()> {
        object_to_json(&self.match_path(i, j), record)
    }

    pub fn load_matches(&self, i: usize, j: usize) -> Result<MatchRecord> {
        let path = self.match_path(i, j);
        if !path.exists() {
            return Err(Error::MissingMatchRecord(i, j));
        }
        object_from_json(&path)
    }
}
