use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which geodesic consistency metric labels a candidate correspondence.
/// Chosen once per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeodesicMetric {
    Sampson,
    EpipolarSquared,
    EpipolarSymmetric,
}

/// What to do with a pair whose relative translation is near zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegeneratePolicy {
    /// Fail the whole split build. Such a pair should never have passed the
    /// visibility filter, so treat it as a data-quality signal.
    Abort,
    /// Log a warning and drop the pair from the bundle.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    /// Short tag used in output file and directory names.
    pub fn tag(&self) -> &'static str {
        match self {
            Split::Train => "tr",
            Split::Validation => "va",
            Split::Test => "te",
        }
    }

    /// Conventional sub-directory name inside a dataset root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "val",
            Split::Test => "test",
        }
    }
}

/// Per-split settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub split: Split,
    pub dataset_name: String,
    pub data_dir: PathBuf,
    /// Pairs are kept only when their visibility score is strictly above
    /// this threshold.
    pub visibility_threshold: f64,
    pub geodesic_metric: GeodesicMetric,
    /// A combination is counted "good" when its geodesic distance is below
    /// this value.
    pub geodesic_threshold: f64,
    /// At most this many pairs are sampled from the enumerated set.
    pub max_samples: usize,
}

/// Immutable run configuration, threaded into every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Root under which all split output directories are created.
    pub dump_prefix: PathBuf,
    /// Number of keypoints requested from the extractor.
    pub num_keypoints: usize,
    /// K in the K-nearest-neighbor match cache.
    pub num_neighbors: usize,
    pub crop_center: bool,
    /// When set, keypoints must come from this named precomputed source and
    /// on-the-fly extraction is disabled.
    pub precomputed_kp_source: Option<String>,
    /// Fraction of available cores given to the match worker pool.
    pub worker_ratio: f64,
    pub sample_seed: u64,
    pub degenerate_policy: DegeneratePolicy,
    pub splits: Vec<SplitConfig>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            dump_prefix: PathBuf::from("data_dump"),
            num_keypoints: 2000,
            num_neighbors: 5,
            crop_center: true,
            precomputed_kp_source: None,
            worker_ratio: 0.4,
            sample_seed: 1234,
            degenerate_policy: DegeneratePolicy::Abort,
            splits: Vec::new(),
        }
    }
}

impl DumpConfig {
    pub fn from_json_file(path: &Path) -> crate::Result<DumpConfig> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Deterministic output directory for one split:
    /// `{prefix}[{kp-source}]/{dataset}/numkp-{n}/nn-{k}[/nocrop]/{tag}-{samples}`.
    pub fn split_output_dir(&self, split_cfg: &SplitConfig) -> PathBuf {
        let mut prefix = self.dump_prefix.as_os_str().to_os_string();
        if let Some(source) = &self.precomputed_kp_source {
            prefix.push(source);
        }
        let mut dir = PathBuf::from(prefix)
            .join(&split_cfg.dataset_name)
            .join(format!("numkp-{}", self.num_keypoints))
            .join(format!("nn-{}", self.num_neighbors));
        if !self.crop_center {
            dir = dir.join("nocrop");
        }
        dir.join(format!(
            "{}-{}",
            split_cfg.split.tag(),
            split_cfg.max_samples
        ))
    }
}
