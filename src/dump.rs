use std::path::PathBuf;

use nalgebra as na;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::cache::CacheStore;
use crate::config::{DumpConfig, SplitConfig};
use crate::extract::FeatureExtractor;
use crate::features::ensure_split_features;
use crate::io::{object_to_json, write_match_report};
use crate::labels::{SplitStats, build_pair_label};
use crate::matching::build_match_caches;
use crate::types::{Focal, SplitData};
use crate::{Error, Result};

/// All label tuples and auxiliary fields for one split. Per-pair row counts
/// vary, so fields stay as ragged vectors and are persisted one file per
/// field.
#[derive(Debug, Clone, Default)]
pub struct DatasetBundle {
    pub coordinates: Vec<Vec<[f64; 4]>>,
    pub labels: Vec<Vec<[f64; 2]>>,
    pub rotations: Vec<[[f64; 3]; 3]>,
    pub translations: Vec<[f64; 3]>,
    pub image1_paths: Vec<PathBuf>,
    pub image2_paths: Vec<PathBuf>,
    pub cx1s: Vec<f64>,
    pub cy1s: Vec<f64>,
    pub f1s: Vec<Focal>,
    pub cx2s: Vec<f64>,
    pub cy2s: Vec<f64>,
    pub f2s: Vec<Focal>,
}

impl DatasetBundle {
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// One JSON file per field, named `{field}_{tag}.json`.
    pub fn save(&self, dir: &std::path::Path, tag: &str) -> Result<()> {
        object_to_json(&dir.join(format!("xs_{}.json", tag)), &self.coordinates)?;
        object_to_json(&dir.join(format!("ys_{}.json", tag)), &self.labels)?;
        object_to_json(&dir.join(format!("Rs_{}.json", tag)), &self.rotations)?;
        object_to_json(&dir.join(format!("ts_{}.json", tag)), &self.translations)?;
        object_to_json(&dir.join(format!("img1s_{}.json", tag)), &self.image1_paths)?;
        object_to_json(&dir.join(format!("img2s_{}.json", tag)), &self.image2_paths)?;
        object_to_json(&dir.join(format!("cx1s_{}.json", tag)), &self.cx1s)?;
        object_to_json(&dir.join(format!("cy1s_{}.json", tag)), &self.cy1s)?;
        object_to_json(&dir.join(format!("f1s_{}.json", tag)), &self.f1s)?;
        object_to_json(&dir.join(format!("cx2s_{}.json", tag)), &self.cx2s)?;
        object_to_json(&dir.join(format!("cy2s_{}.json", tag)), &self.cy2s)?;
        object_to_json(&dir.join(format!("f2s_{}.json", tag)), &self.f2s)?;
        Ok(())
    }
}

fn mat3_rows(m: &na::Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

/// All ordered pairs (i, j), i != j, whose visibility score is strictly
/// above the threshold.
pub fn enumerate_pairs(visibility: &[Vec<f64>], threshold: f64) -> Vec<(usize, usize)> {
    let n = visibility.len();
    let mut pairs = Vec::new();
    for i in 0..n {
        for j in 0..n {
            if i != j && visibility[i][j] > threshold {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Seeded permutation, then the first `max_samples` pairs. Same seed, same
/// input, same selection.
pub fn subsample_pairs(
    pairs: &[(usize, usize)],
    max_samples: usize,
    seed: u64,
) -> Vec<(usize, usize)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut shuffled = pairs.to_vec();
    shuffled.shuffle(&mut rng);
    shuffled.truncate(max_samples);
    shuffled
}

pub struct SplitOutcome {
    pub skipped: bool,
    pub output_dir: PathBuf,
    pub pairs_built: usize,
    pub stats: SplitStats,
}

/// Runs the whole three-stage build for one split. The `ready` marker gates
/// the split as one atomic unit: it is written only after every payload
/// file, so its presence implies a complete, valid bundle. An interrupted
/// build leaves payload files without the marker and a rerun rebuilds from
/// the per-image and per-pair caches.
pub fn dump_split(
    config: &DumpConfig,
    split_cfg: &SplitConfig,
    data: &SplitData,
    extractor: &dyn FeatureExtractor,
) -> Result<SplitOutcome> {
    let output_dir = config.split_output_dir(split_cfg);
    let ready_path = output_dir.join("ready");
    let tag = split_cfg.split.tag();

    if ready_path.exists() {
        log::info!("{}: ready marker present, skipping", output_dir.display());
        return Ok(SplitOutcome {
            skipped: true,
            output_dir,
            pairs_built: 0,
            stats: SplitStats::default(),
        });
    }

    std::fs::create_dir_all(&output_dir)?;
    let store = CacheStore::new(output_dir.join("dump"))?;

    let pairs = enumerate_pairs(&data.visibility, split_cfg.visibility_threshold);
    log::info!(
        "{} ({}): {} pairs above visibility {}",
        split_cfg.dataset_name,
        tag,
        pairs.len(),
        split_cfg.visibility_threshold
    );
    let sampled = subsample_pairs(&pairs, split_cfg.max_samples, config.sample_seed);

    let features = ensure_split_features(&store, &sampled, data, extractor, config)?;
    build_match_caches(&store, &sampled, config.num_neighbors, config.worker_ratio)?;

    let mut bundle = DatasetBundle::default();
    let mut stats = SplitStats::default();
    for &(ii, jj) in &sampled {
        let features_i = features[ii]
            .as_ref()
            .ok_or(Error::MissingFeatureRecord(ii))?;
        let features_j = features[jj]
            .as_ref()
            .ok_or(Error::MissingFeatureRecord(jj))?;
        let matches = store.load_matches(ii, jj)?;
        let label = build_pair_label(
            ii,
            jj,
            features_i,
            features_j,
            &data.images[ii].pose,
            &data.images[jj].pose,
            &matches,
            split_cfg.geodesic_metric,
            split_cfg.geodesic_threshold,
            config.degenerate_policy,
            &mut stats,
        )?;
        let Some(label) = label else {
            continue;
        };

        let intrinsics_i = data.images[ii].intrinsics();
        let intrinsics_j = data.images[jj].intrinsics();
        bundle.coordinates.push(label.coordinates);
        bundle.labels.push(label.labels);
        bundle.rotations.push(mat3_rows(&label.rotation));
        bundle
            .translations
            .push([label.translation.x, label.translation.y, label.translation.z]);
        bundle.image1_paths.push(data.images[ii].path.clone());
        bundle.image2_paths.push(data.images[jj].path.clone());
        bundle.cx1s.push(intrinsics_i.cx);
        bundle.cy1s.push(intrinsics_i.cy);
        bundle.f1s.push(intrinsics_i.focal());
        bundle.cx2s.push(intrinsics_j.cx);
        bundle.cy2s.push(intrinsics_j.cy);
        bundle.f2s.push(intrinsics_j.focal());
    }

    if let (Some(good), Some(bad)) = (stats.good_ratio(), stats.bad_ratio()) {
        log::info!(
            "{} ({}): good {} / {} (ratio {:.5}), bad {} / {} (ratio {:.5})",
            split_cfg.dataset_name,
            tag,
            stats.good,
            stats.total,
            good,
            stats.bad,
            stats.total,
            bad
        );
    }

    bundle.save(&output_dir, tag)?;
    write_match_report(&output_dir.join(format!("report_{}.txt", tag)), tag, &stats)?;
    // Marker last: payload first, then the commit signal.
    std::fs::File::create(&ready_path)?;

    Ok(SplitOutcome {
        skipped: false,
        output_dir,
        pairs_built: bundle.len(),
        stats,
    })
}
