use glam::DVec2;
use indicatif::ProgressIterator;

use crate::cache::{CacheStore, FeatureRecord};
use crate::config::DumpConfig;
use crate::extract::FeatureExtractor;
use crate::types::{DepthMap, ImageFeatures, ImageRecord, PrecomputedFeatures, SplitData};
use crate::{Error, Result};

/// Ensures one image's feature record exists and returns it. Loads from the
/// cache slot when present, otherwise computes and persists. Idempotent: a
/// second call with the same index loads rather than recomputes.
pub fn ensure_image_features(
    store: &CacheStore,
    index: usize,
    image: &ImageRecord,
    depth: Option<&DepthMap>,
    precomputed: Option<&PrecomputedFeatures>,
    extractor: &dyn FeatureExtractor,
    config: &DumpConfig,
) -> Result<ImageFeatures> {
    if store.has_features(index) {
        log::trace!("feature cache hit for image {}", index);
        return Ok(store.load_features(index)?.into_features());
    }

    let intrinsics = image.intrinsics();
    let (keypoints, descriptors): (Vec<DVec2>, Vec<Vec<f32>>) = match precomputed {
        Some(pre) => (
            pre.keypoints
                .iter()
                .map(|p| DVec2::new(p[0], p[1]))
                .collect(),
            pre.descriptors.clone(),
        ),
        None => {
            if let Some(source) = &config.precomputed_kp_source {
                return Err(Error::MissingPrecomputed {
                    source: source.clone(),
                    index,
                });
            }
            let (pixel_points, descriptors) = extractor.extract(&image.raster);
            let normalized = pixel_points
                .into_iter()
                .map(|p| intrinsics.normalize(p))
                .collect();
            (normalized, descriptors)
        }
    };

    // Depth is sampled at the rounded pixel location of each keypoint.
    // Without a depth map everything sits at unit depth.
    let depths: Vec<f64> = match depth {
        Some(map) => keypoints
            .iter()
            .map(|&p| map.sample(intrinsics.denormalize(p)))
            .collect(),
        None => vec![1.0; keypoints.len()],
    };

    let features = ImageFeatures {
        keypoints,
        depths,
        descriptors,
    };
    store.write_features(index, &FeatureRecord::from_features(&features))?;
    log::debug!(
        "computed features for image {}: {} keypoints",
        index,
        features.len()
    );
    Ok(features)
}

/// Runs the per-image stage sequentially over every image referenced by the
/// sampled pairs. Later pairwise stages rely on every record being present.
pub fn ensure_split_features(
    store: &CacheStore,
    pairs: &[(usize, usize)],
    data: &SplitData,
    extractor: &dyn FeatureExtractor,
    config: &DumpConfig,
) -> Result<Vec<Option<ImageFeatures>>> {
    let mut features: Vec<Option<ImageFeatures>> = (0..data.images.len()).map(|_| None).collect();
    log::info!("extracting keypoints for {} pairs", pairs.len());
    for &(ii, jj) in pairs.iter().progress_count(pairs.len() as u64) {
        for index in [ii, jj] {
            if features[index].is_some() {
                continue;
            }
            features[index] = Some(ensure_image_features(
                store,
                index,
                &data.images[index],
                data.depths[index].as_ref(),
                data.precomputed[index].as_ref(),
                extractor,
                config,
            )?);
        }
    }
    Ok(features)
}
