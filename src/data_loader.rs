use std::path::{Path, PathBuf};

use glob::glob;
use image::ImageReader;
use indicatif::ParallelProgressIterator;
use nalgebra as na;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::io::object_from_json;
use crate::types::{CameraPose, DepthMap, ImageRecord, PrecomputedFeatures, SplitData};
use crate::{Error, Result};

/// Per-image calibration entry in `geometry.json`, listed in the sorted
/// order of the image files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryEntry {
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
    pub k: [[f64; 3]; 3],
}

fn mat3(rows: &[[f64; 3]; 3]) -> na::Matrix3<f64> {
    na::Matrix3::new(
        rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
        rows[2][1], rows[2][2],
    )
}

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    if let Ok(p) = rp {
        for ext in &[".png", ".jpg"] {
            if p.as_os_str().to_string_lossy().ends_with(ext) {
                return Some(p);
            }
        }
    }
    None
}

fn layout_error(root: &Path, reason: impl Into<String>) -> Error {
    Error::DatasetLayout {
        path: root.to_path_buf(),
        reason: reason.into(),
    }
}

/// Loads one split directory into memory:
/// `images/*.png|jpg` (sorted), `geometry.json`, `visibility.json`,
/// optional `depths/{stem}.json` and `features-{source}/{stem}.json`.
///
/// # Arguments
/// * `root` - Path to the split directory.
/// * `crop_center` - Center-crop every image to a square.
/// * `use_color` - Keep color; grayscale otherwise.
/// * `precomputed_source` - Name of the precomputed keypoint source, if any.
pub fn load_split_dir(
    root: &Path,
    crop_center: bool,
    use_color: bool,
    precomputed_source: Option<&str>,
) -> Result<SplitData> {
    let pattern = format!("{}/images/*", root.display());
    let mut image_paths: Vec<PathBuf> = glob(&pattern)
        .map_err(|e| layout_error(root, e.to_string()))?
        .filter_map(img_filter)
        .collect();
    image_paths.sort();
    if image_paths.is_empty() {
        return Err(layout_error(root, "no images under images/"));
    }

    let geometry: Vec<GeometryEntry> = object_from_json(&root.join("geometry.json"))?;
    if geometry.len() != image_paths.len() {
        return Err(layout_error(
            root,
            format!(
                "geometry.json has {} entries for {} images",
                geometry.len(),
                image_paths.len()
            ),
        ));
    }

    let visibility: Vec<Vec<f64>> = object_from_json(&root.join("visibility.json"))?;
    if visibility.len() != image_paths.len()
        || visibility.iter().any(|row| row.len() != image_paths.len())
    {
        return Err(layout_error(root, "visibility.json is not N x N"));
    }

    log::info!("loading {} images from {}", image_paths.len(), root.display());
    let images: Vec<ImageRecord> = image_paths
        .par_iter()
        .zip(geometry.par_iter())
        .progress_count(image_paths.len() as u64)
        .map(|(path, entry)| -> Result<ImageRecord> {
            let mut raster = ImageReader::open(path)?.decode()?;
            if crop_center {
                let side = raster.width().min(raster.height());
                let x0 = (raster.width() - side) / 2;
                let y0 = (raster.height() - side) / 2;
                raster = raster.crop_imm(x0, y0, side, side);
            }
            if !use_color {
                raster = image::DynamicImage::ImageLuma8(raster.to_luma8());
            }
            Ok(ImageRecord {
                raster,
                path: path.clone(),
                pose: CameraPose {
                    rotation: mat3(&entry.rotation),
                    translation: na::Vector3::from_column_slice(&entry.translation),
                },
                k: mat3(&entry.k),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let depths = image_paths
        .iter()
        .map(|path| -> Result<Option<DepthMap>> {
            let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            let depth_path = root.join("depths").join(format!("{}.json", stem));
            if depth_path.exists() {
                Ok(Some(object_from_json(&depth_path)?))
            } else {
                Ok(None)
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let precomputed = image_paths
        .iter()
        .map(|path| -> Result<Option<PrecomputedFeatures>> {
            let Some(source) = precomputed_source else {
                return Ok(None);
            };
            let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            let feature_path = root
                .join(format!("features-{}", source))
                .join(format!("{}.json", stem));
            if feature_path.exists() {
                Ok(Some(object_from_json(&feature_path)?))
            } else {
                Ok(None)
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SplitData {
        images,
        visibility,
        depths,
        precomputed,
    })
}
