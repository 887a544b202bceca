use correspondence_dataset::Error;
use correspondence_dataset::cache::MatchRecord;
use correspondence_dataset::config::{
    DegeneratePolicy, DumpConfig, GeodesicMetric, Split, SplitConfig,
};
use correspondence_dataset::dump::{dump_split, enumerate_pairs, subsample_pairs};
use correspondence_dataset::extract::GridPatchExtractor;
use correspondence_dataset::labels::{SplitStats, build_pair_label};
use correspondence_dataset::types::{
    CameraPose, ImageFeatures, ImageRecord, PrecomputedFeatures, SplitData,
};
use glam::DVec2;
use image::DynamicImage;
use nalgebra as na;
use tempfile::TempDir;

fn rotation_y(angle: f64) -> na::Matrix3<f64> {
    na::Rotation3::from_axis_angle(&na::Vector3::y_axis(), angle).into_inner()
}

fn k_matrix() -> na::Matrix3<f64> {
    na::Matrix3::new(50.0, 0.0, 0.0, 0.0, 50.0, 0.0, 0.0, 0.0, 1.0)
}

fn synthetic_record(dir: &TempDir, name: &str, pose: CameraPose) -> ImageRecord {
    ImageRecord {
        raster: DynamicImage::new_luma8(32, 32),
        path: dir.path().join(name),
        pose,
        k: k_matrix(),
    }
}

fn precomputed(points: &[[f64; 2]]) -> PrecomputedFeatures {
    PrecomputedFeatures {
        keypoints: points.to_vec(),
        descriptors: points
            .iter()
            .enumerate()
            .map(|(i, p)| vec![p[0] as f32, p[1] as f32, i as f32, 1.0])
            .collect(),
    }
}

/// Three images, identical intrinsics, no depth maps. Only (0, 1) is above
/// the visibility threshold; (1, 0) sits exactly on it.
fn synthetic_split(dir: &TempDir) -> SplitData {
    let images = vec![
        synthetic_record(
            dir,
            "img0.png",
            CameraPose {
                rotation: na::Matrix3::identity(),
                translation: na::Vector3::zeros(),
            },
        ),
        synthetic_record(
            dir,
            "img1.png",
            CameraPose {
                rotation: rotation_y(0.1),
                translation: na::Vector3::new(0.5, 0.0, 0.0),
            },
        ),
        synthetic_record(
            dir,
            "img2.png",
            CameraPose {
                rotation: rotation_y(-0.2),
                translation: na::Vector3::new(0.0, 0.5, 0.0),
            },
        ),
    ];
    let visibility = vec![
        vec![0.0, 0.8, 0.0],
        vec![0.5, 0.0, 0.0],
        vec![0.0, 0.0, 0.0],
    ];
    let precomputed = vec![
        Some(precomputed(&[
            [0.01, 0.02],
            [-0.03, 0.01],
            [0.05, -0.04],
            [0.00, 0.03],
        ])),
        Some(precomputed(&[[0.02, 0.02], [-0.01, -0.01], [0.04, 0.00]])),
        Some(precomputed(&[[0.01, 0.01], [0.02, 0.02], [0.03, 0.03]])),
    ];
    SplitData {
        images,
        visibility,
        depths: vec![None, None, None],
        precomputed,
    }
}

fn test_config(dir: &TempDir) -> DumpConfig {
    DumpConfig {
        dump_prefix: dir.path().join("dump_root"),
        num_keypoints: 4,
        num_neighbors: 2,
        crop_center: true,
        precomputed_kp_source: Some("test".to_string()),
        worker_ratio: 0.4,
        sample_seed: 1234,
        degenerate_policy: DegeneratePolicy::Abort,
        splits: vec![SplitConfig {
            split: Split::Train,
            dataset_name: "synthetic".to_string(),
            data_dir: dir.path().join("unused"),
            visibility_threshold: 0.5,
            geodesic_metric: GeodesicMetric::Sampson,
            geodesic_threshold: 1e-3,
            max_samples: 10,
        }],
    }
}

#[test]
fn test_pair_enumeration_is_strict() {
    let dir = TempDir::new().unwrap();
    let data = synthetic_split(&dir);
    // (1, 0) scores exactly the threshold and must be excluded; zero
    // visibility pairs never appear.
    let pairs = enumerate_pairs(&data.visibility, 0.5);
    assert_eq!(pairs, vec![(0, 1)]);
}

#[test]
fn test_subsample_is_deterministic() {
    let pairs: Vec<(usize, usize)> = (0..20).map(|i| (i, i + 1)).collect();
    let a = subsample_pairs(&pairs, 5, 1234);
    let b = subsample_pairs(&pairs, 5, 1234);
    assert_eq!(a, b);
    assert_eq!(a.len(), 5);
    let c = subsample_pairs(&pairs, 25, 1234);
    assert_eq!(c.len(), 20);
}

#[test]
fn test_end_to_end_single_pair() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let split_cfg = &config.splits[0];
    let data = synthetic_split(&dir);
    let extractor = GridPatchExtractor::new(config.num_keypoints);

    let outcome = dump_split(&config, split_cfg, &data, &extractor).unwrap();
    assert!(!outcome.skipped);
    assert_eq!(outcome.pairs_built, 1);
    // 4 keypoints in image 0, K = 2 candidates each.
    assert_eq!(outcome.stats.total, 8);
    assert_eq!(
        outcome.stats.good + outcome.stats.bad,
        outcome.stats.total
    );

    let out_dir = &outcome.output_dir;
    assert!(out_dir.ends_with("synthetic/numkp-4/nn-2/tr-10"));
    assert!(out_dir.join("ready").exists());
    assert!(out_dir.join("dump").join("knn-0-1.json").exists());
    for (i, j) in [(1usize, 0usize), (0, 2), (2, 0), (1, 2), (2, 1)] {
        assert!(!out_dir.join("dump").join(format!("knn-{}-{}.json", i, j)).exists());
    }

    let xs: Vec<Vec<[f64; 4]>> =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("xs_tr.json")).unwrap())
            .unwrap();
    assert_eq!(xs.len(), 1);
    assert_eq!(xs[0].len(), 8);
    let ys: Vec<Vec<[f64; 2]>> =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("ys_tr.json")).unwrap())
            .unwrap();
    assert!(ys[0].iter().all(|l| l[0] >= 0.0 && l[1] >= 0.0));

    // Stored relative translation is unit length.
    let ts: Vec<[f64; 3]> =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("ts_tr.json")).unwrap())
            .unwrap();
    let norm = (ts[0][0] * ts[0][0] + ts[0][1] * ts[0][1] + ts[0][2] * ts[0][2]).sqrt();
    assert!((norm - 1.0).abs() < 1e-12);

    // A split with its marker present is skipped wholesale.
    let again = dump_split(&config, split_cfg, &data, &extractor).unwrap();
    assert!(again.skipped);
}

#[test]
fn test_marker_delete_rebuild_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let split_cfg = &config.splits[0];
    let data = synthetic_split(&dir);
    let extractor = GridPatchExtractor::new(config.num_keypoints);

    let outcome = dump_split(&config, split_cfg, &data, &extractor).unwrap();
    let xs_path = outcome.output_dir.join("xs_tr.json");
    let ys_path = outcome.output_dir.join("ys_tr.json");
    let first_xs = std::fs::read(&xs_path).unwrap();
    let first_ys = std::fs::read(&ys_path).unwrap();

    std::fs::remove_file(outcome.output_dir.join("ready")).unwrap();
    let rebuilt = dump_split(&config, split_cfg, &data, &extractor).unwrap();
    assert!(!rebuilt.skipped);
    assert_eq!(std::fs::read(&xs_path).unwrap(), first_xs);
    assert_eq!(std::fs::read(&ys_path).unwrap(), first_ys);
}

fn features_from(points: &[[f64; 2]]) -> ImageFeatures {
    let pre = precomputed(points);
    ImageFeatures {
        keypoints: pre
            .keypoints
            .iter()
            .map(|p| DVec2::new(p[0], p[1]))
            .collect(),
        depths: vec![1.0; pre.keypoints.len()],
        descriptors: pre.descriptors,
    }
}

#[test]
fn test_swapped_pair_inverts_pose() {
    let features_i = features_from(&[[0.01, 0.02], [0.03, -0.01]]);
    let features_j = features_from(&[[0.02, 0.01], [-0.02, 0.02]]);
    let pose_i = CameraPose {
        rotation: na::Matrix3::identity(),
        translation: na::Vector3::zeros(),
    };
    let pose_j = CameraPose {
        rotation: rotation_y(0.2),
        translation: na::Vector3::new(0.4, 0.1, 0.0),
    };
    let matches = MatchRecord {
        indices: vec![vec![0, 1], vec![1, 0]],
        distances: vec![vec![0.0, 1.0], vec![0.0, 1.0]],
    };

    let mut stats = SplitStats::default();
    let forward = build_pair_label(
        0,
        1,
        &features_i,
        &features_j,
        &pose_i,
        &pose_j,
        &matches,
        GeodesicMetric::Sampson,
        1e-3,
        DegeneratePolicy::Abort,
        &mut stats,
    )
    .unwrap()
    .unwrap();
    let backward = build_pair_label(
        1,
        0,
        &features_j,
        &features_i,
        &pose_j,
        &pose_i,
        &matches,
        GeodesicMetric::Sampson,
        1e-3,
        DegeneratePolicy::Abort,
        &mut stats,
    )
    .unwrap()
    .unwrap();

    assert!((forward.rotation.transpose() - backward.rotation).norm() < 1e-12);
    assert!((forward.translation.norm() - 1.0).abs() < 1e-12);
    assert!((backward.translation.norm() - 1.0).abs() < 1e-12);
    // dt_ji = -dR_ji * dt_ij up to the unit normalization.
    let expected = -(backward.rotation * forward.translation);
    assert!((expected - backward.translation).norm() < 1e-9);
}

#[test]
fn test_degenerate_pair_policies() {
    let features = features_from(&[[0.01, 0.02]]);
    let pose = CameraPose {
        rotation: na::Matrix3::identity(),
        translation: na::Vector3::new(0.3, 0.2, 0.1),
    };
    let matches = MatchRecord {
        indices: vec![vec![0]],
        distances: vec![vec![0.0]],
    };

    let mut stats = SplitStats::default();
    let aborted = build_pair_label(
        0,
        1,
        &features,
        &features,
        &pose,
        &pose,
        &matches,
        GeodesicMetric::Sampson,
        1e-3,
        DegeneratePolicy::Abort,
        &mut stats,
    );
    assert!(matches!(aborted, Err(Error::DegeneratePair { .. })));

    let skipped = build_pair_label(
        0,
        1,
        &features,
        &features,
        &pose,
        &pose,
        &matches,
        GeodesicMetric::Sampson,
        1e-3,
        DegeneratePolicy::Skip,
        &mut stats,
    )
    .unwrap();
    assert!(skipped.is_none());
    // A skipped pair contributes nothing to the statistics.
    assert_eq!(stats.total, 0);
}

#[test]
fn test_stats_accumulate_over_combinations() {
    let mut stats = SplitStats::default();
    for good in [true, true, false, true] {
        stats.record(good);
    }
    assert_eq!(stats.total, 4);
    assert_eq!(stats.good, 3);
    assert_eq!(stats.bad, 1);
    assert!((stats.good_ratio().unwrap() - 0.75).abs() < 1e-12);
    assert!((stats.bad_ratio().unwrap() - 0.25).abs() < 1e-12);
}
