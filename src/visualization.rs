use glam::DVec2;
use image::DynamicImage;
use rerun::RecordingStream;
use std::io::Cursor;

use crate::labels::PairLabel;
use crate::types::CameraIntrinsics;

pub fn log_image_as_compressed(
    recording: &RecordingStream,
    topic: &str,
    img: &DynamicImage,
    format: image::ImageFormat,
) {
    let mut bytes: Vec<u8> = Vec::new();

    img.to_luma8()
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();

    recording
        .log(
            format!("{}/image", topic),
            &rerun::Image::from_file_contents(bytes, None),
        )
        .unwrap();
}

/// Geodesic distance to a color: dark end of the gradient at zero, clipped
/// at three times the good/bad threshold.
pub fn geodesic_color(distance: f64, threshold: f64) -> (u8, u8, u8, u8) {
    let t = (distance / (3.0 * threshold)).clamp(0.0, 1.0);
    let c = colorous::TURBO.eval_continuous(t);
    (c.r, c.g, c.b, 255)
}

/// rerun use top left corner as (0, 0)
pub fn rerun_shift(p2ds: &[(f32, f32)]) -> Vec<(f32, f32)> {
    p2ds.iter().map(|(x, y)| (*x + 0.5, *y + 0.5)).collect()
}

/// Logs one pair's images and candidate correspondences, points colored by
/// their geodesic distance.
pub fn log_pair_correspondences(
    recording: &RecordingStream,
    topic: &str,
    img1: &DynamicImage,
    img2: &DynamicImage,
    label: &PairLabel,
    intrinsics1: &CameraIntrinsics,
    intrinsics2: &CameraIntrinsics,
    threshold: f64,
) {
    log_image_as_compressed(
        recording,
        format!("{}/img1", topic).as_str(),
        img1,
        image::ImageFormat::Jpeg,
    );
    log_image_as_compressed(
        recording,
        format!("{}/img2", topic).as_str(),
        img2,
        image::ImageFormat::Jpeg,
    );

    let (pts1, pts2): (Vec<_>, Vec<_>) = label
        .coordinates
        .iter()
        .map(|row| {
            let p1 = intrinsics1.denormalize(DVec2::new(row[0], row[1]));
            let p2 = intrinsics2.denormalize(DVec2::new(row[2], row[3]));
            ((p1.x as f32, p1.y as f32), (p2.x as f32, p2.y as f32))
        })
        .unzip();
    let colors: Vec<_> = label
        .labels
        .iter()
        .map(|l| geodesic_color(l[0], threshold))
        .collect();

    recording
        .log(
            format!("{}/img1/pts", topic),
            &rerun::Points2D::new(rerun_shift(&pts1))
                .with_colors(colors.clone())
                .with_radii([rerun::Radius::new_ui_points(3.0)]),
        )
        .unwrap();
    recording
        .log(
            format!("{}/img2/pts", topic),
            &rerun::Points2D::new(rerun_shift(&pts2))
                .with_colors(colors)
                .with_radii([rerun::Radius::new_ui_points(3.0)]),
        )
        .unwrap();
}
