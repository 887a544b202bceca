use glam::DVec2;
use nalgebra as na;

use crate::config::GeodesicMetric;
use crate::types::CameraPose;

/// Relative pose mapping camera i's frame into camera j's:
/// dR = R_j * R_i^T, dt = t_j - dR * t_i. No normalization here.
pub fn relative_pose(
    pose_i: &CameraPose,
    pose_j: &CameraPose,
) -> (na::Matrix3<f64>, na::Vector3<f64>) {
    let dr = pose_j.rotation * pose_i.rotation.transpose();
    let dt = pose_j.translation - dr * pose_i.translation;
    (dr, dt)
}

pub fn skew(v: &na::Vector3<f64>) -> na::Matrix3<f64> {
    na::Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Essential matrix E = [dt]x * dR for the epipolar constraint
/// x2^T E x1 = 0 on canonical-plane coordinates.
pub fn essential_matrix(dr: &na::Matrix3<f64>, dt: &na::Vector3<f64>) -> na::Matrix3<f64> {
    skew(dt) * dr
}

/// Lift a normalized point to 3-D with its depth, move it through (dR, dt)
/// and project back by perspective division. Undefined when the transformed
/// depth is near zero; callers guard against degenerate depth.
pub fn project_with_depth(
    p: DVec2,
    depth: f64,
    dr: &na::Matrix3<f64>,
    dt: &na::Vector3<f64>,
) -> DVec2 {
    let lifted = na::Vector3::new(p.x * depth, p.y * depth, depth);
    let moved = dr * lifted + dt;
    DVec2::new(moved.x / moved.z, moved.y / moved.z)
}

fn homogeneous(p: DVec2) -> na::Vector3<f64> {
    na::Vector3::new(p.x, p.y, 1.0)
}

/// Sampson distance: (x2^T E x1)^2 / ((Ex1)_0^2 + (Ex1)_1^2 + (E^Tx2)_0^2 + (E^Tx2)_1^2).
pub fn sampson_distance(e: &na::Matrix3<f64>, x1: DVec2, x2: DVec2) -> f64 {
    let p1 = homogeneous(x1);
    let p2 = homogeneous(x2);
    let ex1 = e * p1;
    let etx2 = e.transpose() * p2;
    let num = p2.dot(&ex1);
    let denom = ex1.x * ex1.x + ex1.y * ex1.y + etx2.x * etx2.x + etx2.y * etx2.y;
    if denom <= 1e-18 {
        return f64::INFINITY;
    }
    num * num / denom
}

/// Squared epipolar error: (x2^T E x1)^2.
pub fn epipolar_squared(e: &na::Matrix3<f64>, x1: DVec2, x2: DVec2) -> f64 {
    let num = homogeneous(x2).dot(&(e * homogeneous(x1)));
    num * num
}

/// Symmetric epipolar error: squared error weighted by both epipolar line
/// gradients.
pub fn epipolar_symmetric(e: &na::Matrix3<f64>, x1: DVec2, x2: DVec2) -> f64 {
    let p1 = homogeneous(x1);
    let p2 = homogeneous(x2);
    let ex1 = e * p1;
    let etx2 = e.transpose() * p2;
    let num = p2.dot(&ex1);
    let d1 = ex1.x * ex1.x + ex1.y * ex1.y;
    let d2 = etx2.x * etx2.x + etx2.y * etx2.y;
    if d1 <= 1e-18 || d2 <= 1e-18 {
        return f64::INFINITY;
    }
    num * num * (1.0 / d1 + 1.0 / d2)
}

impl GeodesicMetric {
    /// One non-negative distance per corresponding point pair.
    pub fn evaluate(
        &self,
        x1s: &[DVec2],
        x2s: &[DVec2],
        dr: &na::Matrix3<f64>,
        dt: &na::Vector3<f64>,
    ) -> Vec<f64> {
        debug_assert_eq!(x1s.len(), x2s.len());
        let e = essential_matrix(dr, dt);
        let f: fn(&na::Matrix3<f64>, DVec2, DVec2) -> f64 = match self {
            GeodesicMetric::Sampson => sampson_distance,
            GeodesicMetric::EpipolarSquared => epipolar_squared,
            GeodesicMetric::EpipolarSymmetric => epipolar_symmetric,
        };
        x1s.iter()
            .zip(x2s.iter())
            .map(|(&x1, &x2)| f(&e, x1, x2))
            .collect()
    }
}
