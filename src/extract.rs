use glam::DVec2;
use image::DynamicImage;

/// Opaque keypoint detector + descriptor contract. Implementations return
/// pixel coordinates and an index-aligned descriptor vector per point.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, img: &DynamicImage) -> (Vec<DVec2>, Vec<Vec<f32>>);
}

/// Classical fallback extractor: picks the strongest-gradient pixel per grid
/// cell and describes it with a mean-subtracted, L2-normalized luma patch.
/// Meant for datasets without precomputed keypoints; any learned detector
/// can replace it behind [`FeatureExtractor`].
pub struct GridPatchExtractor {
    pub max_features: usize,
    pub patch_radius: u32,
}

impl GridPatchExtractor {
    pub fn new(max_features: usize) -> GridPatchExtractor {
        GridPatchExtractor {
            max_features,
            patch_radius: 4,
        }
    }

    fn patch_descriptor(&self, luma: &image::GrayImage, x: u32, y: u32) -> Vec<f32> {
        let r = self.patch_radius;
        let mut desc: Vec<f32> = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
        for dy in -(r as i64)..=r as i64 {
            for dx in -(r as i64)..=r as i64 {
                let px = (x as i64 + dx) as u32;
                let py = (y as i64 + dy) as u32;
                desc.push(luma.get_pixel(px, py).0[0] as f32 / 255.0);
            }
        }
        let mean = desc.iter().sum::<f32>() / desc.len() as f32;
        for v in desc.iter_mut() {
            *v -= mean;
        }
        let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 1e-12 {
            for v in desc.iter_mut() {
                *v /= norm;
            }
        }
        desc
    }
}

fn gradient_magnitude(luma: &image::GrayImage, x: u32, y: u32) -> f32 {
    let v = |xx: u32, yy: u32| luma.get_pixel(xx, yy).0[0] as f32;
    let gx = v(x + 1, y) - v(x - 1, y);
    let gy = v(x, y + 1) - v(x, y - 1);
    gx * gx + gy * gy
}

impl FeatureExtractor for GridPatchExtractor {
    fn extract(&self, img: &DynamicImage) -> (Vec<DVec2>, Vec<Vec<f32>>) {
        let luma = img.to_luma8();
        let (w, h) = (luma.width(), luma.height());
        let margin = self.patch_radius + 1;
        if w <= 2 * margin || h <= 2 * margin || self.max_features == 0 {
            return (Vec::new(), Vec::new());
        }

        // One candidate per cell of a near-square grid, then keep the
        // strongest max_features responses.
        let cells = (self.max_features as f64).sqrt().ceil() as u32;
        let cell_w = ((w - 2 * margin) as f64 / cells as f64).max(1.0);
        let cell_h = ((h - 2 * margin) as f64 / cells as f64).max(1.0);

        let mut candidates: Vec<(f32, u32, u32)> = Vec::new();
        for cr in 0..cells {
            for cc in 0..cells {
                let x0 = margin + (cc as f64 * cell_w) as u32;
                let y0 = margin + (cr as f64 * cell_h) as u32;
                let x1 = (margin + ((cc + 1) as f64 * cell_w) as u32).min(w - margin);
                let y1 = (margin + ((cr + 1) as f64 * cell_h) as u32).min(h - margin);
                let mut best: Option<(f32, u32, u32)> = None;
                for y in y0..y1 {
                    for x in x0..x1 {
                        let g = gradient_magnitude(&luma, x, y);
                        if best.map(|(bg, _, _)| g > bg).unwrap_or(true) {
                            best = Some((g, x, y));
                        }
                    }
                }
                if let Some(c) = best {
                    candidates.push(c);
                }
            }
        }
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(self.max_features);

        let mut points = Vec::with_capacity(candidates.len());
        let mut descriptors = Vec::with_capacity(candidates.len());
        for (_, x, y) in candidates {
            points.push(DVec2::new(x as f64, y as f64));
            descriptors.push(self.patch_descriptor(&luma, x, y));
        }
        (points, descriptors)
    }
}
