use image::imageops::{self, FilterType};

use super::FeatureExtractor;
use crate::camera::Frame;
use crate::error::SessionError;

/// Default thumbnail edge length in pixels.
pub const DEFAULT_GRID: u32 = 16;
/// Largest thumbnail edge accepted from configuration.
pub const MAX_GRID: u32 = 256;

/// Embeds a frame as a downscaled, mean-centred, L2-normalised RGB thumbnail.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailExtractor {
    grid: u32,
}

impl ThumbnailExtractor {
    pub fn new(grid: u32) -> Self {
        Self { grid: grid.max(1) }
    }
}

impl Default for ThumbnailExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_GRID)
    }
}

impl FeatureExtractor for ThumbnailExtractor {
    fn dimension(&self) -> usize {
        let edge = self.grid as usize;
        edge * edge * 3
    }

    fn extract(&self, frame: &Frame) -> Result<Vec<f32>, SessionError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(SessionError::CaptureError("frame has no pixels".into()));
        }
        let thumb = imageops::resize(frame, self.grid, self.grid, FilterType::Triangle);
        let mut values: Vec<f32> = thumb
            .pixels()
            .flat_map(|pixel| pixel.0)
            .map(|channel| channel as f32 / 255.0)
            .collect();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        for value in values.iter_mut() {
            *value -= mean;
        }
        normalize_l2_in_place(&mut values);
        Ok(values)
    }
}

/// Normalize a vector in-place and return whether the norm was non-zero.
pub(crate) fn normalize_l2_in_place(values: &mut [f32]) -> bool {
    let sum: f32 = values.iter().map(|value| value * value).sum();
    if !sum.is_finite() || sum <= 0.0 {
        return false;
    }
    let norm = sum.sqrt();
    for value in values {
        *value /= norm;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32, flip: bool) -> Frame {
        RgbImage::from_fn(width, height, |x, _| {
            let level = (x * 255 / width.max(1)) as u8;
            let level = if flip { 255 - level } else { level };
            Rgb([level, level / 2, 255 - level])
        })
    }

    #[test]
    fn output_has_declared_dimension_and_unit_norm() {
        let extractor = ThumbnailExtractor::new(8);
        let values = extractor.extract(&gradient(64, 48, false)).unwrap();
        assert_eq!(values.len(), extractor.dimension());
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = ThumbnailExtractor::default();
        let frame = gradient(40, 30, false);
        assert_eq!(
            extractor.extract(&frame).unwrap(),
            extractor.extract(&frame).unwrap()
        );
    }

    #[test]
    fn flat_frame_embeds_to_zero_vector() {
        let extractor = ThumbnailExtractor::new(4);
        let values = extractor
            .extract(&RgbImage::from_pixel(10, 10, Rgb([90, 90, 90])))
            .unwrap();
        assert!(values.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn different_scenes_produce_distinct_embeddings() {
        let extractor = ThumbnailExtractor::new(8);
        let a = extractor.extract(&gradient(32, 32, false)).unwrap();
        let b = extractor.extract(&gradient(32, 32, true)).unwrap();
        let sim = crate::classifier::cosine_similarity(&a, &b);
        assert!(sim < 0.9);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn dimension_of_large_grid_does_not_wrap() {
        let extractor = ThumbnailExtractor::new(40_000);
        assert_eq!(extractor.dimension(), 4_800_000_000);
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        let mut values = [0.0_f32; 3];
        assert!(!normalize_l2_in_place(&mut values));
    }
}
