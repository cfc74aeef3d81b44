//! White balance estimation and correction
//!
//! Fits per-channel gains in linear RGB so that the chart's neutral
//! patches, as photographed, map onto their reference values. Gains are
//! the least-squares solution of `reference ≈ gain × measured` over all
//! sampled neutral patches.

use image::{Rgb, RgbImage};
use log::{debug, info};
use palette::{FromColor, LinSrgb, Srgb};

use crate::color::ColorConverter;
use crate::constants::reference::NEUTRAL_MAX_CHROMA;
use crate::judgment::ChartJudgment;

/// Per-channel linear RGB gains
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhiteBalance {
    gains: [f32; 3],
}

impl WhiteBalance {
    pub fn from_gains(gains: [f32; 3]) -> Self {
        Self { gains }
    }

    pub fn gains(&self) -> [f32; 3] {
        self.gains
    }

    /// Apply the gains to every pixel, clipping to the sRGB gamut
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        let linear: Vec<f32> = (0..=255u8)
            .map(|v| Srgb::new(v as f32 / 255.0, 0.0, 0.0).into_linear::<f32>().red)
            .collect();
        let [gr, gg, gb] = self.gains;

        RgbImage::from_fn(image.width(), image.height(), |x, y| {
            let [r, g, b] = image.get_pixel(x, y).0;
            let corrected = LinSrgb::new(
                (linear[r as usize] * gr).clamp(0.0, 1.0),
                (linear[g as usize] * gg).clamp(0.0, 1.0),
                (linear[b as usize] * gb).clamp(0.0, 1.0),
            );
            let srgb: Srgb<f32> = Srgb::from_linear(corrected);
            Rgb([
                (srgb.red * 255.0).round() as u8,
                (srgb.green * 255.0).round() as u8,
                (srgb.blue * 255.0).round() as u8,
            ])
        })
    }
}

/// Estimates white balance from the neutral patches of a judged chart
#[derive(Debug, Clone)]
pub struct WhiteBalanceEstimator {
    converter: ColorConverter,
    /// Reference chroma below which a patch counts as neutral
    max_chroma: f32,
}

impl Default for WhiteBalanceEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl WhiteBalanceEstimator {
    /// Create a new estimator with default settings
    pub fn new() -> Self {
        Self::with_params(NEUTRAL_MAX_CHROMA)
    }

    pub fn with_params(max_chroma: f32) -> Self {
        Self {
            converter: ColorConverter::new(),
            max_chroma,
        }
    }

    /// Estimate gains from the sampled neutral patches
    ///
    /// Returns `None` when no neutral patch was sampled or a channel has
    /// no signal.
    pub fn estimate(&self, judgment: &ChartJudgment) -> Option<WhiteBalance> {
        let mut measured_sq = [0.0f64; 3];
        let mut cross = [0.0f64; 3];
        let mut used = 0usize;

        for patch in judgment.patches() {
            if self.converter.chroma(patch.reference) >= self.max_chroma {
                continue;
            }
            let Some(sampled) = patch.sampled else {
                continue;
            };
            let m = LinSrgb::from_color(sampled);
            let r = LinSrgb::from_color(patch.reference);
            for (c, (mv, rv)) in [(m.red, r.red), (m.green, r.green), (m.blue, r.blue)]
                .into_iter()
                .enumerate()
            {
                measured_sq[c] += (mv as f64) * (mv as f64);
                cross[c] += (mv as f64) * (rv as f64);
            }
            used += 1;
        }

        if used == 0 {
            debug!("No sampled neutral patches; skipping white balance");
            return None;
        }
        if measured_sq.iter().any(|v| *v < 1e-12) {
            debug!("Neutral patches have an empty channel; skipping white balance");
            return None;
        }

        let gains = [
            (cross[0] / measured_sq[0]) as f32,
            (cross[1] / measured_sq[1]) as f32,
            (cross[2] / measured_sq[2]) as f32,
        ];
        info!(
            "White balance from {} neutral patches: gains {:.3} {:.3} {:.3}",
            used, gains[0], gains[1], gains[2]
        );
        Some(WhiteBalance::from_gains(gains))
    }
}
