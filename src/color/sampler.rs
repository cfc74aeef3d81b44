//! Patch color sampling
//!
//! Projects each patch region through the detected chart placement and
//! aggregates the enclosed pixels into one Lab color:
//! - the full patch region must lie inside the image, otherwise the patch
//!   is reported as unsampled
//! - only the inset core of the patch is read, away from printed edges
//! - pixels are sorted by luminance and a fraction is trimmed at each end
//!   to suppress specular highlights and shadows
//! - the remaining pixels are averaged in Lab

use log::debug;
use palette::Lab;

use crate::chart::ChartSpec;
use crate::color::ColorConverter;
use crate::config::SamplerConfig;
use crate::constants::sampling::{MIN_PIXELS, SAMPLE_INSET, TRIM_FRACTION};
use crate::detection::ChartInstance;
use crate::error::Result;
use crate::image_loader::Image;

/// Why a patch produced no color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsampledReason {
    /// Projected patch region extends past the image bounds
    OutOfBounds,
    /// Fewer usable pixels than the configured minimum
    TooFewPixels { found: usize },
}

impl std::fmt::Display for UnsampledReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnsampledReason::OutOfBounds => f.write_str("outside image bounds"),
            UnsampledReason::TooFewPixels { found } => write!(f, "only {} usable pixels", found),
        }
    }
}

/// Representative color of one patch
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatchSample {
    Sampled { lab: Lab, pixel_count: usize },
    Unsampled(UnsampledReason),
}

impl PatchSample {
    pub fn is_sampled(&self) -> bool {
        matches!(self, PatchSample::Sampled { .. })
    }

    pub fn lab(&self) -> Option<Lab> {
        match self {
            PatchSample::Sampled { lab, .. } => Some(*lab),
            PatchSample::Unsampled(_) => None,
        }
    }

    /// Pixels that contributed to the mean (0 when unsampled)
    pub fn pixel_count(&self) -> usize {
        match self {
            PatchSample::Sampled { pixel_count, .. } => *pixel_count,
            PatchSample::Unsampled(_) => 0,
        }
    }
}

/// Patch sampler with luminance-trimmed averaging
#[derive(Debug, Clone)]
pub struct PatchSampler {
    converter: ColorConverter,
    sample_inset: f64,
    trim_fraction: f64,
    min_pixels: usize,
}

impl Default for PatchSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchSampler {
    /// Create a new sampler with default parameters
    pub fn new() -> Self {
        Self::with_params(SAMPLE_INSET, TRIM_FRACTION, MIN_PIXELS)
    }

    /// Create a sampler with custom parameters
    pub fn with_params(sample_inset: f64, trim_fraction: f64, min_pixels: usize) -> Self {
        Self {
            converter: ColorConverter::new(),
            sample_inset,
            trim_fraction,
            min_pixels,
        }
    }

    pub fn from_config(config: &SamplerConfig) -> Self {
        Self::with_params(config.sample_inset, config.trim_fraction, config.min_pixels)
    }

    /// Sample every patch of `spec`, in chart order
    ///
    /// Returns exactly one entry per patch. Patches that cannot be read
    /// are `Unsampled`, never dropped.
    pub fn sample(
        &self,
        image: &Image,
        instance: &ChartInstance,
        spec: &ChartSpec,
    ) -> Result<Vec<PatchSample>> {
        let samples: Vec<PatchSample> = spec
            .patches()
            .iter()
            .enumerate()
            .map(|(index, patch)| {
                let sample = self.sample_patch(image, instance, &patch.region);
                debug!("Patch {} ({}): {:?}", index, patch.name, sample);
                sample
            })
            .collect();

        let sampled = samples.iter().filter(|s| s.is_sampled()).count();
        debug!("Sampled {}/{} patches", sampled, samples.len());
        Ok(samples)
    }

    fn sample_patch(
        &self,
        image: &Image,
        instance: &ChartInstance,
        region: &crate::chart::NormalizedRect,
    ) -> PatchSample {
        let (width, height) = (image.width() as f64, image.height() as f64);
        let homography = instance.homography();

        let inside = homography
            .project_all(&region.corners())
            .map(|corners| {
                corners
                    .iter()
                    .all(|[x, y]| *x >= 0.0 && *x <= width && *y >= 0.0 && *y <= height)
            })
            .unwrap_or(false);
        if !inside {
            return PatchSample::Unsampled(UnsampledReason::OutOfBounds);
        }

        let core = region.inset(self.sample_inset);
        let Some(core_corners) = homography.project_all(&core.corners()) else {
            return PatchSample::Unsampled(UnsampledReason::OutOfBounds);
        };

        let min_x = core_corners.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
        let max_x = core_corners.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max);
        let min_y = core_corners.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
        let max_y = core_corners.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max);

        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().min(width) as u32).min(image.width());
        let y1 = (max_y.ceil().min(height) as u32).min(image.height());

        let inverse = instance.inverse();
        let pixels = image.pixels();
        let mut labs = Vec::new();
        for py in y0..y1 {
            for px in x0..x1 {
                let Some([u, v]) = inverse.project(px as f64 + 0.5, py as f64 + 0.5) else {
                    continue;
                };
                if core.contains(u, v) {
                    let [r, g, b] = pixels.get_pixel(px, py).0;
                    labs.push(self.converter.rgb_to_lab(r, g, b));
                }
            }
        }

        self.aggregate(labs)
    }

    /// Luminance-trimmed mean of a pixel set
    fn aggregate(&self, mut labs: Vec<Lab>) -> PatchSample {
        labs.sort_by(|a, b| a.l.total_cmp(&b.l));
        let trim = (labs.len() as f64 * self.trim_fraction).floor() as usize;
        let kept = if labs.len() > 2 * trim {
            &labs[trim..labs.len() - trim]
        } else {
            &labs[0..0]
        };

        if kept.is_empty() || kept.len() < self.min_pixels {
            return PatchSample::Unsampled(UnsampledReason::TooFewPixels { found: kept.len() });
        }

        let n = kept.len() as f64;
        let (sl, sa, sb) = kept.iter().fold((0.0f64, 0.0f64, 0.0f64), |acc, lab| {
            (acc.0 + lab.l as f64, acc.1 + lab.a as f64, acc.2 + lab.b as f64)
        });
        PatchSample::Sampled {
            lab: Lab::new((sl / n) as f32, (sa / n) as f32, (sb / n) as f32),
            pixel_count: kept.len(),
        }
    }
}
