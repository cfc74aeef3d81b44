//! Configuration structures for the chart judgment pipeline.
//!
//! This module defines all tunable parameters for chart analysis,
//! organized into logical groups for detection, sampling, judgment and output.
//!
//! # Configuration Loading
//!
//! Configuration can be loaded from JSON files or constructed programmatically:
//!
//! ```no_run
//! use chart_judge::EngineConfig;
//! use std::path::Path;
//!
//! // Load from file
//! let config = EngineConfig::from_json_file(Path::new("config.json"))?;
//!
//! // Or use defaults
//! let config = EngineConfig::default();
//! # Ok::<(), chart_judge::JudgeError>(())
//! ```
//!
//! Every section is `#[serde(default)]`, so a file only needs to name the
//! values it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::color::DeltaEMetric;
use crate::constants::{annotation, detection, sampling};
use crate::error::{JudgeError, Result};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chart locator configuration
    pub locator: LocatorConfig,

    /// Patch sampler configuration
    pub sampler: SamplerConfig,

    /// Judgment configuration
    pub judgment: JudgmentConfig,

    /// Output writer configuration
    pub output: OutputConfig,
}

/// Chart locator parameters.
///
/// Controls how patch candidates are extracted from the mask and which
/// chart placements are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Images larger than this are downscaled before detection
    pub max_working_pixels: u32,

    /// Minimum candidate quadrilateral area in working pixels
    pub min_patch_area_px: f64,

    /// Maximum candidate area as fraction of the working image
    pub max_patch_area_ratio: f64,

    /// Polygon approximation epsilon as fraction of perimeter
    pub poly_approx_epsilon: f64,

    /// Minimum candidate aspect ratio
    pub min_aspect_ratio: f64,

    /// Maximum candidate aspect ratio
    pub max_aspect_ratio: f64,

    /// Minimum contour-area / quadrilateral-area ratio
    pub min_rectangularity: f64,

    /// Matching radius as fraction of candidate side length
    pub match_tolerance: f64,

    /// Maximum homography refits per hypothesis
    pub refine_iterations: usize,

    /// Minimum fraction of chart patches a placement must match
    pub min_patch_coverage: f64,

    /// Placements with a larger fit residual are rejected
    pub max_fit_residual: f64,

    /// Minimum confidence (0.0-1.0) for a detection to be reported
    pub min_confidence: f32,

    /// Maximum number of candidates considered
    pub max_candidates: usize,

    /// Also segment against the chart body color observed in the image
    pub adaptive_frame: bool,

    /// Minimum share of working pixels in a lightness mode taken as the frame
    pub frame_mode_min_fraction: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            max_working_pixels: detection::MAX_WORKING_PIXELS,
            min_patch_area_px: detection::MIN_PATCH_AREA_PX,
            max_patch_area_ratio: detection::MAX_PATCH_AREA_RATIO,
            poly_approx_epsilon: detection::POLY_APPROX_EPSILON,
            min_aspect_ratio: detection::MIN_ASPECT_RATIO,
            max_aspect_ratio: detection::MAX_ASPECT_RATIO,
            min_rectangularity: detection::MIN_RECTANGULARITY,
            match_tolerance: detection::MATCH_TOLERANCE,
            refine_iterations: detection::REFINE_ITERATIONS,
            min_patch_coverage: detection::MIN_PATCH_COVERAGE,
            max_fit_residual: detection::MAX_FIT_RESIDUAL,
            min_confidence: detection::MIN_CONFIDENCE,
            max_candidates: detection::MAX_CANDIDATES,
            adaptive_frame: true,
            frame_mode_min_fraction: detection::FRAME_MODE_MIN_FRACTION,
        }
    }
}

/// Patch sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Fraction of each patch edge excluded from sampling (0.0-0.5)
    pub sample_inset: f64,

    /// Fraction discarded at each luminance extreme (0.0-0.5)
    pub trim_fraction: f64,

    /// Minimum pixels after trimming
    pub min_pixels: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_inset: sampling::SAMPLE_INSET,
            trim_fraction: sampling::TRIM_FRACTION,
            min_pixels: sampling::MIN_PIXELS,
        }
    }
}

/// Judgment parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgmentConfig {
    /// Color difference formula used for per-patch deviation
    pub metric: DeltaEMetric,
}

/// Output image parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Draw patch outlines and deviation bars
    pub annotate: bool,

    /// Apply white balance estimated from neutral patches
    pub white_balance: bool,

    /// Allow the destination to be the source image
    pub allow_overwrite: bool,

    /// Outline thickness in pixels
    pub line_thickness: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            annotate: true,
            white_balance: false,
            allow_overwrite: false,
            line_thickness: annotation::LINE_THICKNESS,
        }
    }
}

impl EngineConfig {
    /// Check that every parameter lies in its valid range
    pub fn validate(&self) -> Result<()> {
        let l = &self.locator;
        if l.max_working_pixels == 0 {
            return Err(JudgeError::invalid_parameter("locator.max_working_pixels", l.max_working_pixels));
        }
        if !(l.poly_approx_epsilon > 0.0 && l.poly_approx_epsilon < 0.5) {
            return Err(JudgeError::invalid_parameter("locator.poly_approx_epsilon", l.poly_approx_epsilon));
        }
        if !(l.min_aspect_ratio > 0.0 && l.min_aspect_ratio <= l.max_aspect_ratio) {
            return Err(JudgeError::invalid_parameter(
                "locator.min_aspect_ratio",
                format!("{} (max {})", l.min_aspect_ratio, l.max_aspect_ratio),
            ));
        }
        if !(l.max_patch_area_ratio > 0.0 && l.max_patch_area_ratio <= 1.0) {
            return Err(JudgeError::invalid_parameter("locator.max_patch_area_ratio", l.max_patch_area_ratio));
        }
        if !(l.min_rectangularity >= 0.0 && l.min_rectangularity <= 1.0) {
            return Err(JudgeError::invalid_parameter("locator.min_rectangularity", l.min_rectangularity));
        }
        if !(l.match_tolerance > 0.0) {
            return Err(JudgeError::invalid_parameter("locator.match_tolerance", l.match_tolerance));
        }
        if l.refine_iterations == 0 {
            return Err(JudgeError::invalid_parameter("locator.refine_iterations", l.refine_iterations));
        }
        if !(l.min_patch_coverage > 0.0 && l.min_patch_coverage <= 1.0) {
            return Err(JudgeError::invalid_parameter("locator.min_patch_coverage", l.min_patch_coverage));
        }
        if !(l.max_fit_residual > 0.0) {
            return Err(JudgeError::invalid_parameter("locator.max_fit_residual", l.max_fit_residual));
        }
        if !(0.0..=1.0).contains(&l.min_confidence) {
            return Err(JudgeError::invalid_parameter("locator.min_confidence", l.min_confidence));
        }
        if l.max_candidates == 0 {
            return Err(JudgeError::invalid_parameter("locator.max_candidates", l.max_candidates));
        }
        if !(l.frame_mode_min_fraction > 0.0 && l.frame_mode_min_fraction < 1.0) {
            return Err(JudgeError::invalid_parameter(
                "locator.frame_mode_min_fraction",
                l.frame_mode_min_fraction,
            ));
        }

        let s = &self.sampler;
        if !(0.0..0.5).contains(&s.sample_inset) {
            return Err(JudgeError::invalid_parameter("sampler.sample_inset", s.sample_inset));
        }
        if !(0.0..0.5).contains(&s.trim_fraction) {
            return Err(JudgeError::invalid_parameter("sampler.trim_fraction", s.trim_fraction));
        }
        if s.min_pixels == 0 {
            return Err(JudgeError::invalid_parameter("sampler.min_pixels", s.min_pixels));
        }

        if self.output.line_thickness == 0 {
            return Err(JudgeError::invalid_parameter("output.line_thickness", self.output.line_thickness));
        }
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| JudgeError::config(path, "cannot read configuration", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| JudgeError::config(path, "cannot parse configuration", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| JudgeError::config(path, "cannot serialize configuration", e))?;
        std::fs::write(path, json)
            .map_err(|e| JudgeError::config(path, "cannot write configuration", e))?;
        Ok(())
    }
}
