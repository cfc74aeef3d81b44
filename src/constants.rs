//! Default thresholds and reference values for chart judgment
//!
//! This module contains compile-time constants used as configuration
//! defaults and as fixed parameters of the detection and sampling stages.

/// Chart locator defaults
pub mod detection {
    /// Maximum working-image size; larger inputs are downscaled before detection
    pub const MAX_WORKING_PIXELS: u32 = 2_000_000;

    /// Minimum patch candidate area in working-image pixels
    pub const MIN_PATCH_AREA_PX: f64 = 64.0;

    /// Maximum patch candidate area as fraction of working image
    pub const MAX_PATCH_AREA_RATIO: f64 = 0.25;

    /// Polygon approximation epsilon as fraction of perimeter (2%)
    pub const POLY_APPROX_EPSILON: f64 = 0.02;

    /// Minimum aspect ratio for a patch candidate
    pub const MIN_ASPECT_RATIO: f64 = 0.33;

    /// Maximum aspect ratio for a patch candidate
    pub const MAX_ASPECT_RATIO: f64 = 3.0;

    /// Minimum ratio between contour area and fitted quadrilateral area
    pub const MIN_RECTANGULARITY: f64 = 0.85;

    /// Distance from projected patch center to candidate centroid,
    /// as fraction of candidate side length
    pub const MATCH_TOLERANCE: f64 = 0.35;

    /// Homography refit iterations per hypothesis
    pub const REFINE_ITERATIONS: usize = 6;

    /// Matched patches needed before a hypothesis is refit projectively;
    /// smaller match sets are fit affinely
    pub const MIN_PROJECTIVE_MATCHES: usize = 4;

    /// Minimum share of working pixels in a lightness mode taken as the frame
    pub const FRAME_MODE_MIN_FRACTION: f64 = 0.01;

    /// Observed frame colors closer to nominal than this fraction of the
    /// frame tolerance add no second segmentation pass
    pub const FRAME_SHIFT_FRACTION: f32 = 0.5;

    /// Minimum fraction of chart patches matched by a placement
    pub const MIN_PATCH_COVERAGE: f64 = 0.5;

    /// Maximum combined fit residual for an accepted placement
    pub const MAX_FIT_RESIDUAL: f64 = 1.0;

    /// Minimum detection confidence before sampling is allowed
    pub const MIN_CONFIDENCE: f32 = 0.5;

    /// Upper bound on patch candidates considered (largest first)
    pub const MAX_CANDIDATES: usize = 96;

    /// Median ΔE that contributes one unit of fit residual
    pub const COLOR_RESIDUAL_SCALE: f64 = 100.0;
}

/// Patch sampler defaults
pub mod sampling {
    /// Fraction of each patch edge excluded from sampling
    pub const SAMPLE_INSET: f64 = 0.15;

    /// Fraction of pixels discarded at each luminance extreme
    pub const TRIM_FRACTION: f64 = 0.05;

    /// Minimum pixels remaining after trimming for a valid sample
    pub const MIN_PIXELS: usize = 10;
}

/// Reference chart values
pub mod reference {
    /// Default per-patch tolerance (ΔE) of the built-in chart
    pub const DEFAULT_TOLERANCE: f32 = 10.0;

    /// Default frame tolerance (ΔE) separating patches from the chart body
    pub const DEFAULT_FRAME_TOLERANCE: f32 = 8.0;

    /// Maximum reference chroma for a patch to count as neutral
    pub const NEUTRAL_MAX_CHROMA: f32 = 5.0;
}

/// Output annotation parameters
pub mod annotation {
    /// Outline color of passing patches
    pub const PASS_COLOR: [u8; 3] = [0, 200, 0];

    /// Outline color of failing patches
    pub const FAIL_COLOR: [u8; 3] = [230, 20, 20];

    /// Outline color of unsampled patches
    pub const UNSAMPLED_COLOR: [u8; 3] = [255, 170, 0];

    /// Outline color of the detected chart boundary
    pub const CHART_OUTLINE_COLOR: [u8; 3] = [0, 200, 255];

    /// Default outline thickness in pixels
    pub const LINE_THICKNESS: u32 = 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_ranges() {
        assert!(detection::MIN_ASPECT_RATIO < 1.0 && detection::MAX_ASPECT_RATIO > 1.0);
        assert!(detection::MIN_PATCH_COVERAGE > 0.0 && detection::MIN_PATCH_COVERAGE <= 1.0);
        assert!(detection::MIN_CONFIDENCE > 0.0 && detection::MIN_CONFIDENCE < 1.0);
    }

    #[test]
    fn test_sampling_ranges() {
        assert!(sampling::SAMPLE_INSET < 0.5);
        assert!(sampling::TRIM_FRACTION < 0.5);
    }
}
