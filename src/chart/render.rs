//! Reference chart rendering
//!
//! Draws a [`ChartSpec`] into an RGB image under an arbitrary placement.
//! Every pixel center is mapped back into chart coordinates and takes the
//! color of whatever it lands on (patch, chart body or background), with
//! no anti-aliasing, so rendered patch pixels carry the exact reference
//! color.

use image::{Rgb, RgbImage};
use nalgebra::Matrix3;

use crate::chart::ChartSpec;
use crate::color::ColorConverter;
use crate::detection::Homography;
use crate::error::{JudgeError, Result};

/// Similarity placement of a chart: top-left corner, pixel size, rotation
///
/// Rotation is clockwise on screen (image y axis points down) about the
/// chart's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPlacement {
    pub origin: [f64; 2],
    pub size: [f64; 2],
    pub rotation_deg: f64,
}

impl ChartPlacement {
    pub fn new(origin: [f64; 2], size: [f64; 2]) -> Self {
        Self {
            origin,
            size,
            rotation_deg: 0.0,
        }
    }

    pub fn rotated(mut self, rotation_deg: f64) -> Self {
        self.rotation_deg = rotation_deg;
        self
    }

    /// Chart of the given width centered in an image, height from `aspect_ratio`
    pub fn centered(image_size: [u32; 2], chart_width: f64, aspect_ratio: f64) -> Self {
        let chart_height = chart_width / aspect_ratio;
        Self::new(
            [
                (image_size[0] as f64 - chart_width) * 0.5,
                (image_size[1] as f64 - chart_height) * 0.5,
            ],
            [chart_width, chart_height],
        )
    }

    /// Mapping from normalized chart coordinates to image pixels
    pub fn homography(&self) -> Result<Homography> {
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let [w, h] = self.size;
        let [ox, oy] = self.origin;
        Homography::from_matrix(Matrix3::new(
            w * cos, -h * sin, ox,
            w * sin, h * cos, oy,
            0.0, 0.0, 1.0,
        ))
    }
}

/// Rendering parameters
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    /// Color outside the chart
    pub background: [u8; 3],
    /// Chart-to-image mapping
    pub placement: Homography,
    /// Patch index and replacement color
    pub overrides: Vec<(usize, [u8; 3])>,
}

impl RenderOptions {
    pub fn new(width: u32, height: u32, placement: Homography) -> Self {
        Self {
            width,
            height,
            background: [128, 128, 128],
            placement,
            overrides: Vec::new(),
        }
    }

    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.background = background;
        self
    }

    /// Paint patch `index` with `rgb` instead of its reference color
    pub fn with_override(mut self, index: usize, rgb: [u8; 3]) -> Self {
        self.overrides.push((index, rgb));
        self
    }
}

/// Render `spec` into a new image
///
/// # Errors
///
/// Returns `JudgeError::InvalidParameter` for an empty canvas or an
/// override index outside the chart, and `JudgeError::Internal` if the
/// placement cannot be inverted.
pub fn render_chart(spec: &ChartSpec, options: &RenderOptions) -> Result<RgbImage> {
    if options.width == 0 || options.height == 0 {
        return Err(JudgeError::invalid_parameter(
            "render size",
            format!("{}x{}", options.width, options.height),
        ));
    }

    let converter = ColorConverter::new();
    let mut patch_colors: Vec<[u8; 3]> = spec
        .patches()
        .iter()
        .map(|p| converter.lab_to_rgb8(p.reference))
        .collect();
    for &(index, rgb) in &options.overrides {
        let slot = patch_colors
            .get_mut(index)
            .ok_or_else(|| JudgeError::invalid_parameter("override patch index", index))?;
        *slot = rgb;
    }
    let frame = converter.lab_to_rgb8(spec.frame());
    let inverse = options.placement.inverse()?;

    let image = RgbImage::from_fn(options.width, options.height, |px, py| {
        let Some([u, v]) = inverse.project(px as f64 + 0.5, py as f64 + 0.5) else {
            return Rgb(options.background);
        };
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return Rgb(options.background);
        }
        let color = spec
            .patches()
            .iter()
            .position(|p| p.region.contains(u, v))
            .map(|i| patch_colors[i])
            .unwrap_or(frame);
        Rgb(color)
    });
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_aligned_render() {
        let spec = ChartSpec::color_checker_classic();
        let placement = ChartPlacement::new([100.0, 100.0], [600.0, 400.0])
            .homography()
            .unwrap();
        let image = render_chart(&spec, &RenderOptions::new(800, 600, placement)).unwrap();

        assert_eq!(image.get_pixel(5, 5), &Rgb([128, 128, 128]));
        // Chart border
        assert_eq!(image.get_pixel(105, 105), &Rgb([16, 16, 16]));
        // Center of the first patch: (0.05+0.015+0.06)*600+100, (0.0725+0.09)*400+100
        assert_eq!(image.get_pixel(175, 165), &Rgb([0x73, 0x52, 0x44]));
    }

    #[test]
    fn test_override_patch_color() {
        let spec = ChartSpec::color_checker_classic();
        let placement = ChartPlacement::new([0.0, 0.0], [600.0, 400.0])
            .homography()
            .unwrap();
        let options = RenderOptions::new(600, 400, placement).with_override(0, [1, 2, 3]);
        let image = render_chart(&spec, &options).unwrap();
        assert_eq!(image.get_pixel(75, 65), &Rgb([1, 2, 3]));

        let bad = RenderOptions::new(600, 400, placement).with_override(24, [0, 0, 0]);
        assert!(render_chart(&spec, &bad).is_err());
    }

    #[test]
    fn test_rotated_placement_maps_corners() {
        let placement = ChartPlacement::new([116.0, 50.0], [600.0, 400.0]).rotated(90.0);
        let h = placement.homography().unwrap();
        let tr = h.project(1.0, 0.0).unwrap();
        assert!((tr[0] - 116.0).abs() < 1e-9);
        assert!((tr[1] - 650.0).abs() < 1e-9);
    }

    #[test]
    fn test_centered_placement() {
        let placement = ChartPlacement::centered([800, 600], 600.0, 1.5);
        assert_eq!(placement.origin, [100.0, 100.0]);
        assert_eq!(placement.size, [600.0, 400.0]);
    }
}
