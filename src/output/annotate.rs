//! Judgment overlay drawing
//!
//! Draws the detected chart boundary, one outline per patch colored by its
//! status, and a bar along the bottom of each sampled patch whose length
//! grows with deviation / tolerance (full patch width at twice the
//! tolerance).

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::chart::ChartSpec;
use crate::constants::annotation::{
    CHART_OUTLINE_COLOR, FAIL_COLOR, PASS_COLOR, UNSAMPLED_COLOR,
};
use crate::detection::ChartInstance;
use crate::judgment::{ChartJudgment, PatchStatus};

/// Deviation / tolerance ratio drawn as a full-width bar
const FULL_BAR_RATIO: f32 = 2.0;

/// Overlay the judgment on `image` in place
pub fn annotate(
    image: &mut RgbImage,
    instance: &ChartInstance,
    spec: &ChartSpec,
    judgment: &ChartJudgment,
    thickness: u32,
) {
    if let Some(outline) = instance.outline() {
        draw_polygon(image, &outline, Rgb(CHART_OUTLINE_COLOR), thickness);
    }

    let homography = instance.homography();
    for (patch, result) in spec.patches().iter().zip(judgment.patches()) {
        let color = match result.status {
            PatchStatus::Passed => PASS_COLOR,
            PatchStatus::Failed => FAIL_COLOR,
            PatchStatus::Unsampled(_) => UNSAMPLED_COLOR,
        };
        let region = patch.region.inset(0.05);
        if let Some(corners) = homography.project_all(&region.corners()) {
            draw_polygon(image, &corners, Rgb(color), thickness);
        }

        let Some(deviation) = result.deviation else {
            continue;
        };
        let fraction = (deviation / result.tolerance / FULL_BAR_RATIO).clamp(0.0, 1.0) as f64;
        if fraction <= 0.0 {
            continue;
        }
        let bar_y = region.y1 - region.height() * 0.12;
        let start = homography.project(region.x0 + region.width() * 0.08, bar_y);
        let end = homography.project(
            region.x0 + region.width() * (0.08 + 0.84 * fraction),
            bar_y,
        );
        if let (Some(start), Some(end)) = (start, end) {
            draw_thick_line(image, start, end, Rgb(color), thickness * 2);
        }
    }
}

fn draw_polygon(image: &mut RgbImage, points: &[[f64; 2]], color: Rgb<u8>, thickness: u32) {
    for i in 0..points.len() {
        draw_thick_line(image, points[i], points[(i + 1) % points.len()], color, thickness);
    }
}

/// Line drawn as parallel one-pixel segments offset along the normal
fn draw_thick_line(
    image: &mut RgbImage,
    start: [f64; 2],
    end: [f64; 2],
    color: Rgb<u8>,
    thickness: u32,
) {
    let (dx, dy) = (end[0] - start[0], end[1] - start[1]);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-9 {
        return;
    }
    let (nx, ny) = (-dy / len, dx / len);
    let half = (thickness.max(1) as f64 - 1.0) * 0.5;
    let steps = thickness.max(1) * 2 - 1;
    for step in 0..steps {
        let offset = -half + step as f64 * 0.5;
        draw_line_segment_mut(
            image,
            ((start[0] + nx * offset) as f32, (start[1] + ny * offset) as f32),
            ((end[0] + nx * offset) as f32, (end[1] + ny * offset) as f32),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartPlacement;
    use crate::color::{PatchSample, UnsampledReason};
    use crate::judgment::JudgmentEngine;
    use palette::Lab;

    #[test]
    fn test_annotation_colors_by_status() {
        let spec = ChartSpec::color_checker_classic();
        let placement = ChartPlacement::new([0.0, 0.0], [600.0, 400.0]);
        let instance = ChartInstance::new(placement.homography().unwrap(), (600, 400), 1.0).unwrap();

        let mut samples: Vec<PatchSample> = spec
            .patches()
            .iter()
            .map(|p| PatchSample::Sampled {
                lab: p.reference,
                pixel_count: 100,
            })
            .collect();
        samples[0] = PatchSample::Sampled {
            lab: Lab::new(0.0, 0.0, 0.0),
            pixel_count: 100,
        };
        samples[1] = PatchSample::Unsampled(UnsampledReason::OutOfBounds);
        let judgment = JudgmentEngine::new().judge(&samples, &spec).unwrap();

        let mut image = RgbImage::new(600, 400);
        annotate(&mut image, &instance, &spec, &judgment, 3);

        let has = |color: [u8; 3]| image.pixels().any(|p| p.0 == color);
        assert!(has(PASS_COLOR));
        assert!(has(FAIL_COLOR));
        assert!(has(UNSAMPLED_COLOR));
        assert!(has(CHART_OUTLINE_COLOR));
    }

    #[test]
    fn test_thick_line_width() {
        let mut image = RgbImage::new(20, 20);
        draw_thick_line(&mut image, [2.0, 10.0], [18.0, 10.0], Rgb([255, 0, 0]), 3);
        let column: Vec<bool> = (0..20).map(|y| image.get_pixel(10, y)[0] == 255).collect();
        assert_eq!(column.iter().filter(|v| **v).count(), 3);
    }
}
