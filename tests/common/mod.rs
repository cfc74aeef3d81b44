//! Synthetic chart fixtures shared by the integration tests

#![allow(dead_code)]

use chart_judge::chart::{render_chart, ChartPlacement, RenderOptions};
use chart_judge::detection::Homography;
use chart_judge::ChartSpec;
use image::RgbImage;
use std::path::{Path, PathBuf};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 600x400 chart at (100, 100) in an 800x600 image
pub fn standard_placement() -> ChartPlacement {
    ChartPlacement::new([100.0, 100.0], [600.0, 400.0])
}

/// Chart rotated 10° in a 640x600 image so that the two top-right patches
/// run off the right edge
pub fn cropped_placement() -> ChartPlacement {
    ChartPlacement::new([116.0, 50.0], [600.0, 400.0]).rotated(10.0)
}

/// Mild perspective: top edge narrower than the bottom edge
pub fn perspective_homography() -> Homography {
    let chart = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    let image = [[150.0, 110.0], [650.0, 130.0], [700.0, 500.0], [90.0, 480.0]];
    Homography::from_correspondences(&chart, &image).expect("valid perspective")
}

pub fn render(
    spec: &ChartSpec,
    size: (u32, u32),
    placement: Homography,
    overrides: &[(usize, [u8; 3])],
) -> RgbImage {
    let options = overrides.iter().fold(
        RenderOptions::new(size.0, size.1, placement),
        |options, &(index, rgb)| options.with_override(index, rgb),
    );
    render_chart(spec, &options).expect("render chart")
}

/// Render and save to `dir/name`
pub fn render_to(
    dir: &Path,
    name: &str,
    spec: &ChartSpec,
    size: (u32, u32),
    placement: Homography,
    overrides: &[(usize, [u8; 3])],
) -> PathBuf {
    let path = dir.join(name);
    render(spec, size, placement, overrides)
        .save(&path)
        .expect("save rendered chart");
    path
}

/// Add `delta` to every channel of every pixel, clamped to 0..=255
pub fn shifted(image: &RgbImage, delta: [i16; 3]) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for (c, d) in pixel.0.iter_mut().zip(delta) {
            *c = (*c as i16 + d).clamp(0, 255) as u8;
        }
    }
    out
}

/// Standard 800x600 render of the built-in chart, unsaved
pub fn standard_image() -> RgbImage {
    let homography = standard_placement().homography().expect("placement");
    render(&ChartSpec::color_checker_classic(), (800, 600), homography, &[])
}

pub fn save(dir: &Path, name: &str, image: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    image.save(&path).expect("save image");
    path
}

/// Standard placement of the built-in chart in an 800x600 image
pub fn standard_chart(dir: &Path, name: &str) -> PathBuf {
    let homography = standard_placement().homography().expect("placement");
    render_to(
        dir,
        name,
        &ChartSpec::color_checker_classic(),
        (800, 600),
        homography,
        &[],
    )
}
