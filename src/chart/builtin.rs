//! Built-in chart definitions

use crate::color::ColorConverter;
use crate::constants::reference::{DEFAULT_FRAME_TOLERANCE, DEFAULT_TOLERANCE};

use super::spec::{ChartSpec, GridLayout, PatchSpec};

/// Classic 24-patch checker: patch name and published sRGB value, row-major
const COLOR_CHECKER_PATCHES: [(&str, [u8; 3]); 24] = [
    ("dark skin", [0x73, 0x52, 0x44]),
    ("light skin", [0xC2, 0x96, 0x82]),
    ("blue sky", [0x62, 0x7A, 0x9D]),
    ("foliage", [0x57, 0x6C, 0x43]),
    ("blue flower", [0x85, 0x80, 0xB1]),
    ("bluish green", [0x67, 0xBD, 0xAA]),
    ("orange", [0xD6, 0x7E, 0x2C]),
    ("purplish blue", [0x50, 0x5B, 0xA6]),
    ("moderate red", [0xC1, 0x5A, 0x63]),
    ("purple", [0x5E, 0x3C, 0x6C]),
    ("yellow green", [0x9D, 0xBC, 0x40]),
    ("orange yellow", [0xE0, 0xA3, 0x2E]),
    ("blue", [0x38, 0x3D, 0x96]),
    ("green", [0x46, 0x94, 0x49]),
    ("red", [0xAF, 0x36, 0x3C]),
    ("yellow", [0xE7, 0xC7, 0x1F]),
    ("magenta", [0xBB, 0x56, 0x95]),
    ("cyan", [0x08, 0x85, 0xA1]),
    ("white 9.5", [0xF3, 0xF3, 0xF2]),
    ("neutral 8", [0xC8, 0xC8, 0xC8]),
    ("neutral 6.5", [0xA0, 0xA0, 0xA0]),
    ("neutral 5", [0x7A, 0x7A, 0x79]),
    ("neutral 3.5", [0x55, 0x55, 0x55]),
    ("black 2", [0x34, 0x34, 0x34]),
];

/// Near-black chart body
const COLOR_CHECKER_FRAME: [u8; 3] = [16, 16, 16];

/// 6×4 layout with square patches at a 3:2 aspect ratio
pub const COLOR_CHECKER_LAYOUT: GridLayout = GridLayout {
    columns: 6,
    rows: 4,
    border: 0.05,
    gap: 0.2,
};

pub const COLOR_CHECKER_ASPECT_RATIO: f64 = 1.5;

impl ChartSpec {
    /// The classic 24-patch color checker
    ///
    /// Reference colors are the published sRGB values converted to Lab (D65);
    /// every patch uses the default tolerance.
    pub fn color_checker_classic() -> ChartSpec {
        let converter = ColorConverter::new();
        let layout = COLOR_CHECKER_LAYOUT;
        let patches = COLOR_CHECKER_PATCHES
            .iter()
            .enumerate()
            .map(|(i, (name, [r, g, b]))| PatchSpec {
                name: (*name).to_string(),
                region: layout.region(i / layout.columns, i % layout.columns),
                reference: converter.rgb_to_lab(*r, *g, *b),
                tolerance: DEFAULT_TOLERANCE,
            })
            .collect();
        let [fr, fg, fb] = COLOR_CHECKER_FRAME;

        ChartSpec::from_parts_unchecked(
            "ColorChecker Classic",
            COLOR_CHECKER_ASPECT_RATIO,
            converter.rgb_to_lab(fr, fg, fb),
            DEFAULT_FRAME_TOLERANCE,
            patches,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::reference::NEUTRAL_MAX_CHROMA;

    #[test]
    fn test_builtin_chart_is_valid() {
        let chart = ChartSpec::color_checker_classic();
        assert!(chart.validate().is_ok());
        assert_eq!(chart.len(), 24);
        assert_eq!(chart.patch(14).unwrap().name, "red");
    }

    #[test]
    fn test_builtin_patches_are_square() {
        let chart = ChartSpec::color_checker_classic();
        for patch in chart.patches() {
            let w = patch.region.width() * chart.aspect_ratio();
            let h = patch.region.height();
            assert!((w - h).abs() < 1e-9, "{} is not square", patch.name);
        }
    }

    #[test]
    fn test_builtin_neutral_row() {
        let chart = ChartSpec::color_checker_classic();
        let converter = ColorConverter::new();
        let neutrals = chart
            .patches()
            .iter()
            .filter(|p| converter.chroma(p.reference) < NEUTRAL_MAX_CHROMA)
            .count();
        assert_eq!(neutrals, 6);
    }

    #[test]
    fn test_patches_separable_from_frame() {
        let chart = ChartSpec::color_checker_classic();
        let converter = ColorConverter::new();
        for patch in chart.patches() {
            let d = converter.delta_e(patch.reference, chart.frame());
            assert!(d > chart.frame_tolerance(), "{} too close to frame", patch.name);
        }
    }
}
