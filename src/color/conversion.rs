//! Color space conversion utilities
//!
//! Provides conversions between the sRGB capture space and the CIE Lab
//! calibration space, hex representations, and color difference metrics.
//!
//! All Lab values use the D65 white point (`palette::Lab` default).

use palette::color_difference::Ciede2000;
use palette::{FromColor, IntoColor, Lab, Srgb};
use serde::{Deserialize, Serialize};

use crate::error::{JudgeError, Result};

/// Color difference formula
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaEMetric {
    /// Euclidean distance in Lab (ΔE*76)
    #[default]
    Cie76,
    /// CIEDE2000
    Ciede2000,
}

/// Color converter between sRGB and Lab
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorConverter;

impl ColorConverter {
    /// Create a new color converter
    pub fn new() -> Self {
        Self
    }

    /// Convert RGB (0-255) to Lab color space
    ///
    /// The result is bit-identical for identical inputs, which the judgment
    /// relies on for exact zero deviations.
    pub fn rgb_to_lab(&self, r: u8, g: u8, b: u8) -> Lab {
        let srgb = Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        Lab::from_color(srgb)
    }

    /// Convert Lab to sRGB with gamut clipping
    pub fn lab_to_srgb(&self, lab: Lab) -> Srgb {
        let srgb: Srgb = lab.into_color();
        Srgb::new(
            srgb.red.clamp(0.0, 1.0),
            srgb.green.clamp(0.0, 1.0),
            srgb.blue.clamp(0.0, 1.0),
        )
    }

    /// Convert Lab to 8-bit RGB, clipping out-of-gamut values
    pub fn lab_to_rgb8(&self, lab: Lab) -> [u8; 3] {
        let srgb = self.lab_to_srgb(lab);
        [
            (srgb.red * 255.0).round() as u8,
            (srgb.green * 255.0).round() as u8,
            (srgb.blue * 255.0).round() as u8,
        ]
    }

    /// Convert sRGB to hexadecimal color string (e.g. "#FF0000")
    pub fn srgb_to_hex(&self, srgb: Srgb) -> String {
        let r = (srgb.red.clamp(0.0, 1.0) * 255.0).round() as u8;
        let g = (srgb.green.clamp(0.0, 1.0) * 255.0).round() as u8;
        let b = (srgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02X}{:02X}{:02X}", r, g, b)
    }

    /// Hex string of a Lab color
    pub fn lab_to_hex(&self, lab: Lab) -> String {
        self.srgb_to_hex(self.lab_to_srgb(lab))
    }

    /// Parse "#RRGGBB" or "RRGGBB" into 8-bit channels
    pub fn hex_to_rgb8(&self, hex: &str) -> Result<[u8; 3]> {
        let digits = hex.trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(JudgeError::invalid_parameter("hex color", hex));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| JudgeError::invalid_parameter("hex color", hex))
        };
        Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
    }

    /// Parse hexadecimal color string to Lab
    pub fn hex_to_lab(&self, hex: &str) -> Result<Lab> {
        let [r, g, b] = self.hex_to_rgb8(hex)?;
        Ok(self.rgb_to_lab(r, g, b))
    }

    /// Compute Delta E (ΔE*76) between two Lab colors
    pub fn delta_e(&self, lab1: Lab, lab2: Lab) -> f32 {
        let dl = lab1.l - lab2.l;
        let da = lab1.a - lab2.a;
        let db = lab1.b - lab2.b;
        (dl * dl + da * da + db * db).sqrt()
    }

    /// Color difference under the selected metric
    pub fn difference(&self, metric: DeltaEMetric, lab1: Lab, lab2: Lab) -> f32 {
        match metric {
            DeltaEMetric::Cie76 => self.delta_e(lab1, lab2),
            DeltaEMetric::Ciede2000 => lab1.difference(lab2),
        }
    }

    /// Chroma (C*ab) of a Lab color
    pub fn chroma(&self, lab: Lab) -> f32 {
        (lab.a * lab.a + lab.b * lab.b).sqrt()
    }
}
