//! Static description of a physical calibration chart
//!
//! A [`ChartSpec`] lists the chart's patches in a fixed order, each with a
//! region in normalized chart coordinates (0..1 on both axes, origin at the
//! top-left corner), a reference Lab color and a tolerance. Construction
//! validates the layout, so a `ChartSpec` value always satisfies:
//! - every region lies inside the unit square
//! - no two regions overlap
//! - tolerances and colors are finite and positive where required

use palette::Lab;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{JudgeError, Result};

/// Lab color representation for definition files.
///
/// Uses CIE L*a*b* color space coordinates (D65).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabColor {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

impl From<LabColor> for Lab {
    fn from(color: LabColor) -> Self {
        Lab::new(color.l, color.a, color.b)
    }
}

impl From<Lab> for LabColor {
    fn from(lab: Lab) -> Self {
        LabColor {
            l: lab.l,
            a: lab.a,
            b: lab.b,
        }
    }
}

/// Axis-aligned rectangle in normalized chart coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl NormalizedRect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> [f64; 2] {
        [(self.x0 + self.x1) * 0.5, (self.y0 + self.y1) * 0.5]
    }

    /// Corners in TL, TR, BR, BL order
    pub fn corners(&self) -> [[f64; 2]; 4] {
        [
            [self.x0, self.y0],
            [self.x1, self.y0],
            [self.x1, self.y1],
            [self.x0, self.y1],
        ]
    }

    /// Shrink by `fraction` of the width/height on every side
    pub fn inset(&self, fraction: f64) -> NormalizedRect {
        let dx = self.width() * fraction;
        let dy = self.height() * fraction;
        NormalizedRect::new(self.x0 + dx, self.y0 + dy, self.x1 - dx, self.y1 - dy)
    }

    /// Half-open containment test
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// True if interiors intersect (shared edges do not count)
    pub fn overlaps(&self, other: &NormalizedRect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    fn is_well_formed(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1].iter().all(|v| v.is_finite())
            && self.x0 < self.x1
            && self.y0 < self.y1
            && self.x0 >= 0.0
            && self.y0 >= 0.0
            && self.x1 <= 1.0
            && self.y1 <= 1.0
    }
}

/// One color patch of the chart
#[derive(Debug, Clone, PartialEq)]
pub struct PatchSpec {
    pub name: String,
    pub region: NormalizedRect,
    pub reference: Lab,
    /// Maximum allowed color difference (ΔE)
    pub tolerance: f32,
}

/// Reference color and tolerance of one patch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reference {
    pub lab: Lab,
    pub tolerance: f32,
}

/// Regular rows × columns patch layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub columns: usize,
    pub rows: usize,
    /// Chart border as fraction of chart width/height
    pub border: f64,
    /// Gap between patches as fraction of the cell pitch
    pub gap: f64,
}

impl GridLayout {
    /// Region of the patch at (row, column)
    pub fn region(&self, row: usize, column: usize) -> NormalizedRect {
        let pitch_x = (1.0 - 2.0 * self.border) / self.columns as f64;
        let pitch_y = (1.0 - 2.0 * self.border) / self.rows as f64;
        let margin_x = pitch_x * self.gap * 0.5;
        let margin_y = pitch_y * self.gap * 0.5;
        let x0 = self.border + pitch_x * column as f64;
        let y0 = self.border + pitch_y * row as f64;
        NormalizedRect::new(
            x0 + margin_x,
            y0 + margin_y,
            x0 + pitch_x - margin_x,
            y0 + pitch_y - margin_y,
        )
    }
}

/// Static description of a calibration chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    name: String,
    aspect_ratio: f64,
    frame: Lab,
    frame_tolerance: f32,
    patches: Vec<PatchSpec>,
}

impl ChartSpec {
    /// Build and validate a chart specification
    ///
    /// # Errors
    ///
    /// Returns `JudgeError::InvalidChartSpec` if the chart has no patches,
    /// a region is malformed or outside the unit square, two regions
    /// overlap, or a tolerance/color is not finite and positive.
    pub fn new(
        name: impl Into<String>,
        aspect_ratio: f64,
        frame: Lab,
        frame_tolerance: f32,
        patches: Vec<PatchSpec>,
    ) -> Result<Self> {
        let spec = Self {
            name: name.into(),
            aspect_ratio,
            frame,
            frame_tolerance,
            patches,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Build a chart whose patches follow a regular grid, row-major
    pub fn grid(
        name: impl Into<String>,
        aspect_ratio: f64,
        layout: GridLayout,
        frame: Lab,
        frame_tolerance: f32,
        patches: Vec<(String, Lab, f32)>,
    ) -> Result<Self> {
        if layout.columns == 0 || layout.rows == 0 {
            return Err(invalid("grid layout needs at least one row and column"));
        }
        if patches.len() != layout.columns * layout.rows {
            return Err(invalid(format!(
                "grid of {}x{} needs {} patches, got {}",
                layout.columns,
                layout.rows,
                layout.columns * layout.rows,
                patches.len()
            )));
        }
        if !(layout.border >= 0.0 && layout.border < 0.5 && layout.gap >= 0.0 && layout.gap < 1.0) {
            return Err(invalid("grid border must be in [0, 0.5) and gap in [0, 1)"));
        }

        let patches = patches
            .into_iter()
            .enumerate()
            .map(|(i, (name, reference, tolerance))| PatchSpec {
                name,
                region: layout.region(i / layout.columns, i % layout.columns),
                reference,
                tolerance,
            })
            .collect();
        Self::new(name, aspect_ratio, frame, frame_tolerance, patches)
    }

    /// Assemble a chart whose layout is known to be valid at compile time
    pub(super) fn from_parts_unchecked(
        name: impl Into<String>,
        aspect_ratio: f64,
        frame: Lab,
        frame_tolerance: f32,
        patches: Vec<PatchSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            aspect_ratio,
            frame,
            frame_tolerance,
            patches,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.patches.is_empty() {
            return Err(invalid("chart has no patches"));
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(invalid(format!("aspect ratio {} must be positive", self.aspect_ratio)));
        }
        if !is_finite_lab(self.frame) {
            return Err(invalid("frame color is not finite"));
        }
        if !(self.frame_tolerance.is_finite() && self.frame_tolerance > 0.0) {
            return Err(invalid(format!(
                "frame tolerance {} must be positive",
                self.frame_tolerance
            )));
        }

        for (i, patch) in self.patches.iter().enumerate() {
            if !patch.region.is_well_formed() {
                return Err(invalid(format!(
                    "patch {} ({}) region {:?} is not inside the unit square",
                    i, patch.name, patch.region
                )));
            }
            if !is_finite_lab(patch.reference) {
                return Err(invalid(format!("patch {} ({}) reference is not finite", i, patch.name)));
            }
            if !(patch.tolerance.is_finite() && patch.tolerance > 0.0) {
                return Err(invalid(format!(
                    "patch {} ({}) tolerance {} must be positive",
                    i, patch.name, patch.tolerance
                )));
            }
        }

        for (i, a) in self.patches.iter().enumerate() {
            for (j, b) in self.patches.iter().enumerate().skip(i + 1) {
                if a.region.overlaps(&b.region) {
                    return Err(invalid(format!(
                        "patches {} ({}) and {} ({}) overlap",
                        i, a.name, j, b.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical width / height of the chart
    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    /// Color of the chart body surrounding the patches
    pub fn frame(&self) -> Lab {
        self.frame
    }

    /// ΔE from the frame color above which a pixel belongs to a patch
    pub fn frame_tolerance(&self) -> f32 {
        self.frame_tolerance
    }

    pub fn patches(&self) -> &[PatchSpec] {
        &self.patches
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn patch(&self, index: usize) -> Option<&PatchSpec> {
        self.patches.get(index)
    }

    /// Reference color and tolerance of a patch
    ///
    /// # Errors
    ///
    /// Returns `JudgeError::Internal` if `index` is not a declared patch.
    pub fn reference_for(&self, index: usize) -> Result<Reference> {
        self.patches
            .get(index)
            .map(|p| Reference {
                lab: p.reference,
                tolerance: p.tolerance,
            })
            .ok_or_else(|| {
                JudgeError::internal(format!(
                    "patch index {} out of range for chart '{}' ({} patches)",
                    index,
                    self.name,
                    self.patches.len()
                ))
            })
    }

    /// Serializable form of this chart
    pub fn to_definition(&self) -> ChartDefinition {
        ChartDefinition {
            name: self.name.clone(),
            aspect_ratio: self.aspect_ratio,
            frame: self.frame.into(),
            frame_tolerance: self.frame_tolerance,
            patches: self
                .patches
                .iter()
                .map(|p| PatchDefinition {
                    name: p.name.clone(),
                    region: p.region,
                    reference: p.reference.into(),
                    tolerance: p.tolerance,
                })
                .collect(),
        }
    }

    /// Build from a definition, validating it
    pub fn from_definition(definition: ChartDefinition) -> Result<Self> {
        let patches = definition
            .patches
            .into_iter()
            .map(|p| PatchSpec {
                name: p.name,
                region: p.region,
                reference: p.reference.into(),
                tolerance: p.tolerance,
            })
            .collect();
        Self::new(
            definition.name,
            definition.aspect_ratio,
            definition.frame.into(),
            definition.frame_tolerance,
            patches,
        )
    }

    /// Load a chart definition from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| JudgeError::config(path, "cannot read chart definition", e))?;
        let definition: ChartDefinition = serde_json::from_str(&content)
            .map_err(|e| JudgeError::config(path, "cannot parse chart definition", e))?;
        Self::from_definition(definition)
    }

    /// Save the chart definition to a JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_definition())
            .map_err(|e| JudgeError::config(path, "cannot serialize chart definition", e))?;
        std::fs::write(path, json)
            .map_err(|e| JudgeError::config(path, "cannot write chart definition", e))?;
        Ok(())
    }
}

/// Chart definition file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDefinition {
    pub name: String,
    pub aspect_ratio: f64,
    pub frame: LabColor,
    pub frame_tolerance: f32,
    pub patches: Vec<PatchDefinition>,
}

/// One patch in a chart definition file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchDefinition {
    pub name: String,
    pub region: NormalizedRect,
    pub reference: LabColor,
    pub tolerance: f32,
}

fn invalid(reason: impl Into<String>) -> JudgeError {
    JudgeError::InvalidChartSpec {
        reason: reason.into(),
    }
}

fn is_finite_lab(lab: Lab) -> bool {
    lab.l.is_finite() && lab.a.is_finite() && lab.b.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(name: &str, region: NormalizedRect) -> PatchSpec {
        PatchSpec {
            name: name.to_string(),
            region,
            reference: Lab::new(50.0, 0.0, 0.0),
            tolerance: 5.0,
        }
    }

    fn frame() -> Lab {
        Lab::new(5.0, 0.0, 0.0)
    }

    #[test]
    fn test_valid_spec() {
        let spec = ChartSpec::new(
            "two",
            2.0,
            frame(),
            8.0,
            vec![
                patch("a", NormalizedRect::new(0.1, 0.1, 0.4, 0.9)),
                patch("b", NormalizedRect::new(0.4, 0.1, 0.9, 0.9)),
            ],
        )
        .unwrap();
        assert_eq!(spec.len(), 2);
        assert_eq!(spec.name(), "two");
    }

    #[test]
    fn test_overlapping_patches_rejected() {
        let err = ChartSpec::new(
            "overlap",
            1.0,
            frame(),
            8.0,
            vec![
                patch("a", NormalizedRect::new(0.1, 0.1, 0.5, 0.5)),
                patch("b", NormalizedRect::new(0.4, 0.4, 0.8, 0.8)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, JudgeError::InvalidChartSpec { .. }));
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_region_outside_unit_square_rejected() {
        let err = ChartSpec::new(
            "outside",
            1.0,
            frame(),
            8.0,
            vec![patch("a", NormalizedRect::new(0.5, 0.5, 1.2, 0.9))],
        )
        .unwrap_err();
        assert!(matches!(err, JudgeError::InvalidChartSpec { .. }));
    }

    #[test]
    fn test_degenerate_region_rejected() {
        let result = ChartSpec::new(
            "flat",
            1.0,
            frame(),
            8.0,
            vec![patch("a", NormalizedRect::new(0.5, 0.5, 0.5, 0.9))],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_and_bad_tolerance_rejected() {
        assert!(ChartSpec::new("empty", 1.0, frame(), 8.0, vec![]).is_err());

        let mut p = patch("a", NormalizedRect::new(0.1, 0.1, 0.5, 0.5));
        p.tolerance = 0.0;
        assert!(ChartSpec::new("tol", 1.0, frame(), 8.0, vec![p]).is_err());

        let p = patch("a", NormalizedRect::new(0.1, 0.1, 0.5, 0.5));
        assert!(ChartSpec::new("frame", 1.0, frame(), f32::NAN, vec![p]).is_err());
    }

    #[test]
    fn test_reference_for_is_total_and_bounded() {
        let spec = ChartSpec::new(
            "one",
            1.0,
            frame(),
            8.0,
            vec![patch("a", NormalizedRect::new(0.1, 0.1, 0.5, 0.5))],
        )
        .unwrap();
        let first = spec.reference_for(0).unwrap();
        assert_eq!(first, spec.reference_for(0).unwrap());
        assert_eq!(first.tolerance, 5.0);

        let err = spec.reference_for(1).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Internal);
    }

    #[test]
    fn test_grid_layout_regions() {
        let layout = GridLayout {
            columns: 2,
            rows: 2,
            border: 0.1,
            gap: 0.2,
        };
        let r = layout.region(0, 0);
        assert!((r.x0 - 0.14).abs() < 1e-12);
        assert!((r.x1 - 0.46).abs() < 1e-12);
        let r11 = layout.region(1, 1);
        assert!((r11.x1 - 0.86).abs() < 1e-12);
        assert!(!r.overlaps(&r11));
    }

    #[test]
    fn test_grid_requires_matching_patch_count() {
        let layout = GridLayout {
            columns: 2,
            rows: 2,
            border: 0.1,
            gap: 0.2,
        };
        let result = ChartSpec::grid(
            "short",
            1.0,
            layout,
            frame(),
            8.0,
            vec![("a".to_string(), Lab::new(50.0, 0.0, 0.0), 5.0)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rect_helpers() {
        let r = NormalizedRect::new(0.2, 0.2, 0.6, 0.4);
        let [cx, cy] = r.center();
        assert!((cx - 0.4).abs() < 1e-12);
        assert!((cy - 0.3).abs() < 1e-12);
        let inner = r.inset(0.25);
        assert!((inner.x0 - 0.3).abs() < 1e-12);
        assert!((inner.y1 - 0.35).abs() < 1e-12);
        assert!(r.contains(0.2, 0.2));
        assert!(!r.contains(0.6, 0.3));
        let touching = NormalizedRect::new(0.6, 0.2, 0.8, 0.4);
        assert!(!r.overlaps(&touching));
    }
}
