//! Chart localization
//!
//! The chart's own patches serve as fiducials:
//! 1. Downscale to the working resolution and convert to Lab
//! 2. Mask every pixel that differs from the chart body color, both the
//!    nominal one and the one observed in the image
//! 3. Trace outer contours and keep convex, patch-like quadrilaterals
//! 4. For every (candidate, patch, 90° rotation) seed a homography, match
//!    projected patch centers to candidates and refit on all matched corners
//! 5. Score placements by geometric and color residual; the best one wins
//!
//! A placement must cover a minimum fraction of the chart and clear the
//! confidence threshold, otherwise the locator reports `ChartNotFound`
//! rather than a guess.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use log::{debug, info};
use palette::Lab;
use std::borrow::Cow;
use std::collections::HashSet;

use crate::chart::ChartSpec;
use crate::color::ColorConverter;
use crate::config::LocatorConfig;
use crate::constants::detection::{COLOR_RESIDUAL_SCALE, FRAME_SHIFT_FRACTION, MIN_PROJECTIVE_MATCHES};
use crate::detection::homography::{polygon_area, Homography};
use crate::error::{JudgeError, Result};
use crate::image_loader::Image;

const UNIT_SQUARE: [[f64; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
const RESIDUAL_TIE: f64 = 1e-9;
const AXIS_SPREAD_EPS: f64 = 1e-6;
/// One bin per unit of L*
const LIGHTNESS_BINS: usize = 101;

/// Detected occurrence of a chart in one image
#[derive(Debug, Clone, PartialEq)]
pub struct ChartInstance {
    homography: Homography,
    inverse: Homography,
    confidence: f32,
    residual: f64,
    matched_patches: usize,
    image_size: (u32, u32),
}

impl ChartInstance {
    /// Build from a known chart-to-image mapping
    pub fn new(homography: Homography, image_size: (u32, u32), confidence: f32) -> Result<Self> {
        Ok(Self {
            inverse: homography.inverse()?,
            homography,
            confidence: confidence.clamp(0.0, 1.0),
            residual: 0.0,
            matched_patches: 0,
            image_size,
        })
    }

    /// Chart coordinates to image pixels
    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    /// Image pixels to chart coordinates
    pub fn inverse(&self) -> &Homography {
        &self.inverse
    }

    /// Detection confidence in [0, 1]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Combined geometric and color fit residual
    pub fn residual(&self) -> f64 {
        self.residual
    }

    /// Number of patches matched to image candidates
    pub fn matched_patches(&self) -> usize {
        self.matched_patches
    }

    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    /// Chart boundary in image pixels, TL, TR, BR, BL
    pub fn outline(&self) -> Option<Vec<[f64; 2]>> {
        self.homography.project_all(&UNIT_SQUARE)
    }

    /// Chart area in image pixels
    pub fn area(&self) -> f64 {
        self.outline().map(|o| polygon_area(&o)).unwrap_or(0.0)
    }
}

/// Patch-like quadrilateral found in the working image
#[derive(Debug, Clone)]
struct Candidate {
    /// Clockwise on screen, starting at the top-left-most corner
    corners: [[f64; 2]; 4],
    centroid: [f64; 2],
    side: f64,
    area: f64,
    mean: Lab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct PatchMatch {
    patch: usize,
    candidate: usize,
    /// Candidate corner index of the patch's top-left corner
    rotation: usize,
}

#[derive(Debug, Clone)]
struct Placement {
    homography: Homography,
    matches: Vec<PatchMatch>,
    residual: f64,
    area: f64,
}

impl Placement {
    fn is_better_than(&self, other: &Placement) -> bool {
        if (self.residual - other.residual).abs() > RESIDUAL_TIE {
            self.residual < other.residual
        } else {
            self.area > other.area
        }
    }
}

/// Patch geometry in chart coordinates
struct ChartGeometry<'a> {
    spec: &'a ChartSpec,
    centers: Vec<[f64; 2]>,
    corners: Vec<[[f64; 2]; 4]>,
}

/// Chart locator using patch candidates as fiducials
#[derive(Debug, Clone)]
pub struct ChartLocator {
    config: LocatorConfig,
    converter: ColorConverter,
}

impl Default for ChartLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartLocator {
    /// Create a new locator with default parameters
    pub fn new() -> Self {
        Self::with_config(LocatorConfig::default())
    }

    /// Create a locator with custom parameters
    pub fn with_config(config: LocatorConfig) -> Self {
        Self {
            config,
            converter: ColorConverter::new(),
        }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Locate `spec` in `image`
    ///
    /// # Errors
    ///
    /// Returns `JudgeError::ChartNotFound` if no placement covers enough
    /// patches within the residual limit, or if the best placement's
    /// confidence is below the configured minimum.
    pub fn locate(&self, image: &Image, spec: &ChartSpec) -> Result<ChartInstance> {
        let (working, sx, sy) = self.working_image(image);
        let (ww, wh) = working.dimensions();
        debug!(
            "Locating '{}' in {}x{} (working {}x{})",
            spec.name(),
            image.width(),
            image.height(),
            ww,
            wh
        );

        let labs = self.lab_buffer(&working);
        let geometry = ChartGeometry {
            spec,
            centers: spec.patches().iter().map(|p| p.region.center()).collect(),
            corners: spec.patches().iter().map(|p| p.region.corners()).collect(),
        };
        let required = ((self.config.min_patch_coverage * spec.len() as f64).ceil() as usize).max(1);

        let mut best: Option<Placement> = None;
        let mut found_candidates = false;
        for frame in self.frame_colors(&labs, spec) {
            let mask = self.frame_mask(&labs, ww, wh, frame, spec.frame_tolerance());
            let candidates = self.extract_candidates(&mask, &labs);
            debug!(
                "Found {} patch candidates against frame Lab({:.1}, {:.1}, {:.1})",
                candidates.len(),
                frame.l,
                frame.a,
                frame.b
            );
            if candidates.is_empty() {
                continue;
            }
            found_candidates = true;

            if let Some(placement) = self.best_placement(&geometry, &candidates, required) {
                if best.as_ref().map_or(true, |b| placement.is_better_than(b)) {
                    best = Some(placement);
                }
            }
        }

        if !found_candidates {
            return Err(JudgeError::ChartNotFound {
                reason: "no patch-like regions in image".to_string(),
                best_confidence: None,
            });
        }

        let Some(best) = best else {
            return Err(JudgeError::ChartNotFound {
                reason: format!(
                    "no placement matched {} of {} patches within residual {}",
                    required,
                    spec.len(),
                    self.config.max_fit_residual
                ),
                best_confidence: None,
            });
        };

        let coverage = best.matches.len() as f64 / spec.len() as f64;
        let fit = (1.0 - best.residual / self.config.max_fit_residual).clamp(0.0, 1.0);
        let confidence = (coverage * fit).clamp(0.0, 1.0) as f32;
        info!(
            "Chart placement: {}/{} patches, residual {:.4}, confidence {:.3}",
            best.matches.len(),
            spec.len(),
            best.residual,
            confidence
        );

        if confidence < self.config.min_confidence {
            return Err(JudgeError::ChartNotFound {
                reason: format!(
                    "best placement confidence {:.3} below minimum {:.3}",
                    confidence, self.config.min_confidence
                ),
                best_confidence: Some(confidence),
            });
        }

        let homography = best.homography.rescaled(sx, sy);
        Ok(ChartInstance {
            inverse: homography.inverse()?,
            homography,
            confidence,
            residual: best.residual,
            matched_patches: best.matches.len(),
            image_size: (image.width(), image.height()),
        })
    }

    /// Downscale to the working pixel cap; returns the scale back to full size
    fn working_image<'a>(&self, image: &'a Image) -> (Cow<'a, RgbImage>, f64, f64) {
        let (w, h) = (image.width(), image.height());
        let pixels = w as f64 * h as f64;
        let cap = self.config.max_working_pixels as f64;
        if pixels <= cap {
            return (Cow::Borrowed(image.pixels()), 1.0, 1.0);
        }

        let scale = (cap / pixels).sqrt();
        let ww = ((w as f64 * scale).round() as u32).max(1);
        let wh = ((h as f64 * scale).round() as u32).max(1);
        let resized = imageops::resize(image.pixels(), ww, wh, FilterType::Triangle);
        (
            Cow::Owned(resized),
            w as f64 / ww as f64,
            h as f64 / wh as f64,
        )
    }

    fn lab_buffer(&self, image: &RgbImage) -> Vec<Lab> {
        image
            .pixels()
            .map(|p| self.converter.rgb_to_lab(p[0], p[1], p[2]))
            .collect()
    }

    /// Chart body colors to segment against: the nominal one, then the
    /// image's own when exposure or a color cast has moved it
    fn frame_colors(&self, labs: &[Lab], spec: &ChartSpec) -> Vec<Lab> {
        let nominal = spec.frame();
        let mut frames = vec![nominal];
        if !self.config.adaptive_frame {
            return frames;
        }

        let observed = observed_frame(labs, nominal.l, self.config.frame_mode_min_fraction);
        if let Some(observed) = observed {
            let shift = self.converter.delta_e(observed, nominal);
            debug!(
                "Observed frame Lab({:.1}, {:.1}, {:.1}), ΔE {:.2} from nominal",
                observed.l, observed.a, observed.b, shift
            );
            if shift > spec.frame_tolerance() * FRAME_SHIFT_FRACTION {
                frames.push(observed);
            }
        }
        frames
    }

    /// Foreground (255) wherever a pixel is not chart body
    fn frame_mask(
        &self,
        labs: &[Lab],
        width: u32,
        height: u32,
        frame: Lab,
        tolerance: f32,
    ) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let lab = labs[(y * width + x) as usize];
            if self.converter.delta_e(lab, frame) > tolerance {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn extract_candidates(&self, mask: &GrayImage, labs: &[Lab]) -> Vec<Candidate> {
        let (width, height) = mask.dimensions();
        let max_area = self.config.max_patch_area_ratio * width as f64 * height as f64;

        let mut candidates: Vec<Candidate> = find_contours::<i32>(mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 4)
            .filter(|c| {
                !c.points.iter().any(|p| {
                    p.x <= 0 || p.y <= 0 || p.x >= width as i32 - 1 || p.y >= height as i32 - 1
                })
            })
            .filter_map(|c| self.quad_from_contour(&c.points))
            .filter(|q| q.area >= self.config.min_patch_area_px && q.area <= max_area)
            .map(|mut q| {
                q.mean = mean_lab(labs, width, height, &q.corners);
                q
            })
            .collect();

        candidates.sort_by(|a, b| b.area.total_cmp(&a.area));
        candidates.truncate(self.config.max_candidates);
        candidates
    }

    /// Fit a convex quadrilateral to a contour and check it looks like a patch
    fn quad_from_contour(&self, points: &[Point<i32>]) -> Option<Candidate> {
        let perimeter = arc_length(points, true);
        let epsilon = self.config.poly_approx_epsilon * perimeter;
        let approx = approximate_polygon_dp(points, epsilon, true);

        let mut vertices: Vec<[f64; 2]> = approx
            .iter()
            .map(|p| [p.x as f64 + 0.5, p.y as f64 + 0.5])
            .collect();
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        drop_collinear_vertices(&mut vertices, epsilon);
        if vertices.len() != 4 || !is_convex(&vertices) {
            return None;
        }

        let quad_area = polygon_area(&vertices);
        if quad_area <= 0.0 {
            return None;
        }
        let outline: Vec<[f64; 2]> = points
            .iter()
            .map(|p| [p.x as f64 + 0.5, p.y as f64 + 0.5])
            .collect();
        let rectangularity = polygon_area(&outline) / quad_area;
        if rectangularity < self.config.min_rectangularity {
            return None;
        }

        let corners = order_corners(&vertices);
        let [tl, tr, br, bl] = corners;
        let width = (distance(tl, tr) + distance(bl, br)) * 0.5;
        let height = (distance(tl, bl) + distance(tr, br)) * 0.5;
        let aspect = width / height;
        if !(aspect >= self.config.min_aspect_ratio && aspect <= self.config.max_aspect_ratio) {
            return None;
        }

        // Contour points are pixel centers; grow by half a pixel to the patch edge.
        let centroid = centroid(&corners);
        let side = quad_area.sqrt();
        let grow = (side + 1.0) / side;
        let corners = corners.map(|[x, y]| {
            [
                centroid[0] + (x - centroid[0]) * grow,
                centroid[1] + (y - centroid[1]) * grow,
            ]
        });
        let area = polygon_area(&corners);

        Some(Candidate {
            corners,
            centroid,
            side: area.sqrt(),
            area,
            mean: Lab::new(0.0, 0.0, 0.0),
        })
    }

    /// Lowest-residual placement over every seed hypothesis
    fn best_placement(
        &self,
        geometry: &ChartGeometry<'_>,
        candidates: &[Candidate],
        required: usize,
    ) -> Option<Placement> {
        let mut best: Option<Placement> = None;
        let mut evaluated = 0usize;
        // Seeds already matched by an accepted placement converge to it again.
        let mut explained: HashSet<PatchMatch> = HashSet::new();
        for seed in 0..candidates.len() {
            for patch in 0..geometry.spec.len() {
                for rotation in 0..4 {
                    let key = PatchMatch {
                        patch,
                        candidate: seed,
                        rotation,
                    };
                    if explained.contains(&key) {
                        continue;
                    }
                    let Some(placement) =
                        self.fit_hypothesis(geometry, candidates, seed, patch, rotation, required)
                    else {
                        continue;
                    };
                    evaluated += 1;
                    explained.extend(placement.matches.iter().copied());
                    if best.as_ref().map_or(true, |b| placement.is_better_than(b)) {
                        best = Some(placement);
                    }
                }
            }
        }
        debug!("{} placements passed coverage and residual limits", evaluated);
        best
    }

    /// Seed from one (candidate, patch, rotation) triple and refine
    fn fit_hypothesis(
        &self,
        geometry: &ChartGeometry<'_>,
        candidates: &[Candidate],
        seed: usize,
        patch: usize,
        rotation: usize,
        required: usize,
    ) -> Option<Placement> {
        let seed_quad = &candidates[seed].corners;
        let dst: Vec<[f64; 2]> = (0..4).map(|k| seed_quad[(k + rotation) % 4]).collect();
        // One patch is too small a base to pin down perspective.
        let mut homography =
            Homography::affine_from_correspondences(&geometry.corners[patch], &dst).ok()?;

        let mut previous: Option<Vec<PatchMatch>> = None;
        for iteration in 0..self.config.refine_iterations {
            let matches = self.match_patches(geometry, candidates, &homography)?;
            if iteration == 0 && matches.len() < required.min(3) {
                return None;
            }
            if previous.as_ref() == Some(&matches) {
                break;
            }
            homography = refit(geometry, candidates, &matches)?;
            previous = Some(matches);
        }

        let matches = previous?;
        if matches.len() < required {
            return None;
        }

        let residual = self.residual(geometry, candidates, &matches, &homography)?;
        if residual > self.config.max_fit_residual {
            return None;
        }
        let area = polygon_area(&homography.project_all(&UNIT_SQUARE)?);

        Some(Placement {
            homography,
            matches,
            residual,
            area,
        })
    }

    /// Nearest-candidate matching of projected patch centers
    ///
    /// Each candidate is claimed by at most one patch; the closest wins.
    fn match_patches(
        &self,
        geometry: &ChartGeometry<'_>,
        candidates: &[Candidate],
        homography: &Homography,
    ) -> Option<Vec<PatchMatch>> {
        let projected = homography.project_all(&geometry.centers)?;

        let mut proposals: Vec<(f64, usize, usize)> = projected
            .iter()
            .enumerate()
            .filter_map(|(patch, center)| {
                candidates
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (distance(*center, c.centroid), i))
                    .min_by(|a, b| a.0.total_cmp(&b.0))
                    .filter(|(d, i)| *d <= self.config.match_tolerance * candidates[*i].side)
                    .map(|(d, i)| (d, patch, i))
            })
            .collect();
        proposals.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut claimed = vec![false; candidates.len()];
        let mut matches = Vec::with_capacity(proposals.len());
        for (_, patch, candidate) in proposals {
            if claimed[candidate] {
                continue;
            }
            claimed[candidate] = true;
            let corners = homography.project_all(&geometry.corners[patch])?;
            matches.push(PatchMatch {
                patch,
                candidate,
                rotation: best_rotation(&corners, &candidates[candidate].corners),
            });
        }
        matches.sort();
        Some(matches)
    }

    /// Corner RMS in patch-side units plus scaled median color difference
    fn residual(
        &self,
        geometry: &ChartGeometry<'_>,
        candidates: &[Candidate],
        matches: &[PatchMatch],
        homography: &Homography,
    ) -> Option<f64> {
        let mut squared = 0.0;
        let mut count = 0usize;
        let mut color = Vec::with_capacity(matches.len());
        for m in matches {
            let candidate = &candidates[m.candidate];
            let projected = homography.project_all(&geometry.corners[m.patch])?;
            for (k, p) in projected.iter().enumerate() {
                let d = distance(*p, candidate.corners[(k + m.rotation) % 4]) / candidate.side;
                squared += d * d;
                count += 1;
            }
            let reference = geometry.spec.patches()[m.patch].reference;
            color.push(self.converter.delta_e(candidate.mean, reference) as f64);
        }
        if count == 0 {
            return None;
        }

        let rms = (squared / count as f64).sqrt();
        Some(rms + median(&mut color) / COLOR_RESIDUAL_SCALE)
    }
}

/// Fit over all matched corner correspondences
///
/// Projective (DLT) once the matches span both chart axes with enough
/// patches, affine before that.
fn refit(
    geometry: &ChartGeometry<'_>,
    candidates: &[Candidate],
    matches: &[PatchMatch],
) -> Option<Homography> {
    let mut src = Vec::with_capacity(matches.len() * 4);
    let mut dst = Vec::with_capacity(matches.len() * 4);
    for m in matches {
        let quad = &candidates[m.candidate].corners;
        for (k, corner) in geometry.corners[m.patch].iter().enumerate() {
            src.push(*corner);
            dst.push(quad[(k + m.rotation) % 4]);
        }
    }
    if matches.len() >= MIN_PROJECTIVE_MATCHES && spans_both_axes(geometry, matches) {
        Homography::from_correspondences(&src, &dst).ok()
    } else {
        Homography::affine_from_correspondences(&src, &dst).ok()
    }
}

/// Whether matched patch centers differ in both chart coordinates
fn spans_both_axes(geometry: &ChartGeometry<'_>, matches: &[PatchMatch]) -> bool {
    let spread = |axis: usize| {
        let values = matches.iter().map(|m| geometry.centers[m.patch][axis]);
        let min = values.clone().fold(f64::INFINITY, f64::min);
        let max = values.fold(f64::NEG_INFINITY, f64::max);
        max - min
    };
    spread(0) > AXIS_SPREAD_EPS && spread(1) > AXIS_SPREAD_EPS
}

/// Dominant lightness mode nearest `nominal_l`, as the median color of its pixels
///
/// Modes holding less than `min_fraction` of the pixels are ignored.
fn observed_frame(labs: &[Lab], nominal_l: f32, min_fraction: f64) -> Option<Lab> {
    if labs.is_empty() {
        return None;
    }
    let mut bins = [0.0f64; LIGHTNESS_BINS];
    for lab in labs {
        bins[lightness_bin(lab.l)] += 1.0;
    }
    let smoothed: Vec<f64> = (0..LIGHTNESS_BINS)
        .map(|i| {
            let prev = bins[i.saturating_sub(1)];
            let next = bins[(i + 1).min(LIGHTNESS_BINS - 1)];
            (prev + 2.0 * bins[i] + next) * 0.25
        })
        .collect();

    let floor = min_fraction * labs.len() as f64;
    let is_peak = |i: usize| {
        smoothed[i] >= floor
            && (i == 0 || smoothed[i] >= smoothed[i - 1])
            && (i + 1 == LIGHTNESS_BINS || smoothed[i] >= smoothed[i + 1])
    };
    let peak = (0..LIGHTNESS_BINS)
        .filter(|&i| is_peak(i))
        .min_by(|&a, &b| {
            let da = (a as f32 - nominal_l).abs();
            let db = (b as f32 - nominal_l).abs();
            da.total_cmp(&db)
        })?;

    let (mut l, mut a, mut b) = (Vec::new(), Vec::new(), Vec::new());
    for lab in labs.iter().filter(|lab| lightness_bin(lab.l).abs_diff(peak) <= 1) {
        l.push(lab.l as f64);
        a.push(lab.a as f64);
        b.push(lab.b as f64);
    }
    if l.is_empty() {
        return None;
    }
    Some(Lab::new(
        median(&mut l) as f32,
        median(&mut a) as f32,
        median(&mut b) as f32,
    ))
}

fn lightness_bin(l: f32) -> usize {
    if l.is_finite() {
        l.round().clamp(0.0, (LIGHTNESS_BINS - 1) as f32) as usize
    } else {
        0
    }
}

/// Cyclic shift of `quad` that best lines up with `projected`
fn best_rotation(projected: &[[f64; 2]], quad: &[[f64; 2]; 4]) -> usize {
    (0..4)
        .map(|r| {
            let cost: f64 = projected
                .iter()
                .enumerate()
                .map(|(k, p)| {
                    let d = distance(*p, quad[(k + r) % 4]);
                    d * d
                })
                .sum();
            (cost, r)
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, r)| r)
        .unwrap_or(0)
}

/// Order corners clockwise on screen, starting at the top-left-most one
fn order_corners(vertices: &[[f64; 2]]) -> [[f64; 2]; 4] {
    let c = centroid(vertices);
    let mut sorted: Vec<[f64; 2]> = vertices.to_vec();
    sorted.sort_by(|a, b| {
        let ta = (a[1] - c[1]).atan2(a[0] - c[0]);
        let tb = (b[1] - c[1]).atan2(b[0] - c[0]);
        ta.total_cmp(&tb)
    });
    let start = sorted
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1[0] + a.1[1]).total_cmp(&(b.1[0] + b.1[1])))
        .map(|(i, _)| i)
        .unwrap_or(0);
    [
        sorted[start % 4],
        sorted[(start + 1) % 4],
        sorted[(start + 2) % 4],
        sorted[(start + 3) % 4],
    ]
}

/// Remove vertices lying within `epsilon` of the line through their neighbours
fn drop_collinear_vertices(vertices: &mut Vec<[f64; 2]>, epsilon: f64) {
    while vertices.len() > 4 {
        let n = vertices.len();
        let flattest = (0..n)
            .map(|i| {
                let prev = vertices[(i + n - 1) % n];
                let next = vertices[(i + 1) % n];
                (line_distance(vertices[i], prev, next), i)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));
        match flattest {
            Some((d, i)) if d < epsilon => {
                vertices.remove(i);
            }
            _ => break,
        }
    }
}

fn is_convex(vertices: &[[f64; 2]]) -> bool {
    let n = vertices.len();
    let mut sign = 0.0f64;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let c = vertices[(i + 2) % n];
        let cross = (b[0] - a[0]) * (c[1] - b[1]) - (b[1] - a[1]) * (c[0] - b[0]);
        if cross.abs() < 1e-9 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Mean Lab over the central half of the quad's bounding box
fn mean_lab(labs: &[Lab], width: u32, height: u32, corners: &[[f64; 2]; 4]) -> Lab {
    let min_x = corners.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max);
    let (qx, qy) = ((max_x - min_x) * 0.25, (max_y - min_y) * 0.25);

    let x0 = (min_x + qx).floor().max(0.0) as u32;
    let x1 = ((max_x - qx).ceil().max(0.0) as u32).min(width);
    let y0 = (min_y + qy).floor().max(0.0) as u32;
    let y1 = ((max_y - qy).ceil().max(0.0) as u32).min(height);

    let (mut l, mut a, mut b, mut n) = (0.0f64, 0.0f64, 0.0f64, 0usize);
    for y in y0..y1 {
        for x in x0..x1 {
            let lab = labs[(y * width + x) as usize];
            l += lab.l as f64;
            a += lab.a as f64;
            b += lab.b as f64;
            n += 1;
        }
    }
    if n == 0 {
        return Lab::new(0.0, 0.0, 0.0);
    }
    let n = n as f64;
    Lab::new((l / n) as f32, (a / n) as f32, (b / n) as f32)
}

fn centroid(points: &[[f64; 2]]) -> [f64; 2] {
    let n = points.len().max(1) as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |acc, p| (acc.0 + p[0], acc.1 + p[1]));
    [sx / n, sy / n]
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn line_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let len = distance(a, b);
    if len < 1e-12 {
        return distance(p, a);
    }
    ((b[0] - a[0]) * (a[1] - p[1]) - (a[0] - p[0]) * (b[1] - a[1])).abs() / len
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) * 0.5
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{render_chart, ChartPlacement, RenderOptions};
    use image::Rgb;

    fn rendered(placement: ChartPlacement, width: u32, height: u32) -> Image {
        let spec = ChartSpec::color_checker_classic();
        let options = RenderOptions::new(width, height, placement.homography().unwrap());
        Image::from_rgb(render_chart(&spec, &options).unwrap())
    }

    fn standard() -> Image {
        rendered(ChartPlacement::new([100.0, 100.0], [600.0, 400.0]), 800, 600)
    }

    fn shifted(image: &Image, delta: [i16; 3]) -> Image {
        let mut pixels = image.pixels().clone();
        for p in pixels.pixels_mut() {
            for (c, d) in p.0.iter_mut().zip(delta) {
                *c = (*c as i16 + d).clamp(0, 255) as u8;
            }
        }
        Image::from_rgb(pixels)
    }

    #[test]
    fn test_order_corners_clockwise() {
        let shuffled = [[10.0, 10.0], [0.0, 10.0], [10.0, 0.0], [0.0, 0.0]];
        let ordered = order_corners(&shuffled);
        assert_eq!(
            ordered,
            [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]
        );
    }

    #[test]
    fn test_convexity() {
        let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert!(is_convex(&square));
        let dart = [[0.0, 0.0], [1.0, 0.5], [2.0, 0.0], [1.0, 2.0]];
        assert!(!is_convex(&dart));
    }

    #[test]
    fn test_drop_collinear_vertices() {
        let mut poly = vec![[0.0, 0.0], [5.0, 0.1], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        drop_collinear_vertices(&mut poly, 0.5);
        assert_eq!(poly.len(), 4);
        assert!(!poly.contains(&[5.0, 0.1]));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&mut []), 0.0);
    }

    #[test]
    fn test_best_rotation() {
        let quad = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let projected = [[1.0, 1.0], [0.0, 1.0], [0.0, 0.0], [1.0, 0.0]];
        assert_eq!(best_rotation(&projected, &quad), 2);
    }

    #[test]
    fn test_locate_axis_aligned_chart() {
        let image = rendered(ChartPlacement::new([100.0, 100.0], [600.0, 400.0]), 800, 600);
        let spec = ChartSpec::color_checker_classic();
        let instance = ChartLocator::new().locate(&image, &spec).unwrap();

        assert_eq!(instance.matched_patches(), 24);
        assert!(instance.confidence() > 0.9);
        let tl = instance.homography().project(0.0, 0.0).unwrap();
        let br = instance.homography().project(1.0, 1.0).unwrap();
        assert!((tl[0] - 100.0).abs() < 1.0 && (tl[1] - 100.0).abs() < 1.0);
        assert!((br[0] - 700.0).abs() < 1.0 && (br[1] - 500.0).abs() < 1.0);
    }

    #[test]
    fn test_locate_upside_down_chart() {
        let placement = ChartPlacement::new([700.0, 500.0], [600.0, 400.0]).rotated(180.0);
        let image = rendered(placement, 800, 600);
        let spec = ChartSpec::color_checker_classic();
        let instance = ChartLocator::new().locate(&image, &spec).unwrap();

        // Chart origin is now at the bottom-right of the image
        let origin = instance.homography().project(0.0, 0.0).unwrap();
        assert!((origin[0] - 700.0).abs() < 1.5, "{:?}", origin);
        assert!((origin[1] - 500.0).abs() < 1.5, "{:?}", origin);
    }

    #[test]
    fn test_observed_frame_is_dominant_dark_mode() {
        let frame = Lab::new(16.5, 0.3, -0.2);
        let mut labs = vec![frame; 700];
        labs.extend(vec![Lab::new(30.0, 1.0, 1.0); 100]);
        labs.extend(vec![Lab::new(62.0, 20.0, -10.0); 200]);

        let observed = observed_frame(&labs, 4.7, 0.01).unwrap();
        assert!((observed.l - 16.5).abs() < 1e-4);
        assert!((observed.a - 0.3).abs() < 1e-4);
        assert!((observed.b + 0.2).abs() < 1e-4);

        assert!(observed_frame(&[], 4.7, 0.01).is_none());
    }

    #[test]
    fn test_locate_brightened_chart() {
        let image = shifted(&standard(), [25, 25, 25]);
        let spec = ChartSpec::color_checker_classic();
        let instance = ChartLocator::new().locate(&image, &spec).unwrap();

        assert_eq!(instance.matched_patches(), 24);
        let tl = instance.homography().project(0.0, 0.0).unwrap();
        assert!((tl[0] - 100.0).abs() < 1.0 && (tl[1] - 100.0).abs() < 1.0, "{:?}", tl);
    }

    #[test]
    fn test_nominal_frame_only_misses_brightened_chart() {
        let image = shifted(&standard(), [25, 25, 25]);
        let spec = ChartSpec::color_checker_classic();
        let config = LocatorConfig {
            adaptive_frame: false,
            ..LocatorConfig::default()
        };
        let err = ChartLocator::with_config(config).locate(&image, &spec).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ChartNotFound);
    }

    #[test]
    fn test_locate_color_cast_chart() {
        let image = shifted(&standard(), [30, 0, 0]);
        let spec = ChartSpec::color_checker_classic();
        let instance = ChartLocator::new().locate(&image, &spec).unwrap();
        assert_eq!(instance.matched_patches(), 24);
    }

    #[test]
    fn test_locate_blurred_chart() {
        let blurred = imageproc::filter::gaussian_blur_f32(standard().pixels(), 1.5);
        let image = Image::from_rgb(blurred);
        let spec = ChartSpec::color_checker_classic();
        let instance = ChartLocator::new().locate(&image, &spec).unwrap();

        assert!(instance.matched_patches() >= 22, "{}", instance.matched_patches());
        assert!(instance.confidence() > 0.8, "{}", instance.confidence());
        let tl = instance.homography().project(0.0, 0.0).unwrap();
        assert!((tl[0] - 100.0).abs() < 3.0 && (tl[1] - 100.0).abs() < 3.0, "{:?}", tl);
    }

    #[test]
    fn test_no_chart() {
        let image = Image::from_rgb(RgbImage::from_pixel(320, 240, Rgb([90, 140, 200])));
        let spec = ChartSpec::color_checker_classic();
        let err = ChartLocator::new().locate(&image, &spec).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ChartNotFound);
    }

    #[test]
    fn test_downscaled_detection_maps_to_full_resolution() {
        let image = rendered(ChartPlacement::new([100.0, 100.0], [600.0, 400.0]), 800, 600);
        let spec = ChartSpec::color_checker_classic();
        let config = LocatorConfig {
            max_working_pixels: 120_000,
            ..LocatorConfig::default()
        };
        let instance = ChartLocator::with_config(config).locate(&image, &spec).unwrap();

        let tl = instance.homography().project(0.0, 0.0).unwrap();
        assert!((tl[0] - 100.0).abs() < 3.0 && (tl[1] - 100.0).abs() < 3.0, "{:?}", tl);
        assert_eq!(instance.image_size(), (800, 600));
    }
}
