//! # Chart Judge
//!
//! Locates a known color calibration chart in a photograph and judges
//! whether each patch was reproduced within tolerance.
//!
//! The pipeline:
//! - Decodes the image and normalizes it to 8-bit sRGB
//! - Finds the chart and fits a homography from chart to image coordinates
//! - Samples a robust mean color inside every patch
//! - Compares each sample against its reference with a CIE ΔE metric
//! - Optionally writes a corrected, annotated copy of the image
//!
//! ## Example
//!
//! ```rust,no_run
//! use chart_judge::{judge_color_chart, Classification};
//! use std::path::Path;
//!
//! let judgment = judge_color_chart(Path::new("photo.jpg"), Path::new("judged.png"))?;
//! if judgment.classification() == Classification::Pass {
//!     println!("max ΔE {:.2}", judgment.aggregate_deviation());
//! }
//! # Ok::<(), chart_judge::JudgeError>(())
//! ```

use std::path::Path;

pub mod bridge;
pub mod calibration;
pub mod chart;
pub mod color;
pub mod config;
pub mod constants;
pub mod detection;
pub mod error;
pub mod ffi;
pub mod image_loader;
pub mod judgment;
pub mod output;
pub mod pipeline;

pub use bridge::BridgeResponse;
pub use chart::ChartSpec;
pub use config::EngineConfig;
pub use error::{DecodeReason, ErrorKind, JudgeError, Result};
pub use judgment::{ChartJudgment, Classification, PatchJudgment};
pub use output::WriteOutcome;
pub use pipeline::{AnalysisReport, ChartJudge};

/// Judge the built-in color checker in the image at `source`
///
/// Writes the annotated output to `destination`; an empty destination
/// skips writing. A failed write leaves the judgment intact and is logged,
/// so callers that need the write outcome should use
/// [`ChartJudge::analyze`] instead.
///
/// # Errors
///
/// Returns `JudgeError::Decode` if the image cannot be loaded and
/// `JudgeError::ChartNotFound` if no chart is detected with sufficient
/// confidence.
pub fn judge_color_chart(source: &Path, destination: &Path) -> Result<ChartJudgment> {
    ChartJudge::default()
        .analyze(source, destination)
        .map(|report| report.judgment)
}

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
