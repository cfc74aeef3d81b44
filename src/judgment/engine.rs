//! Per-patch and aggregate chart judgment
//!
//! Each sampled patch is compared to its reference color; a patch passes
//! when its deviation does not exceed the patch tolerance. The chart is
//! classified with failures taking precedence over incomplete coverage:
//! - `Fail` if any sampled patch fails
//! - `Inconclusive` if none fails but some patch is unsampled
//! - `Pass` otherwise
//!
//! The aggregate deviation is the worst per-patch deviation.

use log::info;
use palette::Lab;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chart::ChartSpec;
use crate::color::{ColorConverter, DeltaEMetric, PatchSample, UnsampledReason};
use crate::config::JudgmentConfig;
use crate::error::{JudgeError, Result};

/// Overall chart outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    Pass,
    Fail,
    Inconclusive,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Pass => "PASS",
            Classification::Fail => "FAIL",
            Classification::Inconclusive => "INCONCLUSIVE",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    Passed,
    Failed,
    Unsampled(UnsampledReason),
}

/// Comparison of one patch against its reference
#[derive(Debug, Clone, PartialEq)]
pub struct PatchJudgment {
    pub index: usize,
    pub name: String,
    pub reference: Lab,
    pub tolerance: f32,
    /// Measured color, `None` when unsampled
    pub sampled: Option<Lab>,
    /// Color difference to the reference, `None` when unsampled
    pub deviation: Option<f32>,
    pub pixel_count: usize,
    pub status: PatchStatus,
}

impl PatchJudgment {
    pub fn passed(&self) -> bool {
        self.status == PatchStatus::Passed
    }

    pub fn is_unsampled(&self) -> bool {
        matches!(self.status, PatchStatus::Unsampled(_))
    }
}

/// Complete judgment of one chart instance
#[derive(Debug, Clone, PartialEq)]
pub struct ChartJudgment {
    patches: Vec<PatchJudgment>,
    classification: Classification,
    aggregate_deviation: f32,
    metric: DeltaEMetric,
    output_path: Option<PathBuf>,
}

impl ChartJudgment {
    pub fn patches(&self) -> &[PatchJudgment] {
        &self.patches
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Maximum deviation over sampled patches (0 when none was sampled)
    pub fn aggregate_deviation(&self) -> f32 {
        self.aggregate_deviation
    }

    pub fn metric(&self) -> DeltaEMetric {
        self.metric
    }

    /// Annotated image written for this judgment, if any
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Same judgment, recording where the output image was written
    pub fn with_output_path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: Some(path.into()),
            ..self
        }
    }

    pub fn failed_count(&self) -> usize {
        self.patches.iter().filter(|p| p.status == PatchStatus::Failed).count()
    }

    pub fn unsampled_count(&self) -> usize {
        self.patches.iter().filter(|p| p.is_unsampled()).count()
    }

    pub fn sampled_count(&self) -> usize {
        self.patches.len() - self.unsampled_count()
    }
}

/// Judgment engine comparing samples with reference colors
#[derive(Debug, Clone)]
pub struct JudgmentEngine {
    converter: ColorConverter,
    metric: DeltaEMetric,
}

impl Default for JudgmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl JudgmentEngine {
    /// Create a new engine using ΔE*76
    pub fn new() -> Self {
        Self::with_metric(DeltaEMetric::default())
    }

    pub fn with_metric(metric: DeltaEMetric) -> Self {
        Self {
            converter: ColorConverter::new(),
            metric,
        }
    }

    pub fn from_config(config: &JudgmentConfig) -> Self {
        Self::with_metric(config.metric)
    }

    /// Judge one sample per chart patch
    ///
    /// # Errors
    ///
    /// Returns `JudgeError::Internal` if the number of samples does not
    /// match the number of patches in `spec`.
    pub fn judge(&self, samples: &[PatchSample], spec: &ChartSpec) -> Result<ChartJudgment> {
        if samples.len() != spec.len() {
            return Err(JudgeError::internal(format!(
                "{} samples for a chart of {} patches",
                samples.len(),
                spec.len()
            )));
        }

        let patches = samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                let reference = spec.reference_for(index)?;
                let name = spec.patches()[index].name.clone();
                let judgment = match *sample {
                    PatchSample::Sampled { lab, pixel_count } => {
                        let deviation = self.converter.difference(self.metric, lab, reference.lab);
                        PatchJudgment {
                            index,
                            name,
                            reference: reference.lab,
                            tolerance: reference.tolerance,
                            sampled: Some(lab),
                            deviation: Some(deviation),
                            pixel_count,
                            status: if deviation <= reference.tolerance {
                                PatchStatus::Passed
                            } else {
                                PatchStatus::Failed
                            },
                        }
                    }
                    PatchSample::Unsampled(reason) => PatchJudgment {
                        index,
                        name,
                        reference: reference.lab,
                        tolerance: reference.tolerance,
                        sampled: None,
                        deviation: None,
                        pixel_count: 0,
                        status: PatchStatus::Unsampled(reason),
                    },
                };
                Ok(judgment)
            })
            .collect::<Result<Vec<_>>>()?;

        let classification = classify(&patches);
        let aggregate_deviation = patches
            .iter()
            .filter_map(|p| p.deviation)
            .fold(0.0f32, f32::max);

        info!(
            "Judgment {}: max deviation {:.2}, {} failed, {} unsampled",
            classification,
            aggregate_deviation,
            patches.iter().filter(|p| p.status == PatchStatus::Failed).count(),
            patches.iter().filter(|p| p.is_unsampled()).count()
        );

        Ok(ChartJudgment {
            patches,
            classification,
            aggregate_deviation,
            metric: self.metric,
            output_path: None,
        })
    }
}

fn classify(patches: &[PatchJudgment]) -> Classification {
    if patches.iter().any(|p| p.status == PatchStatus::Failed) {
        Classification::Fail
    } else if patches.iter().any(|p| p.is_unsampled()) {
        Classification::Inconclusive
    } else {
        Classification::Pass
    }
}
