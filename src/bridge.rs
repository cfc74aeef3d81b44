//! Records exchanged with the host application
//!
//! Every analysis produces exactly one [`BridgeResponse`], serialized as
//! camelCase JSON with a `status` tag. Failures are a value, never a panic
//! or exception across the boundary.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::chart::LabColor;
use crate::color::ColorConverter;
use crate::error::{JudgeError, Result};
use crate::judgment::{ChartJudgment, Classification};
use crate::output::WriteOutcome;
use crate::pipeline::{AnalysisReport, ChartJudge};

/// Boundary result of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BridgeResponse {
    Success(JudgmentRecord),
    Failure(FailureRecord),
}

/// Successful judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgmentRecord {
    pub classification: Classification,
    pub aggregate_deviation: f32,
    pub patches: Vec<PatchRecord>,
    /// Path of the written output image, empty if skipped or failed
    pub destination_path: String,
    pub detection_confidence: f32,
    /// Present when the output image could not be written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_error: Option<FailureRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRecord {
    pub index: usize,
    pub name: String,
    /// `None` for unsampled patches
    pub sampled_color: Option<SampledColor>,
    pub deviation: Option<f32>,
    pub passed: bool,
    pub unsampled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledColor {
    pub lab: LabColor,
    pub hex: String,
}

/// Error crossing the boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    /// `decode_error`, `chart_not_found`, `write_error` or `internal_error`
    pub kind: String,
    pub message: String,
    pub user_message: String,
}

impl From<&JudgeError> for FailureRecord {
    fn from(err: &JudgeError) -> Self {
        Self {
            kind: err.kind().as_str().to_string(),
            message: err.to_string(),
            user_message: err.user_message(),
        }
    }
}

impl JudgmentRecord {
    fn from_judgment(judgment: &ChartJudgment, detection_confidence: f32) -> Self {
        let converter = ColorConverter::new();
        Self {
            classification: judgment.classification(),
            aggregate_deviation: judgment.aggregate_deviation(),
            patches: judgment
                .patches()
                .iter()
                .map(|p| PatchRecord {
                    index: p.index,
                    name: p.name.clone(),
                    sampled_color: p.sampled.map(|lab| SampledColor {
                        lab: lab.into(),
                        hex: converter.lab_to_hex(lab),
                    }),
                    deviation: p.deviation,
                    passed: p.passed(),
                    unsampled: p.is_unsampled(),
                })
                .collect(),
            destination_path: judgment
                .output_path()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            detection_confidence,
            write_error: None,
        }
    }
}

impl BridgeResponse {
    pub fn from_report(report: &AnalysisReport) -> Self {
        let mut record =
            JudgmentRecord::from_judgment(&report.judgment, report.detection.confidence);
        if let WriteOutcome::Failed(err) = &report.write {
            record.write_error = Some(FailureRecord::from(err));
        }
        BridgeResponse::Success(record)
    }

    pub fn from_result(result: &Result<AnalysisReport>) -> Self {
        match result {
            Ok(report) => Self::from_report(report),
            Err(err) => BridgeResponse::Failure(FailureRecord::from(err)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BridgeResponse::Success(_))
    }

    /// JSON encoding of the record
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"status":"failure","kind":"internal_error","message":"serialization failed: {}","userMessage":""}}"#,
                e.to_string().replace('"', "'")
            )
        })
    }
}

/// Analyze with `judge` and encode the boundary record
pub fn process(judge: &ChartJudge, source: &Path, destination: &Path) -> BridgeResponse {
    BridgeResponse::from_result(&judge.analyze(source, destination))
}
