//! Judgment module
//!
//! This module compares sampled patch colors with the chart's reference
//! model and classifies the chart as PASS, FAIL or INCONCLUSIVE.

pub mod engine;

pub use engine::{ChartJudgment, Classification, JudgmentEngine, PatchJudgment, PatchStatus};
