//! Color conversion and patch sampling module
//!
//! This module handles sRGB/Lab conversions, color difference metrics,
//! and extraction of representative patch colors from a located chart.

pub mod conversion;
pub mod sampler;

pub use conversion::{ColorConverter, DeltaEMetric};
pub use sampler::{PatchSample, PatchSampler, UnsampledReason};
