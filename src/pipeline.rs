//! End-to-end chart analysis
//!
//! Runs Loader → Locator → Sampler → Judgment → Writer for one request.
//! A `ChartJudge` holds only immutable state, so one instance can serve
//! concurrent analyses from several threads.

use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::chart::ChartSpec;
use crate::color::PatchSampler;
use crate::config::EngineConfig;
use crate::detection::{ChartInstance, ChartLocator};
use crate::error::Result;
use crate::image_loader::{load_image, Image};
use crate::judgment::{ChartJudgment, JudgmentEngine};
use crate::output::{OutputWriter, WriteOutcome};

/// Detection details reported alongside a judgment
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSummary {
    pub confidence: f32,
    pub residual: f64,
    pub matched_patches: usize,
    /// Chart corners in image pixels, TL, TR, BR, BL
    pub outline: Vec<[f64; 2]>,
}

impl DetectionSummary {
    fn from_instance(instance: &ChartInstance) -> Self {
        Self {
            confidence: instance.confidence(),
            residual: instance.residual(),
            matched_patches: instance.matched_patches(),
            outline: instance.outline().unwrap_or_default(),
        }
    }
}

/// Result of one analysis request
#[derive(Debug)]
pub struct AnalysisReport {
    pub judgment: ChartJudgment,
    pub detection: DetectionSummary,
    pub write: WriteOutcome,
}

/// Chart judgment pipeline bound to one chart and configuration
#[derive(Debug, Clone)]
pub struct ChartJudge {
    spec: Arc<ChartSpec>,
    config: EngineConfig,
    locator: ChartLocator,
    sampler: PatchSampler,
    engine: JudgmentEngine,
    writer: OutputWriter,
}

impl Default for ChartJudge {
    /// Built-in color checker with default configuration
    fn default() -> Self {
        Self::from_parts(
            Arc::new(ChartSpec::color_checker_classic()),
            EngineConfig::default(),
        )
    }
}

impl ChartJudge {
    /// Create a pipeline for `spec`
    ///
    /// # Errors
    ///
    /// Returns `JudgeError::InvalidParameter` if `config` fails validation.
    pub fn new(spec: Arc<ChartSpec>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(spec, config))
    }

    fn from_parts(spec: Arc<ChartSpec>, config: EngineConfig) -> Self {
        Self {
            locator: ChartLocator::with_config(config.locator.clone()),
            sampler: PatchSampler::from_config(&config.sampler),
            engine: JudgmentEngine::from_config(&config.judgment),
            writer: OutputWriter::new(config.output.clone()),
            spec,
            config,
        }
    }

    pub fn spec(&self) -> &ChartSpec {
        &self.spec
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Locate, sample and judge an already decoded image
    ///
    /// Sampling only happens after a successful, confident detection.
    pub fn judge_image(&self, image: &Image) -> Result<(ChartInstance, ChartJudgment)> {
        let instance = self.locator.locate(image, &self.spec)?;
        let samples = self.sampler.sample(image, &instance, &self.spec)?;
        let judgment = self.engine.judge(&samples, &self.spec)?;
        Ok((instance, judgment))
    }

    /// Analyze the image at `source` and write the output to `destination`
    ///
    /// An empty `destination` skips writing. A failed write is reported in
    /// [`AnalysisReport::write`] and never discards the judgment.
    ///
    /// # Errors
    ///
    /// Returns `JudgeError::Decode` if the image cannot be loaded and
    /// `JudgeError::ChartNotFound` if no chart is detected.
    pub fn analyze(&self, source: &Path, destination: &Path) -> Result<AnalysisReport> {
        info!("Analyzing {}", source.display());
        let image = load_image(source)?;
        let (instance, judgment) = self.judge_image(&image)?;
        let detection = DetectionSummary::from_instance(&instance);

        if destination.as_os_str().is_empty() {
            return Ok(AnalysisReport {
                judgment,
                detection,
                write: WriteOutcome::Skipped,
            });
        }

        let write = self
            .writer
            .write(&image, &instance, &self.spec, &judgment, source, destination);
        let (judgment, write) = match write {
            Ok(path) => (judgment.with_output_path(path.clone()), WriteOutcome::Written(path)),
            Err(err) => {
                warn!("Output not written: {}", err);
                (judgment, WriteOutcome::Failed(err))
            }
        };

        Ok(AnalysisReport {
            judgment,
            detection,
            write,
        })
    }
}
