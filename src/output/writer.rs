//! Output image persistence
//!
//! Renders the optional white-balance correction and judgment overlay onto
//! a copy of the source pixels and saves it to the destination. The output
//! format follows the destination extension.

use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::calibration::WhiteBalanceEstimator;
use crate::chart::ChartSpec;
use crate::config::OutputConfig;
use crate::detection::ChartInstance;
use crate::error::{JudgeError, Result};
use crate::image_loader::Image;
use crate::judgment::ChartJudgment;
use crate::output::annotate::annotate;

/// What happened to the output image of an analysis
#[derive(Debug)]
pub enum WriteOutcome {
    /// Image written at this path
    Written(PathBuf),
    /// No destination was requested
    Skipped,
    /// Writing failed; the judgment is unaffected
    Failed(JudgeError),
}

impl WriteOutcome {
    pub fn written_path(&self) -> Option<&Path> {
        match self {
            WriteOutcome::Written(path) => Some(path),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&JudgeError> {
        match self {
            WriteOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Writes corrected and annotated output images
#[derive(Debug, Clone, Default)]
pub struct OutputWriter {
    config: OutputConfig,
}

impl OutputWriter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Write the output image for `judgment` to `destination`
    ///
    /// `source` is the path the image was loaded from; writing onto it is
    /// refused unless overwriting is allowed.
    ///
    /// # Errors
    ///
    /// Returns `JudgeError::Write` if the destination is the source image,
    /// its extension names no writable format, or saving fails.
    pub fn write(
        &self,
        image: &Image,
        instance: &ChartInstance,
        spec: &ChartSpec,
        judgment: &ChartJudgment,
        source: &Path,
        destination: &Path,
    ) -> Result<PathBuf> {
        if destination.as_os_str().is_empty() {
            return Err(write_error(destination, "destination path is empty"));
        }
        if !self.config.allow_overwrite && is_same_file(source, destination) {
            return Err(write_error(
                destination,
                "destination is the source image and overwriting is not allowed",
            ));
        }

        let format = image::ImageFormat::from_path(destination)
            .map_err(|e| JudgeError::write(destination, "unsupported output format", e))?;
        if !format.writing_enabled() {
            return Err(write_error(
                destination,
                format!("cannot encode {:?} images", format),
            ));
        }

        let mut output = image.pixels().clone();
        if self.config.white_balance {
            match WhiteBalanceEstimator::new().estimate(judgment) {
                Some(balance) => output = balance.apply(&output),
                None => debug!("White balance requested but not estimable"),
            }
        }
        if self.config.annotate {
            annotate(&mut output, instance, spec, judgment, self.config.line_thickness);
        }

        output
            .save_with_format(destination, format)
            .map_err(|e| JudgeError::write(destination, "failed to save output image", e))?;

        info!("Wrote output image {}", destination.display());
        Ok(destination.to_path_buf())
    }
}

fn write_error(path: &Path, message: impl Into<String>) -> JudgeError {
    JudgeError::Write {
        path: path.to_path_buf(),
        message: message.into(),
        source: None,
    }
}

/// True if both paths name the same existing file
fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartPlacement;
    use crate::color::PatchSample;
    use crate::judgment::JudgmentEngine;
    use image::RgbImage;

    fn fixture() -> (Image, ChartInstance, ChartSpec, ChartJudgment) {
        let spec = ChartSpec::color_checker_classic();
        let placement = ChartPlacement::new([10.0, 10.0], [180.0, 120.0]);
        let instance = ChartInstance::new(placement.homography().unwrap(), (200, 140), 1.0).unwrap();
        let samples: Vec<PatchSample> = spec
            .patches()
            .iter()
            .map(|p| PatchSample::Sampled {
                lab: p.reference,
                pixel_count: 100,
            })
            .collect();
        let judgment = JudgmentEngine::new().judge(&samples, &spec).unwrap();
        let image = Image::from_rgb(RgbImage::from_pixel(200, 140, image::Rgb([90, 90, 90])));
        (image, instance, spec, judgment)
    }

    #[test]
    fn test_write_png() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.png");
        let destination = dir.path().join("out.png");
        let (image, instance, spec, judgment) = fixture();

        let written = OutputWriter::default()
            .write(&image, &instance, &spec, &judgment, &source, &destination)
            .unwrap();
        assert_eq!(written, destination);
        let reloaded = image::open(&destination).unwrap().to_rgb8();
        assert_eq!(reloaded.dimensions(), (200, 140));
        assert_ne!(reloaded, *image.pixels());
    }

    #[test]
    fn test_refuses_to_overwrite_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.png");
        let (image, instance, spec, judgment) = fixture();
        image.pixels().save(&source).unwrap();

        let err = OutputWriter::default()
            .write(&image, &instance, &spec, &judgment, &source, &source)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Write);

        let aliased = dir.path().join(".").join("in.png");
        assert!(OutputWriter::default()
            .write(&image, &instance, &spec, &judgment, &source, &aliased)
            .is_err());

        let config = OutputConfig {
            allow_overwrite: true,
            ..OutputConfig::default()
        };
        assert!(OutputWriter::new(config)
            .write(&image, &instance, &spec, &judgment, &source, &source)
            .is_ok());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let (image, instance, spec, judgment) = fixture();
        let err = OutputWriter::default()
            .write(
                &image,
                &instance,
                &spec,
                &judgment,
                Path::new("in.png"),
                &dir.path().join("out.xyz"),
            )
            .unwrap_err();
        assert!(matches!(err, JudgeError::Write { .. }));
    }

    #[test]
    fn test_unwritable_directory() {
        let (image, instance, spec, judgment) = fixture();
        let err = OutputWriter::default()
            .write(
                &image,
                &instance,
                &spec,
                &judgment,
                Path::new("in.png"),
                Path::new("/nonexistent-dir/sub/out.png"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Write);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_plain_copy_without_annotation() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("copy.png");
        let (image, instance, spec, judgment) = fixture();
        let config = OutputConfig {
            annotate: false,
            ..OutputConfig::default()
        };
        OutputWriter::new(config)
            .write(&image, &instance, &spec, &judgment, Path::new("in.png"), &destination)
            .unwrap();
        let reloaded = image::open(&destination).unwrap().to_rgb8();
        assert_eq!(reloaded, *image.pixels());
    }
}
