//! Unified image loading with support for multiple formats
//!
//! This module provides a single entry point for loading images from various
//! raster formats into an immutable sRGB pixel buffer.
//!
//! Formats are whatever the `image` crate decodes (JPEG, PNG, WebP, TIFF
//! and the rest of its default set). The file contents decide the decoder;
//! the extension only matters when the contents are not recognized, so a
//! PNG saved under a `.jpg` name still loads.
//!
//! Decoding is atomic: either the full buffer is returned or a
//! [`JudgeError::Decode`] describing whether the file was missing,
//! unsupported, unreadable or corrupt. All images are converted to 8-bit RGB.

use image::{ImageError, ImageFormat, ImageReader, RgbImage};
use log::debug;
use std::path::Path;

use crate::error::{DecodeReason, JudgeError, Result};

/// Decoded sRGB image, immutable once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pixels: RgbImage,
}

impl Image {
    /// Wrap an existing RGB buffer
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Number of color channels (always 3, sRGB)
    pub fn channels(&self) -> u8 {
        3
    }

    /// Borrow the pixel buffer
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Take ownership of the pixel buffer
    pub fn into_pixels(self) -> RgbImage {
        self.pixels
    }
}

/// Load an image from disk and convert to 8-bit sRGB
///
/// The format is sniffed from the file contents, falling back to the
/// extension.
///
/// # Errors
///
/// Returns `JudgeError::Decode` with reason:
/// - `NotFound` if the file does not exist
/// - `Unreadable` if it cannot be opened
/// - `UnsupportedFormat` if no decoder matches
/// - `Corrupt` if decoding fails or the image is empty
///
/// # Example
///
/// ```rust,no_run
/// use chart_judge::image_loader::load_image;
/// use std::path::Path;
///
/// let image = load_image(Path::new("photo.jpg"))?;
/// println!("Loaded image: {}x{}", image.width(), image.height());
/// # Ok::<(), chart_judge::JudgeError>(())
/// ```
pub fn load_image(path: &Path) -> Result<Image> {
    if let Err(e) = std::fs::metadata(path) {
        let reason = if e.kind() == std::io::ErrorKind::NotFound {
            DecodeReason::NotFound
        } else {
            DecodeReason::Unreadable
        };
        return Err(JudgeError::decode(path, reason, "cannot access image file", e));
    }

    let mut reader = ImageReader::open(path)
        .map_err(|e| JudgeError::decode(path, DecodeReason::Unreadable, "failed to open image file", e))?
        .with_guessed_format()
        .map_err(|e| JudgeError::decode(path, DecodeReason::Unreadable, "failed to read image header", e))?;
    if reader.format().is_none() {
        if let Ok(format) = ImageFormat::from_path(path) {
            reader.set_format(format);
        }
    }
    debug!("Decoding {} as {:?}", path.display(), reader.format());

    if reader.format().is_none() {
        return Err(JudgeError::Decode {
            path: path.to_path_buf(),
            reason: DecodeReason::UnsupportedFormat,
            message: "unknown image format".to_string(),
            source: None,
        });
    }

    let decoded = reader.decode().map_err(|e| {
        // The file opened, so read errors during decoding mean truncation.
        let reason = match e {
            ImageError::Unsupported(_) => DecodeReason::UnsupportedFormat,
            _ => DecodeReason::Corrupt,
        };
        JudgeError::decode(path, reason, "failed to decode image", e)
    })?;

    let rgb = decoded.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(JudgeError::Decode {
            path: path.to_path_buf(),
            reason: DecodeReason::Corrupt,
            message: "image has no pixels".to_string(),
            source: None,
        });
    }

    debug!("Loaded {} ({}x{})", path.display(), rgb.width(), rgb.height());
    Ok(Image::from_rgb(rgb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_load_missing_file() {
        let err = load_image(Path::new("definitely_missing_file.png")).unwrap_err();
        match err {
            JudgeError::Decode { reason, .. } => assert_eq!(reason, DecodeReason::NotFound),
            other => panic!("Expected Decode error, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nthis is not a png body").unwrap();

        let err = load_image(&path).unwrap_err();
        match err {
            JudgeError::Decode { reason, .. } => assert_eq!(reason, DecodeReason::Corrupt),
            other => panic!("Expected Decode error, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_png_with_jpeg_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0001.jpg");
        let rgb = RgbImage::from_pixel(4, 4, Rgb([10, 200, 30]));
        rgb.save_with_format(&path, ImageFormat::Png).unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!(image.pixels(), &rgb);
    }

    #[test]
    fn test_load_unknown_extension_sniffs_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        let rgb = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        rgb.save_with_format(&path, ImageFormat::Png).unwrap();

        assert_eq!(load_image(&path).unwrap().pixels(), &rgb);
    }

    #[test]
    fn test_load_unknown_contents_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.dat");
        std::fs::write(&path, b"plain text, not an image").unwrap();

        match load_image(&path).unwrap_err() {
            JudgeError::Decode { reason, .. } => assert_eq!(reason, DecodeReason::UnsupportedFormat),
            other => panic!("Expected Decode error, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_png_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        let mut rgb = RgbImage::new(3, 2);
        rgb.put_pixel(0, 0, Rgb([255, 0, 0]));
        rgb.put_pixel(2, 1, Rgb([0, 0, 255]));
        rgb.save(&path).unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!(image.width(), 3);
        assert_eq!(image.height(), 2);
        assert_eq!(image.channels(), 3);
        assert_eq!(image.pixels().get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(image.pixels().get_pixel(2, 1), &Rgb([0, 0, 255]));
    }
}
