//! Error types for the chart_judge library

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for chart_judge operations
pub type Result<T> = std::result::Result<T, JudgeError>;

/// Boxed source error carried by I/O-facing variants
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Why an input image could not be turned into a pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeReason {
    /// The file does not exist
    NotFound,
    /// The file exists but is not a raster format we can decode
    UnsupportedFormat,
    /// The file is truncated or its contents are invalid
    Corrupt,
    /// The file exists but could not be read (permissions, I/O failure)
    Unreadable,
}

impl fmt::Display for DecodeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DecodeReason::NotFound => "not found",
            DecodeReason::UnsupportedFormat => "unsupported format",
            DecodeReason::Corrupt => "corrupt",
            DecodeReason::Unreadable => "unreadable",
        };
        f.write_str(text)
    }
}

/// Coarse error classification reported across the platform boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input unreadable or corrupt
    Decode,
    /// Chart not detected with sufficient confidence
    ChartNotFound,
    /// Output persistence failed
    Write,
    /// Invariant violation or configuration bug
    Internal,
}

impl ErrorKind {
    /// Stable string used in boundary records
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode_error",
            ErrorKind::ChartNotFound => "chart_not_found",
            ErrorKind::Write => "write_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comprehensive error types for chart judgment operations
#[derive(Error, Debug)]
pub enum JudgeError {
    /// Image file could not be loaded or decoded
    #[error("Failed to load image {} ({reason}): {message}", path.display())]
    Decode {
        path: PathBuf,
        reason: DecodeReason,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Calibration chart could not be located in the image
    #[error("Chart not found: {reason}")]
    ChartNotFound {
        reason: String,
        best_confidence: Option<f32>,
    },

    /// Annotated output image could not be written
    #[error("Failed to write output image {}: {message}", path.display())]
    Write {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Chart specification violates a structural invariant
    #[error("Invalid chart specification: {reason}")]
    InvalidChartSpec { reason: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// Configuration or chart definition file could not be read or parsed
    #[error("Configuration error in {}: {message}", path.display())]
    Config {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Unexpected invariant violation
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl JudgeError {
    /// Create a decode error with context
    pub fn decode<E>(
        path: impl Into<PathBuf>,
        reason: DecodeReason,
        message: impl Into<String>,
        source: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Decode {
            path: path.into(),
            reason,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a write error with context
    pub fn write<E>(path: impl Into<PathBuf>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Write {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error with context
    pub fn config<E>(path: impl Into<PathBuf>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, value: impl fmt::Display) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Boundary classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            JudgeError::Decode { .. } => ErrorKind::Decode,
            JudgeError::ChartNotFound { .. } => ErrorKind::ChartNotFound,
            JudgeError::Write { .. } => ErrorKind::Write,
            JudgeError::InvalidChartSpec { .. }
            | JudgeError::InvalidParameter { .. }
            | JudgeError::Config { .. }
            | JudgeError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error indicates a recoverable condition
    ///
    /// A missing chart can be fixed by retaking the photo; a failed write
    /// still leaves the judgment intact.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            JudgeError::ChartNotFound { .. } | JudgeError::Write { .. }
        )
    }

    /// Get user-friendly error description for application display
    pub fn user_message(&self) -> String {
        match self {
            JudgeError::Decode {
                reason: DecodeReason::NotFound,
                ..
            } => "The image file could not be found.".to_string(),
            JudgeError::Decode { .. } => {
                "Unreadable image. Please check the file format and try again.".to_string()
            }
            JudgeError::ChartNotFound { .. } => {
                "Please retake the photo, the color chart is not visible.".to_string()
            }
            JudgeError::Write { .. } => {
                "The result was computed but the annotated image could not be saved.".to_string()
            }
            _ => "Chart analysis failed due to an internal error.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_boundary_strings() {
        let not_found = JudgeError::ChartNotFound {
            reason: "no candidates".into(),
            best_confidence: None,
        };
        assert_eq!(not_found.kind().as_str(), "chart_not_found");

        let decode = JudgeError::decode(
            "a.png",
            DecodeReason::Corrupt,
            "bad header",
            std::io::Error::new(std::io::ErrorKind::InvalidData, "bad"),
        );
        assert_eq!(decode.kind().as_str(), "decode_error");

        let write = JudgeError::Write {
            path: "out.png".into(),
            message: "denied".into(),
            source: None,
        };
        assert_eq!(write.kind().as_str(), "write_error");

        let spec = JudgeError::InvalidChartSpec {
            reason: "overlap".into(),
        };
        assert_eq!(spec.kind(), ErrorKind::Internal);
        assert_eq!(JudgeError::internal("x").kind().as_str(), "internal_error");
    }

    #[test]
    fn test_recoverable_errors() {
        let write = JudgeError::Write {
            path: "out.png".into(),
            message: "denied".into(),
            source: None,
        };
        assert!(write.is_recoverable());
        assert!(!JudgeError::internal("broken").is_recoverable());
    }

    #[test]
    fn test_user_messages_distinguish_missing_from_corrupt() {
        let missing = JudgeError::Decode {
            path: "a.jpg".into(),
            reason: DecodeReason::NotFound,
            message: "missing".into(),
            source: None,
        };
        let corrupt = JudgeError::Decode {
            path: "a.jpg".into(),
            reason: DecodeReason::Corrupt,
            message: "truncated".into(),
            source: None,
        };
        assert_ne!(missing.user_message(), corrupt.user_message());
        assert!(corrupt.user_message().contains("Unreadable"));

        let chart = JudgeError::ChartNotFound {
            reason: "x".into(),
            best_confidence: Some(0.2),
        };
        assert!(chart.user_message().contains("retake"));
    }

    #[test]
    fn test_display_includes_path() {
        let err = JudgeError::Write {
            path: "/readonly/out.png".into(),
            message: "permission denied".into(),
            source: None,
        };
        let text = err.to_string();
        assert!(text.contains("/readonly/out.png"));
        assert!(text.contains("permission denied"));
    }
}
