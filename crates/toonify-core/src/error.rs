//! Error types for the Toonify pipeline.
//!
//! Errors are organized by stage so that every failure the user sees names
//! the file or artifact involved and the step that went wrong. Every
//! [`PipelineError`] is recoverable: the session keeps running and the error
//! is reported as a notice.

use thiserror::Error;

use crate::types::Stage;

/// Top-level error type for Toonify operations.
#[derive(Error, Debug)]
pub enum ToonifyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading a selected file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, one variant per failure class the user can hit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Not an image, or a container that could not be converted
    #[error("Unsupported format for {file_name}: {reason}")]
    UnsupportedFormat { file_name: String, reason: String },

    /// File exceeds the size ceiling (checked after any conversion)
    #[error("File too large: {file_name} ({size} bytes > {max} bytes)")]
    OversizeFile {
        file_name: String,
        size: u64,
        max: u64,
    },

    /// The segmentation computation failed or produced no usable image
    #[error("Background removal failed: {message}")]
    BackgroundRemovalFailed { message: String },

    /// The stylization endpoint failed or returned a malformed body
    #[error("Cartoon conversion failed: {message}")]
    StylizationFailed {
        message: String,
        status_code: Option<u16>,
    },

    /// Saving an artifact to disk failed
    #[error("Export of {label} failed: {message}")]
    ExportFailed { label: String, message: String },
}

impl PipelineError {
    pub(crate) fn unsupported(file_name: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            file_name: file_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn background(message: impl Into<String>) -> Self {
        Self::BackgroundRemovalFailed {
            message: message.into(),
        }
    }

    pub(crate) fn stylization(message: impl Into<String>) -> Self {
        Self::StylizationFailed {
            message: message.into(),
            status_code: None,
        }
    }

    /// The stage this error should be retried from, if any.
    ///
    /// Only stage failures are retryable; intake and export errors are not
    /// tied to a stage.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::BackgroundRemovalFailed { .. } => Some(Stage::BackgroundRemoval),
            Self::StylizationFailed { .. } => Some(Stage::Stylization),
            _ => None,
        }
    }
}

/// Convenience type alias for Toonify results.
pub type Result<T> = std::result::Result<T, ToonifyError>;
