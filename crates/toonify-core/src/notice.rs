//! User-facing notifications.
//!
//! Give [`crate::Toonify`] a [`PipelineObserver`] to receive
//! a [`Notice`] for every upload, stage result, export, reset and failure.
//! The CLI prints them; a GUI would show them as toasts.

use std::fmt;
use std::path::PathBuf;

use crate::error::PipelineError;
use crate::types::{ArtifactKind, Dimensions};

/// Something the user should be told about.
#[derive(Debug, Clone)]
pub enum Notice {
    Uploaded {
        name: String,
        dimensions: Option<Dimensions>,
    },
    BackgroundRemoved {
        dimensions: Option<Dimensions>,
    },
    Stylized {
        url: String,
    },
    Exported {
        kind: ArtifactKind,
        path: PathBuf,
    },
    ResetComplete,
    Failed {
        error: PipelineError,
    },
}

impl Notice {
    pub fn is_failure(&self) -> bool {
        matches!(self, Notice::Failed { .. })
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Uploaded { name, .. } => write!(f, "Image uploaded successfully: {name}"),
            Notice::BackgroundRemoved { .. } => write!(f, "Background removed successfully!"),
            Notice::Stylized { .. } => write!(f, "Cartoon created successfully!"),
            Notice::Exported { kind, path } => {
                write!(f, "{} downloaded to {}", export_title(*kind), path.display())
            }
            Notice::ResetComplete => write!(f, "Reset complete!"),
            Notice::Failed { error } => match error {
                PipelineError::UnsupportedFormat { .. } => {
                    write!(f, "Please select a valid image file ({error})")
                }
                PipelineError::OversizeFile { max, .. } => write!(
                    f,
                    "File size should be less than {} MB ({error})",
                    max / (1024 * 1024)
                ),
                PipelineError::BackgroundRemovalFailed { .. } => {
                    write!(f, "Background removal failed. Try again. ({error})")
                }
                PipelineError::StylizationFailed { .. } => {
                    write!(f, "Cartoon conversion failed. Try again later. ({error})")
                }
                PipelineError::ExportFailed { .. } => write!(f, "{error}"),
            },
        }
    }
}

fn export_title(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::BackgroundRemoved => "Bg-removed image",
        ArtifactKind::Stylized => "Cartoon",
    }
}

/// Receives notices as the session changes.
///
/// Implementations must be `Send + Sync`. The default method is a no-op.
pub trait PipelineObserver: Send + Sync {
    fn on_notice(&self, notice: &Notice) {
        let _ = notice;
    }
}

/// Observer that ignores every notice. This is the default.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
