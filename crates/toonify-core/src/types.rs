//! Core data types for the Toonify pipeline.
//!
//! These types describe what flows between the intake normalizer, the two
//! pipeline stages and the exporter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A file exactly as the user selected it.
///
/// Immutable once accepted: a new selection replaces it wholesale.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name including extension (no directory)
    pub name: String,

    /// Declared media type ("image/png", "image/heic", ...)
    pub media_type: String,

    /// Raw file contents
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, deriving its media type from the extension.
    pub fn read(path: &Path) -> crate::error::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let media_type = media_type_for(&name);
        Ok(Self::new(name, media_type, bytes))
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Guess a media type from a file name's extension.
///
/// HEIC/HEIF are not known to the `image` crate but must still be accepted
/// at the selection boundary so they can be converted.
pub fn media_type_for(name: &str) -> String {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "heic" => "image/heic".to_string(),
        "heif" => "image/heif".to_string(),
        _ => image::ImageFormat::from_extension(&ext)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} × {}", self.width, self.height)
    }
}

/// A source file that is ready for the pipeline.
///
/// Invariants: `media_type` starts with `image/` and `size() <= max_file_size`.
/// Only the intake normalizer constructs these.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// File name after any container conversion ("photo.heic" becomes "photo.jpg")
    pub name: String,

    /// Media type after any container conversion
    pub media_type: String,

    /// Pipeline-ready image bytes
    pub bytes: Arc<[u8]>,

    /// Probed pixel dimensions, if the header could be read
    pub dimensions: Option<Dimensions>,

    /// BLAKE3 hash of `bytes`
    pub content_hash: String,
}

impl NormalizedImage {
    /// Image size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// The two ordered pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BackgroundRemoval,
    Stylization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::BackgroundRemoval => write!(f, "background removal"),
            Stage::Stylization => write!(f, "cartoonization"),
        }
    }
}

/// Which stage produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    BackgroundRemoved,
    Stylized,
}

impl ArtifactKind {
    /// Label used in exported file names.
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::BackgroundRemoved => "bg-removed",
            ArtifactKind::Stylized => "cartoon",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where an artifact can be retrieved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// Held in memory by the session
    InMemory,
    /// Hosted by a remote service
    Remote(String),
}

/// Output of a completed stage.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub kind: ArtifactKind,

    /// Encoded image bytes, when held locally
    pub payload: Option<Arc<[u8]>>,

    pub location: ArtifactLocation,

    /// Pixel dimensions, when known
    pub dimensions: Option<Dimensions>,
}

impl PipelineResult {
    /// The remote URL of this artifact, if it has one.
    pub fn url(&self) -> Option<&str> {
        match &self.location {
            ArtifactLocation::Remote(url) => Some(url),
            ArtifactLocation::InMemory => None,
        }
    }
}

/// Snapshot of the session's pipeline status, as read by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStatus {
    /// Whether a stage is in flight
    pub running: bool,

    /// The stage a one-click retry would re-run
    pub last_failed_stage: Option<Stage>,

    /// Synthetic progress, 0-100
    pub progress_percent: u8,
}

/// Derived position of a session in the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Nothing selected
    Idle,
    /// Image loaded, no stage run yet
    Ready,
    RemovingBackground,
    BackgroundReady,
    BackgroundFailed,
    Stylizing,
    Stylized,
    StylizationFailed,
}
