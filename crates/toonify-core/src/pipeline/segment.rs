//! Background removal stage.
//!
//! The segmentation itself is an external collaborator behind the
//! [`Segmenter`] trait; this stage only bounds the call, validates what comes
//! back, and packages it as a [`PipelineResult`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use super::command::run_piped;
use super::decode_dimensions;
use crate::config::SegmentationConfig;
use crate::error::PipelineError;
use crate::types::{ArtifactKind, ArtifactLocation, NormalizedImage, PipelineResult, Stage};

/// A local image segmentation computation.
///
/// Uses `async_trait` because the session holds `Arc<dyn Segmenter>`.
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Name for logging (e.g., "rembg").
    fn name(&self) -> &str;

    /// Return the image with its background made transparent, encoded as PNG.
    async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>, PipelineError>;
}

/// Runs a local segmentation command (stdin → stdout).
pub struct CommandSegmenter {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSegmenter {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[async_trait]
impl Segmenter for CommandSegmenter {
    fn name(&self) -> &str {
        &self.command
    }

    async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>, PipelineError> {
        run_piped(&self.command, &self.args, image, self.timeout)
            .await
            .map_err(|e| PipelineError::background(e.to_string()))
    }
}

/// Executes the background removal stage.
pub struct BackgroundRemover {
    segmenter: Arc<dyn Segmenter>,
    timeout: Duration,
}

impl BackgroundRemover {
    pub fn new(segmenter: Arc<dyn Segmenter>, config: &SegmentationConfig) -> Self {
        Self {
            segmenter,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Strip the background from `image`.
    ///
    /// The output is fully decoded once to capture its dimensions; output
    /// that isn't a readable image counts as a failed removal.
    pub async fn run(&self, image: &NormalizedImage) -> Result<PipelineResult, PipelineError> {
        let start = Instant::now();
        tracing::debug!(
            "Removing background from {} with {}",
            image.name,
            self.segmenter.name()
        );

        let cutout = match timeout(self.timeout, self.segmenter.remove_background(&image.bytes))
            .await
        {
            Ok(result) => result.map_err(as_background_failure)?,
            Err(_) => {
                return Err(PipelineError::background(format!(
                    "{} timed out after {}ms",
                    self.segmenter.name(),
                    self.timeout.as_millis()
                )))
            }
        };

        let payload: Arc<[u8]> = cutout.into();
        let probe = payload.clone();
        let dimensions = tokio::task::spawn_blocking(move || decode_dimensions(&probe))
            .await
            .map_err(|e| PipelineError::background(format!("Task join error: {e}")))?
            .map_err(|e| PipelineError::background(format!("unreadable output: {e}")))?;

        tracing::debug!(
            "Background removed from {} in {:?} ({})",
            image.name,
            start.elapsed(),
            dimensions
        );

        Ok(PipelineResult {
            kind: ArtifactKind::BackgroundRemoved,
            payload: Some(payload),
            location: ArtifactLocation::InMemory,
            dimensions: Some(dimensions),
        })
    }
}

/// Keep segmenter failures attributed to this stage, whatever variant the
/// segmenter reported.
fn as_background_failure(error: PipelineError) -> PipelineError {
    match error.failed_stage() {
        Some(Stage::BackgroundRemoval) => error,
        _ => PipelineError::background(error.to_string()),
    }
}
