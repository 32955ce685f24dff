//! Image pipeline components.
//!
//! - **command**: Pipe bytes through a local command with a timeout
//! - **intake**: Validate and normalize a selected file
//! - **progress**: Synthetic progress while segmentation runs
//! - **segment**: Background removal stage
//! - **stylize**: Cartoonization stage
//! - **export**: Save stage artifacts to disk

pub mod command;
pub mod export;
pub mod intake;
pub mod progress;
pub mod segment;
pub mod stylize;

// Re-exports for convenient access
pub use command::CommandError;
pub use export::Exporter;
pub use intake::{CommandDecoder, ContainerDecoder, IntakeNormalizer};
pub use progress::{ProgressEstimator, ProgressGuard, ProgressMeter};
pub use segment::{BackgroundRemover, CommandSegmenter, Segmenter};
pub use stylize::{Cartoonizer, HttpStylizer, Stylizer};

use image::GenericImageView;

use crate::types::Dimensions;

/// Read pixel dimensions from an encoded image's header without decoding it.
pub(crate) fn probe_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(Dimensions { width, height })
}

/// Fully decode an image and report its dimensions.
///
/// Used where a truncated or corrupt payload must be rejected rather than
/// just having a readable header.
pub(crate) fn decode_dimensions(bytes: &[u8]) -> Result<Dimensions, image::ImageError> {
    let image = image::load_from_memory(bytes)?;
    let (width, height) = image.dimensions();
    Ok(Dimensions { width, height })
}

/// Download a remote artifact.
pub(crate) async fn fetch_remote(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, String> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Fetching {url} failed: {e}"))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(format!("Fetching {url} failed: HTTP {status}"));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| format!("Reading {url} failed: {e}"))?;
    Ok(bytes.to_vec())
}
