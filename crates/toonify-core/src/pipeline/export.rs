//! Save stage artifacts to disk as `<label>-<epochMillis>.png`.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::fetch_remote;
use crate::error::PipelineError;
use crate::types::{ArtifactKind, PipelineResult};

/// Writes artifacts into a download directory.
pub struct Exporter {
    output_dir: PathBuf,
    client: reqwest::Client,
}

impl Exporter {
    pub fn new(output_dir: PathBuf, client: reqwest::Client) -> Self {
        Self { output_dir, client }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export `result` under `kind`'s label.
    ///
    /// A missing result is a no-op (`Ok(None)`). Remote artifacts are
    /// downloaded first.
    pub async fn export(
        &self,
        result: Option<&PipelineResult>,
        kind: ArtifactKind,
    ) -> Result<Option<PathBuf>, PipelineError> {
        let Some(result) = result else {
            return Ok(None);
        };

        let fail = |message: String| PipelineError::ExportFailed {
            label: kind.label().to_string(),
            message,
        };

        let bytes = match (&result.payload, result.url()) {
            (Some(payload), _) => payload.to_vec(),
            (None, Some(url)) => fetch_remote(&self.client, url).await.map_err(fail)?,
            (None, None) => return Err(fail("artifact has no payload or location".to_string())),
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| fail(format!("Cannot create {}: {e}", self.output_dir.display())))?;

        let path = self.output_dir.join(file_name(kind, epoch_millis()));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| fail(format!("Cannot write {}: {e}", path.display())))?;

        tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(Some(path))
    }
}

/// Download file name for an artifact exported at `millis`.
pub fn file_name(kind: ArtifactKind, millis: u128) -> String {
    format!("{}-{}.png", kind.label(), millis)
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
