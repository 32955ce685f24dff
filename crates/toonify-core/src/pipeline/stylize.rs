//! Cartoonization stage.
//!
//! Uploads the background-removed PNG to the stylization service as a
//! multipart form and expects `{"cartoonUrl": "<non-empty string>"}` back.
//! A 200 response with any other body is still a failure.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::fetch_remote;
use crate::config::StylizationConfig;
use crate::error::PipelineError;
use crate::types::{ArtifactKind, ArtifactLocation, PipelineResult, Stage};

/// Path of the cartoonize route, relative to the configured endpoint.
pub const CARTOONIZE_PATH: &str = "/api/cartoonize";

/// A remote stylization service.
#[async_trait]
pub trait Stylizer: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Stylize a PNG and return the URL of the result.
    async fn stylize(&self, png: &[u8]) -> Result<String, PipelineError>;
}

/// Stylizer backed by the cartoonize HTTP endpoint.
pub struct HttpStylizer {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpStylizer {
    pub fn new(config: &StylizationConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &StylizationConfig) -> Self {
        Self {
            client,
            url: format!(
                "{}{}",
                config.endpoint.trim_end_matches('/'),
                CARTOONIZE_PATH
            ),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Full URL requests are sent to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Stylizer for HttpStylizer {
    fn name(&self) -> &str {
        "cartoonize"
    }

    async fn stylize(&self, png: &[u8]) -> Result<String, PipelineError> {
        let part = Part::bytes(png.to_vec())
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|e| PipelineError::stylization(format!("Invalid upload part: {e}")))?;
        let form = Form::new().part("image", part);

        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PipelineError::stylization(format!("Request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::StylizationFailed {
                message: format!("HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::stylization(format!("Failed to read response: {e}")))?;

        parse_cartoon_url(&body)
    }
}

/// Extract `cartoonUrl` from a response body.
///
/// Missing, empty, or non-string values are all failures.
pub fn parse_cartoon_url(body: &[u8]) -> Result<String, PipelineError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| PipelineError::stylization(format!("Response is not JSON: {e}")))?;

    match value.get("cartoonUrl") {
        Some(serde_json::Value::String(url)) if !url.is_empty() => Ok(url.clone()),
        Some(serde_json::Value::String(_)) => {
            Err(PipelineError::stylization("Invalid cartoon URL received: empty"))
        }
        Some(other) => Err(PipelineError::stylization(format!(
            "Invalid cartoon URL received: {other}"
        ))),
        None => Err(PipelineError::stylization(
            "Invalid cartoon URL received: missing cartoonUrl",
        )),
    }
}

/// Executes the cartoonization stage.
pub struct Cartoonizer {
    stylizer: Arc<dyn Stylizer>,
    client: reqwest::Client,
}

impl Cartoonizer {
    pub fn new(stylizer: Arc<dyn Stylizer>, client: reqwest::Client) -> Self {
        Self { stylizer, client }
    }

    /// Stylize a background-removed artifact.
    ///
    /// Uses the in-memory payload when present, otherwise re-fetches it from
    /// the artifact's remote location.
    pub async fn run(&self, source: &PipelineResult) -> Result<PipelineResult, PipelineError> {
        let start = Instant::now();

        let png: Arc<[u8]> = match (&source.payload, source.url()) {
            (Some(payload), _) => payload.clone(),
            (None, Some(url)) => fetch_remote(&self.client, url)
                .await
                .map_err(PipelineError::stylization)?
                .into(),
            (None, None) => {
                return Err(PipelineError::stylization(
                    "background-removed image has no payload or location",
                ))
            }
        };

        let url = self.stylizer.stylize(&png).await.map_err(|e| match e.failed_stage() {
            Some(Stage::Stylization) => e,
            _ => PipelineError::stylization(e.to_string()),
        })?;
        tracing::debug!(
            "{} produced {} in {:?}",
            self.stylizer.name(),
            url,
            start.elapsed()
        );

        Ok(PipelineResult {
            kind: ArtifactKind::Stylized,
            payload: None,
            location: ArtifactLocation::Remote(url),
            dimensions: None,
        })
    }
}
