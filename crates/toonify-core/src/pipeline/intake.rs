//! File intake: container conversion, validation, and a read-only probe.
//!
//! HEIC/HEIF photos can't be decoded by the rest of the pipeline, so they are
//! converted to baseline JPEG before any other check runs. The size ceiling
//! applies to the converted bytes, not the original upload.

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::command::run_piped;
use super::probe_dimensions;
use crate::config::{Config, IntakeConfig, LimitsConfig};
use crate::error::PipelineError;
use crate::types::{NormalizedImage, SourceFile};

/// Decodes a container format the `image` crate cannot read.
#[async_trait]
pub trait ContainerDecoder: Send + Sync {
    /// Decode container bytes into a raster image.
    async fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, String>;
}

/// Decodes containers by piping them through a local converter command
/// that writes PNG to stdout.
pub struct CommandDecoder {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDecoder {
    pub fn new(config: &IntakeConfig) -> Self {
        Self {
            command: config.decoder_command.clone(),
            args: config.decoder_args.clone(),
            timeout: Duration::from_millis(config.decode_timeout_ms),
        }
    }
}

#[async_trait]
impl ContainerDecoder for CommandDecoder {
    async fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, String> {
        let png = run_piped(&self.command, &self.args, bytes, self.timeout)
            .await
            .map_err(|e| e.to_string())?;

        tokio::task::spawn_blocking(move || image::load_from_memory(&png))
            .await
            .map_err(|e| format!("Task join error: {e}"))?
            .map_err(|e| format!("Converter output is not a readable image: {e}"))
    }
}

/// Validates and canonicalizes user-selected files.
pub struct IntakeNormalizer {
    limits: LimitsConfig,
    intake: IntakeConfig,
    decoder: Arc<dyn ContainerDecoder>,
}

impl IntakeNormalizer {
    /// Create a normalizer that converts containers with [`CommandDecoder`].
    pub fn new(config: &Config) -> Self {
        let decoder = Arc::new(CommandDecoder::new(&config.intake));
        Self::with_decoder(config, decoder)
    }

    /// Create a normalizer with a custom container decoder.
    pub fn with_decoder(config: &Config, decoder: Arc<dyn ContainerDecoder>) -> Self {
        Self {
            limits: config.limits.clone(),
            intake: config.intake.clone(),
            decoder,
        }
    }

    /// Whether `name` has an extension that must be converted first.
    pub fn needs_conversion(&self, name: &str) -> bool {
        extension(name).is_some_and(|ext| {
            self.intake
                .convertible_extensions
                .iter()
                .any(|c| c.eq_ignore_ascii_case(ext))
        })
    }

    /// Turn a selection into a pipeline-ready image.
    ///
    /// An empty selection is not an error and yields `Ok(None)`.
    pub async fn normalize(
        &self,
        file: Option<SourceFile>,
    ) -> Result<Option<NormalizedImage>, PipelineError> {
        let Some(file) = file else {
            return Ok(None);
        };

        let (name, media_type, bytes) = if self.needs_conversion(&file.name) {
            self.convert(&file).await?
        } else {
            (file.name, file.media_type, file.bytes)
        };

        if !media_type.starts_with("image/") {
            return Err(PipelineError::unsupported(
                &name,
                format!("{media_type} is not an image type"),
            ));
        }

        let size = bytes.len() as u64;
        let max = self.limits.max_file_size_bytes();
        if size > max {
            return Err(PipelineError::OversizeFile {
                file_name: name,
                size,
                max,
            });
        }

        let dimensions = probe_dimensions(&bytes);
        if dimensions.is_none() {
            tracing::warn!("Could not read dimensions of {}", name);
        }
        let content_hash = blake3::hash(&bytes).to_hex().to_string();

        tracing::debug!(
            "Accepted {} ({}, {} bytes, {:?})",
            name,
            media_type,
            size,
            dimensions
        );

        Ok(Some(NormalizedImage {
            name,
            media_type,
            bytes,
            dimensions,
            content_hash,
        }))
    }

    /// Decode a container and re-encode it as JPEG.
    async fn convert(
        &self,
        file: &SourceFile,
    ) -> Result<(String, String, Arc<[u8]>), PipelineError> {
        tracing::debug!("Converting {} to JPEG", file.name);
        let limit = Duration::from_millis(self.intake.decode_timeout_ms);

        let decoded = match timeout(limit, self.decoder.decode(&file.bytes)).await {
            Ok(Ok(image)) => image,
            Ok(Err(message)) => return Err(PipelineError::unsupported(&file.name, message)),
            Err(_) => {
                return Err(PipelineError::unsupported(
                    &file.name,
                    format!("conversion timed out after {}ms", self.intake.decode_timeout_ms),
                ))
            }
        };

        let quality = self.intake.jpeg_quality;
        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&decoded.to_rgb8(), quality))
            .await
            .map_err(|e| PipelineError::unsupported(&file.name, format!("Task join error: {e}")))?
            .map_err(|e| PipelineError::unsupported(&file.name, e.to_string()))?;

        Ok((
            rename_to_jpg(&file.name),
            "image/jpeg".to_string(),
            jpeg.into(),
        ))
    }
}

fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

/// Replace the final extension with `.jpg`.
fn rename_to_jpg(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.jpg"),
        None => format!("{name}.jpg"),
    }
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder.encode_image(image)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::png_bytes;
    use crate::types::Dimensions;

    /// Decodes any "container" to a fixed-size image.
    struct FixedDecoder {
        width: u32,
        height: u32,
    }

    #[async_trait]
    impl ContainerDecoder for FixedDecoder {
        async fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage, String> {
            Ok(DynamicImage::new_rgb8(self.width, self.height))
        }
    }

    struct FailingDecoder;

    #[async_trait]
    impl ContainerDecoder for FailingDecoder {
        async fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage, String> {
            Err("no decoder for this container".to_string())
        }
    }

    struct SlowDecoder;

    #[async_trait]
    impl ContainerDecoder for SlowDecoder {
        async fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage, String> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(DynamicImage::new_rgb8(1, 1))
        }
    }

    fn normalizer(decoder: Arc<dyn ContainerDecoder>) -> IntakeNormalizer {
        IntakeNormalizer::with_decoder(&Config::default(), decoder)
    }

    fn fixed() -> Arc<dyn ContainerDecoder> {
        Arc::new(FixedDecoder {
            width: 64,
            height: 48,
        })
    }

    #[tokio::test]
    async fn test_empty_selection_is_noop() {
        let result = normalizer(fixed()).normalize(None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_png_passes_through_unchanged() {
        let bytes = png_bytes(20, 10);
        let file = SourceFile::new("cat.png", "image/png", bytes.clone());
        let image = normalizer(fixed())
            .normalize(Some(file))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(image.name, "cat.png");
        assert_eq!(image.media_type, "image/png");
        assert_eq!(&*image.bytes, bytes.as_slice());
        assert_eq!(
            image.dimensions,
            Some(Dimensions {
                width: 20,
                height: 10
            })
        );
        assert_eq!(image.content_hash.len(), 64);
    }

    #[tokio::test]
    async fn test_heic_converted_to_jpeg() {
        // 9 MiB of container bytes; only the converted size counts
        let file = SourceFile::new("photo.heic", "image/heic", vec![0u8; 9 * 1024 * 1024]);
        let image = normalizer(fixed())
            .normalize(Some(file))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(image.name, "photo.jpg");
        assert_eq!(image.media_type, "image/jpeg");
        assert_eq!(&image.bytes[..3], &[0xFF, 0xD8, 0xFF]);
        assert_eq!(
            image.dimensions,
            Some(Dimensions {
                width: 64,
                height: 48
            })
        );
    }

    #[tokio::test]
    async fn test_heif_extension_is_case_insensitive() {
        // Declared type is irrelevant for containers; conversion decides it
        let file = SourceFile::new("IMG_0042.HEIF", "application/octet-stream", vec![1, 2, 3]);
        let image = normalizer(fixed())
            .normalize(Some(file))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(image.name, "IMG_0042.jpg");
        assert_eq!(image.media_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_conversion_failure_is_unsupported_format() {
        let file = SourceFile::new("photo.heic", "image/heic", vec![1, 2, 3]);
        let err = normalizer(Arc::new(FailingDecoder))
            .normalize(Some(file))
            .await
            .unwrap_err();

        match err {
            PipelineError::UnsupportedFormat { file_name, reason } => {
                assert_eq!(file_name, "photo.heic");
                assert!(reason.contains("no decoder"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_conversion_timeout_is_unsupported_format() {
        let mut config = Config::default();
        config.intake.decode_timeout_ms = 20;
        let normalizer = IntakeNormalizer::with_decoder(&config, Arc::new(SlowDecoder));

        let file = SourceFile::new("slow.heic", "image/heic", vec![1]);
        let err = normalizer.normalize(Some(file)).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_non_image_rejected() {
        let file = SourceFile::new("notes.txt", "text/plain", b"hello".to_vec());
        let err = normalizer(fixed()).normalize(Some(file)).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn test_oversize_png_rejected() {
        let size = 11 * 1024 * 1024;
        let file = SourceFile::new("huge.png", "image/png", vec![0u8; size]);
        let err = normalizer(fixed()).normalize(Some(file)).await.unwrap_err();

        assert_eq!(
            err,
            PipelineError::OversizeFile {
                file_name: "huge.png".to_string(),
                size: size as u64,
                max: 10 * 1024 * 1024,
            }
        );
    }

    #[tokio::test]
    async fn test_exactly_at_limit_accepted() {
        let file = SourceFile::new("edge.png", "image/png", vec![0u8; 10 * 1024 * 1024]);
        let image = normalizer(fixed())
            .normalize(Some(file))
            .await
            .unwrap()
            .unwrap();
        // Not a real PNG, so the probe finds nothing; that's not an error
        assert!(image.dimensions.is_none());
    }

    #[tokio::test]
    async fn test_converted_size_governs() {
        // A large decoded image whose JPEG exceeds a 1 MiB ceiling
        let mut config = Config::default();
        config.limits.max_file_size_mb = 1;
        let noisy = Arc::new(NoiseDecoder);
        let normalizer = IntakeNormalizer::with_decoder(&config, noisy);

        let file = SourceFile::new("tiny.heic", "image/heic", vec![0u8; 10]);
        let err = normalizer.normalize(Some(file)).await.unwrap_err();
        match err {
            PipelineError::OversizeFile { file_name, .. } => assert_eq!(file_name, "tiny.jpg"),
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Produces high-entropy pixels that compress poorly.
    struct NoiseDecoder;

    #[async_trait]
    impl ContainerDecoder for NoiseDecoder {
        async fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage, String> {
            let mut state: u32 = 0x1234_5678;
            let image = RgbImage::from_fn(1536, 1536, |_, _| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let [r, g, b, _] = state.to_le_bytes();
                image::Rgb([r, g, b])
            });
            Ok(DynamicImage::ImageRgb8(image))
        }
    }

    #[test]
    fn test_rename_to_jpg() {
        assert_eq!(rename_to_jpg("photo.heic"), "photo.jpg");
        assert_eq!(rename_to_jpg("my.trip.HEIF"), "my.trip.jpg");
        assert_eq!(rename_to_jpg("noext"), "noext.jpg");
    }

    #[test]
    fn test_needs_conversion() {
        let normalizer = normalizer(fixed());
        assert!(normalizer.needs_conversion("a.heic"));
        assert!(normalizer.needs_conversion("a.HeIf"));
        assert!(!normalizer.needs_conversion("a.heic.png"));
        assert!(!normalizer.needs_conversion("heic"));
    }
}
