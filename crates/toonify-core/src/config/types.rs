//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum normalized file size in mebibytes
    pub max_file_size_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
        }
    }
}

impl LimitsConfig {
    /// Size ceiling in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// File intake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Extensions converted to JPEG before entering the pipeline
    pub convertible_extensions: Vec<String>,

    /// JPEG quality used when re-encoding converted containers (1-100)
    pub jpeg_quality: u8,

    /// Container conversion timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Command that decodes a container from stdin to PNG on stdout
    pub decoder_command: String,

    /// Arguments passed to `decoder_command`
    pub decoder_args: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            convertible_extensions: vec!["heic".to_string(), "heif".to_string()],
            jpeg_quality: 90,
            decode_timeout_ms: 30_000,
            decoder_command: "magick".to_string(),
            decoder_args: vec!["-".to_string(), "png:-".to_string()],
        }
    }
}

/// Local background segmentation settings.
///
/// The command reads the image on stdin and writes the cutout PNG to stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub command: String,
    pub args: Vec<String>,

    /// Segmentation timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            command: "rembg".to_string(),
            args: vec!["i".to_string()],
            timeout_ms: 300_000,
        }
    }
}

/// Remote cartoonization service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StylizationConfig {
    /// Base address; requests go to `{endpoint}/api/cartoonize`
    pub endpoint: String,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for StylizationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            timeout_ms: 120_000,
        }
    }
}

/// Synthetic progress schedule for background removal.
///
/// Below `fast_until` the value advances by `fast_step` per tick, then by
/// `slow_step`, and never passes `ceiling` while the call is pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub tick_ms: u64,
    pub fast_until: u8,
    pub fast_step: u8,
    pub slow_step: u8,
    pub ceiling: u8,

    /// How long 100% stays visible before decaying to 0
    pub settle_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_ms: 150,
            fast_until: 30,
            fast_step: 3,
            slow_step: 1,
            ceiling: 90,
            settle_ms: 1200,
        }
    }
}

impl ProgressConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Artifact export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory downloads are written to
    pub output_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
