//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.intake.jpeg_quality == 0 || self.intake.jpeg_quality > 100 {
            return Err(ConfigError::ValidationError(
                "intake.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.intake.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "intake.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.segmentation.command.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "segmentation.command must not be empty".into(),
            ));
        }
        if self.segmentation.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "segmentation.timeout_ms must be > 0".into(),
            ));
        }
        if !self.stylization.endpoint.starts_with("http://")
            && !self.stylization.endpoint.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(
                "stylization.endpoint must be an http:// or https:// URL".into(),
            ));
        }
        if self.stylization.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "stylization.timeout_ms must be > 0".into(),
            ));
        }
        if self.progress.tick_ms == 0 {
            return Err(ConfigError::ValidationError(
                "progress.tick_ms must be > 0".into(),
            ));
        }
        // 100 is reserved for "resolved"; the estimator must stay below it.
        if self.progress.ceiling == 0 || self.progress.ceiling >= 100 {
            return Err(ConfigError::ValidationError(
                "progress.ceiling must be between 1 and 99".into(),
            ));
        }
        if self.progress.fast_step == 0 || self.progress.slow_step == 0 {
            return Err(ConfigError::ValidationError(
                "progress.fast_step and progress.slow_step must be > 0".into(),
            ));
        }
        Ok(())
    }
}
