//! Engine configuration: detection tolerance, polling periods, SDK waits and
//! the platform API location.
//!
//! Every field has a default, so an empty TOML document is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How far ahead of a pause point a tick may land and still trigger it.
    pub tolerance_seconds: f64,
    /// Resume position after a correct answer, relative to the pause point.
    pub resume_offset_seconds: f64,
    pub youtube_poll_ms: u64,
    pub vimeo_poll_ms: u64,
    pub rutube_poll_ms: u64,
    pub vk_poll_ms: u64,
    /// Upper bound for script injection plus the provider's ready signal.
    pub sdk_ready_timeout_ms: u64,
    /// Warn when a Rutube frame has said nothing for this long after mount.
    pub rutube_silence_timeout_ms: u64,
    pub api: ApiConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tolerance_seconds: 0.5,
            resume_offset_seconds: 1.0,
            youtube_poll_ms: 500,
            vimeo_poll_ms: 500,
            rutube_poll_ms: 300,
            vk_poll_ms: 500,
            sdk_ready_timeout_ms: 10_000,
            rutube_silence_timeout_ms: 15_000,
            api: ApiConfig::default(),
        }
    }
}

/// Location of the platform API serving answer checks and progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub lecture_id: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            lecture_id: None,
            token: None,
            timeout_secs: 15,
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        log::info!("Loaded sync config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tolerance_seconds.is_finite() || self.tolerance_seconds < 0.0 {
            return Err(ConfigError::Invalid {
                field: "tolerance_seconds",
                reason: format!("must be a non-negative number, got {}", self.tolerance_seconds),
            });
        }
        if !self.resume_offset_seconds.is_finite() || self.resume_offset_seconds < 0.0 {
            return Err(ConfigError::Invalid {
                field: "resume_offset_seconds",
                reason: format!(
                    "must be a non-negative number, got {}",
                    self.resume_offset_seconds
                ),
            });
        }
        for (field, value) in [
            ("youtube_poll_ms", self.youtube_poll_ms),
            ("vimeo_poll_ms", self.vimeo_poll_ms),
            ("rutube_poll_ms", self.rutube_poll_ms),
            ("vk_poll_ms", self.vk_poll_ms),
            ("sdk_ready_timeout_ms", self.sdk_ready_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn youtube_poll(&self) -> Duration {
        Duration::from_millis(self.youtube_poll_ms)
    }

    pub fn vimeo_poll(&self) -> Duration {
        Duration::from_millis(self.vimeo_poll_ms)
    }

    pub fn rutube_poll(&self) -> Duration {
        Duration::from_millis(self.rutube_poll_ms)
    }

    pub fn vk_poll(&self) -> Duration {
        Duration::from_millis(self.vk_poll_ms)
    }

    pub fn sdk_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.sdk_ready_timeout_ms)
    }

    pub fn rutube_silence_timeout(&self) -> Duration {
        Duration::from_millis(self.rutube_silence_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.tolerance_seconds, 0.5);
        assert_eq!(config.rutube_poll(), Duration::from_millis(300));
    }

    #[test]
    fn test_partial_override() {
        let config = SyncConfig::from_toml_str(
            r#"
            tolerance_seconds = 0.25
            youtube_poll_ms = 250

            [api]
            base_url = "https://lms.example.com"
            lecture_id = "42"
            "#,
        )
        .unwrap();
        assert_eq!(config.tolerance_seconds, 0.25);
        assert_eq!(config.youtube_poll_ms, 250);
        assert_eq!(config.vimeo_poll_ms, 500);
        assert_eq!(config.api.base_url.as_deref(), Some("https://lms.example.com"));
        assert_eq!(config.api.timeout_secs, 15);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = SyncConfig::from_toml_str("tolerance_seconds = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "tolerance_seconds", .. }));

        let err = SyncConfig::from_toml_str("vk_poll_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "vk_poll_ms", .. }));

        let err = SyncConfig::from_toml_str("tolerance_seconds = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resume_offset_seconds = 2.0").unwrap();
        let config = SyncConfig::load(file.path()).unwrap();
        assert_eq!(config.resume_offset_seconds, 2.0);

        let missing = SyncConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
