//! Location client configuration.

use std::time::Duration;

pub const DEFAULT_VISION_URL: &str = "https://vision.googleapis.com/v1/images:annotate";
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
/// Nominatim's usage policy requires an identifying agent.
pub const USER_AGENT: &str = concat!("moodlens/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct LocationConfig {
    /// Google Cloud Vision API key; vision steps are skipped without one
    pub api_key: Option<String>,
    /// Full `images:annotate` endpoint
    pub vision_url: String,
    /// Nominatim base URL (without `/search`)
    pub nominatim_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries for transient failures
    pub max_retries: u32,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            vision_url: DEFAULT_VISION_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 0,
        }
    }
}

impl LocationConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GOOGLE_VISION_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            vision_url: std::env::var("VISION_API_URL")
                .unwrap_or_else(|_| DEFAULT_VISION_URL.to_string()),
            nominatim_url: std::env::var("NOMINATIM_URL")
                .unwrap_or_else(|_| DEFAULT_NOMINATIM_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("LOCATION_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            max_retries: std::env::var("LOCATION_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }

    pub fn vision_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

// Hand-written so the key never lands in logs.
impl std::fmt::Debug for LocationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("vision_url", &self.vision_url)
            .field("nominatim_url", &self.nominatim_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LocationConfig::default();
        assert!(!config.vision_enabled());
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.nominatim_url, DEFAULT_NOMINATIM_URL);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = LocationConfig {
            api_key: Some("secret-key".into()),
            ..LocationConfig::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret-key"));
        assert!(printed.contains("<redacted>"));
    }
}
