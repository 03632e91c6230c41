//! API configuration.

use std::path::PathBuf;

use moodlens_media::{DetectorBackend, DEFAULT_FRAME_SKIP};
use moodlens_models::Taxonomy;
use tracing::warn;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second per client IP
    pub rate_limit_rps: u32,
    /// Max request body size (uploads included)
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Expose Prometheus metrics at /metrics
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 100 * 1024 * 1024, // 100MB, videos included
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

/// Detection, classification and bookkeeping settings.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Directory holding the face/eye/smile cascades
    pub cascade_dir: PathBuf,
    pub detector_backend: DetectorBackend,
    pub taxonomy: Taxonomy,
    /// Analyze every Nth video frame
    pub frame_skip: u32,
    /// Downscale wider video frames to this width
    pub video_max_width: Option<u32>,
    /// Stop a video job after this many sampled frames
    pub video_max_frames: Option<u64>,
    /// Recent analyses kept for the history view
    pub history_limit: usize,
    /// Memoized image analyses
    pub cache_capacity: usize,
    /// Finished video jobs kept for polling
    pub job_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cascade_dir: PathBuf::from("models"),
            detector_backend: DetectorBackend::Native,
            taxonomy: Taxonomy::Basic,
            frame_skip: DEFAULT_FRAME_SKIP,
            video_max_width: Some(640),
            video_max_frames: None,
            history_limit: 50,
            cache_capacity: 100,
            job_limit: 100,
        }
    }
}

impl AnalysisConfig {
    /// Create config from environment variables. Unparseable values fall
    /// back to defaults with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let detector_backend = match std::env::var("DETECTOR_BACKEND") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                warn!("{}; using {}", e, defaults.detector_backend);
                defaults.detector_backend
            }),
            Err(_) => defaults.detector_backend,
        };

        let taxonomy = match std::env::var("EMOTION_TAXONOMY") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                warn!("{}; using {} taxonomy", e, defaults.taxonomy);
                defaults.taxonomy
            }),
            Err(_) => defaults.taxonomy,
        };

        // 0 disables the limit
        let video_max_width = match env_parse::<u32>("VIDEO_MAX_WIDTH") {
            Some(0) => None,
            Some(w) => Some(w),
            None => defaults.video_max_width,
        };
        let video_max_frames = match env_parse::<u64>("VIDEO_MAX_FRAMES") {
            Some(0) => None,
            other => other.or(defaults.video_max_frames),
        };

        Self {
            cascade_dir: std::env::var("CASCADE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cascade_dir),
            detector_backend,
            taxonomy,
            frame_skip: env_parse::<u32>("FRAME_SKIP")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.frame_skip),
            video_max_width,
            video_max_frames,
            history_limit: env_parse("HISTORY_LIMIT").unwrap_or(defaults.history_limit),
            cache_capacity: env_parse("CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            job_limit: env_parse("JOB_LIMIT").unwrap_or(defaults.job_limit),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert!(!config.is_production());
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_analysis_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.frame_skip, 5);
        assert_eq!(config.taxonomy, Taxonomy::Basic);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.job_limit, 100);
    }

    #[test]
    fn test_production_is_case_insensitive() {
        let config = ApiConfig {
            environment: "Production".into(),
            ..ApiConfig::default()
        };
        assert!(config.is_production());
    }
}
