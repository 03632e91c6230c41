//! Application state.

use std::sync::Arc;

use moodlens_location::LocationDetector;
use moodlens_media::{CascadeSet, EmotionClassifier, FaceAnalyzer, MediaResult, SampleOptions};
use tracing::{info, warn};

use crate::cache::AnalysisCache;
use crate::config::{AnalysisConfig, ApiConfig};
use crate::history::History;
use crate::jobs::JobRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub analysis: AnalysisConfig,
    pub analyzer: Arc<FaceAnalyzer>,
    /// `None` when location lookups are not configured
    pub location: Option<Arc<LocationDetector>>,
    pub cache: Arc<AnalysisCache>,
    pub history: Arc<History>,
    pub jobs: Arc<JobRegistry>,
}

impl AppState {
    /// Load the cascades named by `analysis` and set up the location client.
    pub fn new(config: ApiConfig, analysis: AnalysisConfig) -> MediaResult<Self> {
        let cascades = CascadeSet::load(&analysis.cascade_dir, analysis.detector_backend)?;
        info!(taxonomy = %analysis.taxonomy, "Emotion classifier ready");
        let analyzer = FaceAnalyzer::new(cascades, EmotionClassifier::new(analysis.taxonomy));

        let location = match LocationDetector::from_env() {
            Ok(detector) if detector.is_enabled() => Some(Arc::new(detector)),
            Ok(_) => None,
            Err(e) => {
                warn!("Location detection disabled: {}", e);
                None
            }
        };

        Ok(Self::with_analyzer(config, analysis, analyzer, location))
    }

    /// Build state around an existing analyzer.
    pub fn with_analyzer(
        config: ApiConfig,
        analysis: AnalysisConfig,
        analyzer: FaceAnalyzer,
        location: Option<Arc<LocationDetector>>,
    ) -> Self {
        let cache = Arc::new(AnalysisCache::new(analysis.cache_capacity));
        let history = Arc::new(History::new(analysis.history_limit));
        let jobs = Arc::new(JobRegistry::new(analysis.job_limit));
        Self {
            config,
            analysis,
            analyzer: Arc::new(analyzer),
            location,
            cache,
            history,
            jobs,
        }
    }

    /// Frame sampling for a job, with an optional per-request interval.
    pub fn sample_options(&self, frame_skip: Option<u32>) -> SampleOptions {
        SampleOptions {
            frame_skip: frame_skip.unwrap_or(self.analysis.frame_skip),
            max_width: self.analysis.video_max_width,
            max_frames: self.analysis.video_max_frames,
        }
    }
}
