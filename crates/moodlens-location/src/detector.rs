//! Location guessing pipeline with fallbacks.

use moodlens_models::{LocationResult as Location, LocationSource};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::{LocationConfig, USER_AGENT};
use crate::error::LocationResult;
use crate::geocode::{format_place, Geocoder};
use crate::keywords::extract_keywords;
use crate::vision::VisionClient;

/// Guesses where a photo was taken. Never fails: every error along the way
/// is logged and the result falls back to [`Location::unknown`].
pub struct LocationDetector {
    vision: Option<VisionClient>,
    geocoder: Geocoder,
}

impl LocationDetector {
    pub fn new(config: LocationConfig) -> LocationResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let vision = VisionClient::new(http.clone(), &config);
        if vision.is_none() {
            info!("GOOGLE_VISION_API_KEY not set; location detection will report unknown");
        }

        Ok(Self {
            vision,
            geocoder: Geocoder::new(http, &config),
        })
    }

    pub fn from_env() -> LocationResult<Self> {
        Self::new(LocationConfig::from_env())
    }

    pub fn is_enabled(&self) -> bool {
        self.vision.is_some()
    }

    /// Landmark first, then place keywords in the image text, then unknown.
    pub async fn detect(&self, image: &[u8]) -> Location {
        let Some(vision) = &self.vision else {
            return Location::unknown();
        };

        match vision.landmark(image).await {
            Ok(Some(landmark)) => {
                debug!(landmark = %landmark, "Landmark recognized");
                return Location::new(landmark, LocationSource::Landmark);
            }
            Ok(None) => {}
            Err(e) => warn!("Landmark detection failed: {}", e),
        }

        let text = match vision.text(image).await {
            Ok(Some(text)) => text,
            Ok(None) => return Location::unknown(),
            Err(e) => {
                warn!("Text detection failed: {}", e);
                return Location::unknown();
            }
        };

        let Some(keyword) = extract_keywords(&text).into_iter().next() else {
            debug!("No place keywords in image text");
            return Location::unknown();
        };

        match self.geocoder.geocode(&keyword).await {
            Ok(Some(address)) => Location::new(format_place(&keyword, &address), LocationSource::Geocoded),
            Ok(None) => Location::new(keyword, LocationSource::Keyword),
            Err(e) => {
                warn!(keyword = %keyword, "Geocoding failed: {}", e);
                Location::new(keyword, LocationSource::Keyword)
            }
        }
    }
}
