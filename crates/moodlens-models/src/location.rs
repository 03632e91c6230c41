//! Location detection results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Description returned when no step of the pipeline produced a result.
pub const UNKNOWN_LOCATION: &str = "unknown";

/// Which step of the location pipeline produced the description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    /// Vision API landmark annotation
    Landmark,
    /// Keyword extracted from image text and resolved by the geocoder
    Geocoded,
    /// Keyword extracted from image text, geocoding unavailable
    Keyword,
    /// Nothing found
    Unknown,
}

impl LocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationSource::Landmark => "landmark",
            LocationSource::Geocoded => "geocoded",
            LocationSource::Keyword => "keyword",
            LocationSource::Unknown => "unknown",
        }
    }
}

/// Outcome of location detection for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LocationResult {
    pub description: String,
    pub source: LocationSource,
}

impl LocationResult {
    pub fn new(description: impl Into<String>, source: LocationSource) -> Self {
        Self {
            description: description.into(),
            source,
        }
    }

    /// The fallback result used whenever detection fails.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_LOCATION, LocationSource::Unknown)
    }

    pub fn is_unknown(&self) -> bool {
        self.source == LocationSource::Unknown
    }
}
