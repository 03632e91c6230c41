//! Location detection for uploaded photos.
//!
//! Uses Google Cloud Vision for landmark and text recognition and
//! OpenStreetMap Nominatim to expand place keywords into an address.
//! Every failure degrades to an `"unknown"` location.

pub mod config;
pub mod detector;
pub mod error;
pub mod geocode;
pub mod keywords;
mod retry;
pub mod vision;

pub use config::LocationConfig;
pub use detector::LocationDetector;
pub use error::{LocationError, LocationResult};
pub use geocode::{format_place, Address, Geocoder};
pub use keywords::extract_keywords;
pub use vision::VisionClient;
