//! OpenStreetMap Nominatim forward geocoding.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::LocationConfig;
use crate::error::{LocationError, LocationResult};
use crate::retry::with_retry;

/// Address parts Nominatim returns with `addressdetails=1`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Address {
    /// City, falling back to town.
    pub fn locality(&self) -> Option<&str> {
        self.city.as_deref().or(self.town.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct Place {
    #[serde(default)]
    address: Address,
}

pub struct Geocoder {
    http: Client,
    base_url: String,
    max_retries: u32,
}

impl Geocoder {
    pub fn new(http: Client, config: &LocationConfig) -> Self {
        Self {
            http,
            base_url: config.nominatim_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        }
    }

    /// Address of the best match for `query`, if any.
    pub async fn geocode(&self, query: &str) -> LocationResult<Option<Address>> {
        let url = format!("{}/search", self.base_url);
        debug!(query, "Geocoding keyword");

        let response = with_retry(self.max_retries, || async {
            let response = self
                .http
                .get(&url)
                .query(&[
                    ("q", query),
                    ("format", "json"),
                    ("addressdetails", "1"),
                    ("limit", "1"),
                ])
                .send()
                .await?;
            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(LocationError::from_status("Nominatim", status, text));
            }
            Ok(response)
        })
        .await?;

        let places: Vec<Place> = response.json().await?;
        Ok(places.into_iter().next().map(|p| p.address))
    }
}

/// `"<keyword>, <city|town>, <state>, <country>"`, leaving out empty parts.
pub fn format_place(keyword: &str, address: &Address) -> String {
    std::iter::once(Some(keyword))
        .chain([address.locality(), address.state.as_deref(), address.country.as_deref()])
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder(server: &MockServer) -> Geocoder {
        let config = LocationConfig {
            nominatim_url: format!("{}/", server.uri()),
            ..LocationConfig::default()
        };
        Geocoder::new(Client::new(), &config)
    }

    #[test]
    fn test_format_place() {
        let address = Address {
            city: None,
            town: Some("Kundasang".into()),
            state: Some("Sabah".into()),
            country: Some("Malaysia".into()),
        };
        assert_eq!(
            format_place("Mount Kinabalu", &address),
            "Mount Kinabalu, Kundasang, Sabah, Malaysia"
        );
        assert_eq!(format_place("SMK Seri", &Address::default()), "SMK Seri");
    }

    #[test]
    fn test_city_preferred_over_town() {
        let address = Address {
            city: Some("Kuala Lumpur".into()),
            town: Some("Ampang".into()),
            ..Address::default()
        };
        assert_eq!(address.locality(), Some("Kuala Lumpur"));
    }

    #[tokio::test]
    async fn test_geocode_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Jalan Ampang"))
            .and(query_param("addressdetails", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"display_name": "Jalan Ampang, KL",
                 "address": {"city": "Kuala Lumpur", "state": "Kuala Lumpur", "country": "Malaysia"}},
                {"address": {"city": "Elsewhere"}}
            ])))
            .mount(&server)
            .await;

        let address = geocoder(&server).geocode("Jalan Ampang").await.unwrap().unwrap();
        assert_eq!(address.city.as_deref(), Some("Kuala Lumpur"));
        assert_eq!(address.country.as_deref(), Some("Malaysia"));
    }

    #[tokio::test]
    async fn test_geocode_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        assert!(geocoder(&server).geocode("SMK Nowhere").await.unwrap().is_none());
    }
}
