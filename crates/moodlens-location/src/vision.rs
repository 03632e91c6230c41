//! Google Cloud Vision `images:annotate` client.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LocationConfig;
use crate::error::{LocationError, LocationResult};
use crate::retry::with_retry;

/// Vision feature types used here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisionFeature {
    LandmarkDetection,
    TextDetection,
}

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    image: ImageContent<'a>,
    features: [FeatureRequest; 1],
}

#[derive(Debug, Serialize)]
struct ImageContent<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeatureRequest {
    #[serde(rename = "type")]
    kind: VisionFeature,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    landmark_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    error: Option<VisionStatus>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct VisionStatus {
    #[serde(default)]
    message: String,
}

pub struct VisionClient {
    http: Client,
    api_key: String,
    url: String,
    max_retries: u32,
}

impl VisionClient {
    /// `None` when no API key is configured.
    pub fn new(http: Client, config: &LocationConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            http,
            api_key,
            url: config.vision_url.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Most likely landmark shown in the image.
    pub async fn landmark(&self, image: &[u8]) -> LocationResult<Option<String>> {
        let response = self.annotate(image, VisionFeature::LandmarkDetection, 1).await?;
        Ok(response
            .landmark_annotations
            .into_iter()
            .map(|a| a.description)
            .find(|d| !d.trim().is_empty()))
    }

    /// Full text found in the image (the first text annotation).
    pub async fn text(&self, image: &[u8]) -> LocationResult<Option<String>> {
        let response = self.annotate(image, VisionFeature::TextDetection, 1).await?;
        Ok(response
            .text_annotations
            .into_iter()
            .next()
            .map(|a| a.description)
            .filter(|d| !d.trim().is_empty()))
    }

    async fn annotate(&self, image: &[u8], kind: VisionFeature, max_results: u32) -> LocationResult<ImageResponse> {
        let content = STANDARD.encode(image);
        let body = AnnotateRequest {
            requests: [ImageRequest {
                image: ImageContent { content: &content },
                features: [FeatureRequest { kind, max_results }],
            }],
        };

        debug!(feature = ?kind, bytes = image.len(), "Calling Vision API");

        let response = with_retry(self.max_retries, || async {
            let response = self
                .http
                .post(&self.url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .await?;
            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(LocationError::from_status("Vision API", status, text));
            }
            Ok(response)
        })
        .await?;

        let parsed: AnnotateResponse = response.json().await?;
        let first = parsed.responses.into_iter().next().unwrap_or_default();
        if let Some(status) = &first.error {
            return Err(LocationError::InvalidResponse(format!(
                "Vision API error: {}",
                status.message
            )));
        }
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> VisionClient {
        let config = LocationConfig {
            api_key: Some("test-key".into()),
            vision_url: format!("{}/v1/images:annotate", server.uri()),
            ..LocationConfig::default()
        };
        VisionClient::new(Client::new(), &config).unwrap()
    }

    #[test]
    fn test_no_key_no_client() {
        assert!(VisionClient::new(Client::new(), &LocationConfig::default()).is_none());
    }

    #[test]
    fn test_request_shape() {
        let body = AnnotateRequest {
            requests: [ImageRequest {
                image: ImageContent { content: "AAA=" },
                features: [FeatureRequest {
                    kind: VisionFeature::LandmarkDetection,
                    max_results: 1,
                }],
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({"requests": [{"image": {"content": "AAA="},
                                 "features": [{"type": "LANDMARK_DETECTION", "maxResults": 1}]}]})
        );
    }

    #[tokio::test]
    async fn test_landmark_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images:annotate"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "requests": [{"image": {"content": "aW1n"},
                              "features": [{"type": "LANDMARK_DETECTION", "maxResults": 1}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responses": [{"landmarkAnnotations": [{"description": "Petronas Towers", "score": 0.9}]}]
            })))
            .mount(&server)
            .await;

        let found = client(&server).landmark(b"img").await.unwrap();
        assert_eq!(found.as_deref(), Some("Petronas Towers"));
    }

    #[tokio::test]
    async fn test_empty_response_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{}]})))
            .mount(&server)
            .await;

        let c = client(&server);
        assert_eq!(c.landmark(b"img").await.unwrap(), None);
        assert_eq!(c.text(b"img").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key invalid"))
            .mount(&server)
            .await;

        let err = client(&server).text(b"img").await.unwrap_err();
        assert!(matches!(err, LocationError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_per_image_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responses": [{"error": {"code": 3, "message": "Bad image data."}}]
            })))
            .mount(&server)
            .await;

        let err = client(&server).landmark(b"img").await.unwrap_err();
        assert!(err.to_string().contains("Bad image data"));
    }
}
