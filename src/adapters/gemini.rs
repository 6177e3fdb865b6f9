//! Gemini vision engine over the `generateContent` REST API.

use crate::core::crop::encode_png_base64;
use crate::core::text::{build_region_prompt, parse_detection_lines};
use crate::core::{DetectedRegion, OcrEngine};
use crate::utils::error::{OcrError, Result};
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENGINE_NAME: &str = "gemini";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_PROMPT: &str = "Extract the Khmer text from this image. Return only the text.";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct GeminiEngine {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    prompt: String,
}

impl GeminiEngine {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            prompt: DEFAULT_PROMPT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Whole-page mode: one request for all regions, one text per region.
    pub async fn extract_page(
        &self,
        page: &DynamicImage,
        regions: &[DetectedRegion],
    ) -> Result<Vec<String>> {
        let prompt = build_region_prompt(regions);
        let data = encode_png_base64(page)?;
        tracing::info!(
            "Sending page with {} regions to {}",
            regions.len(),
            self.model
        );

        let reply = self.generate(&prompt, data).await?;
        Ok(parse_detection_lines(&reply, regions.len()))
    }

    async fn generate(&self, prompt: &str, png_base64: String) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    RequestPart::Text { text: prompt },
                    RequestPart::Image {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: png_base64,
                        },
                    },
                ],
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ocr(
                ENGINE_NAME,
                format!("API returned {}: {}", status, body.trim()),
            ));
        }

        let parsed: GenerateResponse = response.json().await?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::ocr(ENGINE_NAME, "response has no candidates"))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
                return Err(OcrError::ocr(
                    ENGINE_NAME,
                    format!("no text returned (finish reason {})", reason),
                ));
            }
        }

        Ok(text)
    }
}

#[async_trait]
impl OcrEngine for GeminiEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let data = encode_png_base64(image)?;
        self.generate(&self.prompt, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{BoundingBox, BoxCoords};
    use httpmock::prelude::*;
    use image::{Rgb, RgbImage};
    use serde_json::json;

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])))
    }

    fn engine(server: &MockServer) -> GeminiEngine {
        GeminiEngine::new("test-key", DEFAULT_MODEL)
            .unwrap()
            .with_endpoint(server.base_url())
    }

    #[tokio::test]
    async fn test_recognize_joins_text_parts() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-2.0-flash:generateContent")
                .query_param("key", "test-key")
                .body_contains("inline_data")
                .body_contains("image/png")
                .body_contains("Extract the Khmer text from this image");
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "សួស្តី "}, {"text": "ពិភពលោក"}]},
                    "finishReason": "STOP"
                }]
            }));
        });

        let text = engine(&server).recognize(&image()).await.unwrap();

        mock.assert();
        assert_eq!(text, "សួស្តី ពិភពលោក");
    }

    #[tokio::test]
    async fn test_recognize_surfaces_api_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(403).body("API key not valid");
        });

        let err = engine(&server).recognize(&image()).await.unwrap_err();
        assert!(matches!(err, OcrError::OcrEngineError { .. }));
        assert!(err.to_string().contains("API key not valid"));
    }

    #[tokio::test]
    async fn test_recognize_blocked_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200)
                .json_body(json!({"candidates": [{"finishReason": "SAFETY"}]}));
        });

        let err = engine(&server).recognize(&image()).await.unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_extract_page_maps_reply_to_regions() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .body_contains("Detection 1: (5, 0) to (9, 3)");
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "Detection 0: ក\nDetection 1: [ខ]"}]}
                }]
            }));
        });

        let regions: Vec<DetectedRegion> = [BoxCoords::new(0, 0, 4, 3), BoxCoords::new(5, 0, 9, 3)]
            .iter()
            .enumerate()
            .map(|(detection_id, b)| DetectedRegion {
                detection_id,
                bounding_box: BoundingBox::from(*b),
                confidence: 0.5,
                class_id: 0,
                class_name: None,
            })
            .collect();

        let texts = engine(&server).extract_page(&image(), &regions).await.unwrap();

        mock.assert();
        assert_eq!(texts, vec!["ក", "ខ"]);
    }
}
