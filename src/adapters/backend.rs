use crate::core::{BackendReport, OcrJob, OcrOutcome, ResultSink};
use crate::domain::model::StructuredResult;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SENT_MESSAGE: &str = "Results sent to backend";
pub const SKIPPED_MESSAGE: &str = "Backend call skipped";

/// Wire format used when forwarding results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// `project_id` + `annotations` JSON + the original file as `images`.
    #[default]
    Multipart,
    /// A single JSON document with meta, images and annotations.
    Structured,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    url: Option<String>,
    mode: BackendMode,
    language: String,
}

impl BackendClient {
    pub fn new(url: impl Into<String>, mode: BackendMode, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: Some(url.into()),
            mode,
            language: "khm".to_string(),
        })
    }

    /// A sink that never calls out and reports every job as skipped.
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            url: None,
            mode: BackendMode::default(),
            language: "khm".to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn send(&self, url: &str, job: &OcrJob, outcome: &OcrOutcome) -> Result<reqwest::Response> {
        let request = match self.mode {
            BackendMode::Multipart => {
                let annotations = serde_json::to_string(&outcome.detections)?;
                let file = Part::bytes(job.image.to_vec()).file_name(job.filename.clone());
                let file = match file.mime_str(&job.content_type) {
                    Ok(part) => part,
                    Err(_) => Part::bytes(job.image.to_vec())
                        .file_name(job.filename.clone())
                        .mime_str("application/octet-stream")?,
                };

                let form = Form::new()
                    .text("project_id", job.project_id.clone())
                    .text("annotations", annotations)
                    .part("images", file);
                self.client.post(url).multipart(form)
            }
            BackendMode::Structured => {
                let body = StructuredResult::from_outcome(outcome, &self.language);
                self.client.post(url).json(&body)
            }
        };

        Ok(request.send().await?)
    }
}

#[async_trait]
impl ResultSink for BackendClient {
    async fn submit(&self, job: &OcrJob, outcome: &OcrOutcome) -> BackendReport {
        let Some(url) = self.url.as_deref() else {
            tracing::debug!("No backend configured, skipping forward");
            return BackendReport::skipped(SKIPPED_MESSAGE);
        };

        tracing::info!(
            "📤 Sending {} results to backend ({:?}): {}",
            outcome.detections.len(),
            self.mode,
            url
        );

        match self.send(url, job, outcome).await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("✅ Backend accepted results ({})", response.status());
                BackendReport::success(SENT_MESSAGE)
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::error!("❌ Backend error {}: {}", status, body);
                BackendReport::failed(format!("Backend error: {} {}", status, body.trim()))
            }
            Err(e) => {
                tracing::error!("❌ Failed to reach backend: {}", e);
                BackendReport::failed(format!("Backend error: {}", e))
            }
        }
    }
}
