use crate::domain::model::{
    BackendReport, DetectedRegion, Detection, ExtractedPage, OcrJob, OcrOutcome, PreparedRegion,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use image::{DynamicImage, RgbImage};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn output_path(&self) -> &str;
    fn ocr_language(&self) -> &str;
    fn preprocess_enabled(&self) -> bool;
}

/// Text recognition backend for a single cropped region.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    async fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// Proposes text regions on a full page. Called from a blocking thread.
pub trait TextDetector: Send + Sync {
    fn name(&self) -> &str;
    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectedRegion>>;
}

/// Downstream consumer of OCR results. Failures are reported, never raised.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn submit(&self, job: &OcrJob, outcome: &OcrOutcome) -> BackendReport;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, job: &OcrJob) -> Result<ExtractedPage>;
    async fn transform(&self, regions: Vec<PreparedRegion>) -> Result<Vec<Detection>>;
    async fn load(&self, job: &OcrJob, outcome: &OcrOutcome) -> Result<BackendReport>;
}
