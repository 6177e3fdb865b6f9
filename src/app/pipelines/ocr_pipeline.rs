use crate::core::boxes::resolve_boxes;
use crate::core::crop::{crop_region, encode_png_base64};
use crate::core::preprocess::preprocess_for_ocr;
use crate::core::text::normalize_whitespace;
use crate::core::{
    BackendReport, BoxCoords, ConfigProvider, Detection, ExtractedPage, OcrEngine, OcrJob,
    OcrOutcome, Pipeline, PreparedRegion, RegionSource, ResultSink, TextDetector,
};
use crate::utils::error::{OcrError, Result};
use image::{DynamicImage, RgbImage};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub preprocess: bool,
    pub language: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            preprocess: true,
            language: "khm".to_string(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            preprocess: config.preprocess_enabled(),
            language: config.ocr_language().to_string(),
        }
    }
}

/// Crop → clean → recognise → forward, for one uploaded page at a time.
#[derive(Clone)]
pub struct OcrPipeline {
    pub(crate) engine: Arc<dyn OcrEngine>,
    pub(crate) detector: Option<Arc<dyn TextDetector>>,
    pub(crate) sink: Arc<dyn ResultSink>,
    pub(crate) settings: PipelineSettings,
}

impl OcrPipeline {
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        sink: Arc<dyn ResultSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            engine,
            detector: None,
            sink,
            settings,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn TextDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }
}

#[async_trait::async_trait]
impl Pipeline for OcrPipeline {
    async fn extract(&self, job: &OcrJob) -> Result<ExtractedPage> {
        let bytes = job.image.clone();
        let source = job.regions.clone();
        let detector = self.detector.clone();
        let preprocess = self.settings.preprocess;

        tracing::debug!(
            "Preparing '{}' ({} bytes, {})",
            job.filename,
            bytes.len(),
            job.content_type
        );

        // 影像解碼與裁切屬於 CPU 工作，移到 blocking thread
        tokio::task::spawn_blocking(move || {
            prepare_page(&bytes, &source, detector.as_deref(), preprocess)
        })
        .await
        .map_err(|e| OcrError::processing(format!("Preparation task failed: {}", e)))?
    }

    async fn transform(&self, regions: Vec<PreparedRegion>) -> Result<Vec<Detection>> {
        let total = regions.len();
        let mut detections = Vec::with_capacity(total);

        for (idx, region) in regions.into_iter().enumerate() {
            let text = match self.engine.recognize(&region.ocr_input).await {
                Ok(raw) => normalize_whitespace(&raw),
                Err(e) => {
                    tracing::warn!("✗ OCR error for box {}/{}: {}", idx + 1, total, e);
                    String::new()
                }
            };
            tracing::debug!(
                "Box {}/{} {:?}: '{}' (length: {})",
                idx + 1,
                total,
                <[u32; 4]>::from(region.coords),
                text,
                text.chars().count()
            );

            detections.push(Detection {
                box_coordinates: region.coords,
                extracted_text: text,
                cropped_image_base64: region.crop_png_base64,
            });
        }

        Ok(detections)
    }

    async fn load(&self, job: &OcrJob, outcome: &OcrOutcome) -> Result<BackendReport> {
        Ok(self.sink.submit(job, outcome).await)
    }
}

/// Decodes the page, chooses regions, and prepares every crop.
pub fn prepare_page(
    bytes: &[u8],
    source: &RegionSource,
    detector: Option<&dyn TextDetector>,
    preprocess: bool,
) -> Result<ExtractedPage> {
    let page = image::load_from_memory(bytes)
        .map_err(|e| OcrError::invalid_image(e.to_string()))?
        .to_rgb8();
    let (width, height) = page.dimensions();
    tracing::debug!("Image loaded - Size: {}x{}", width, height);

    let boxes = select_regions(&page, source, detector)?;
    tracing::debug!("Number of boxes to process: {}", boxes.len());

    let regions = boxes
        .into_iter()
        .map(|coords| prepare_region(&page, coords, preprocess))
        .collect::<Result<Vec<_>>>()?;

    Ok(ExtractedPage {
        width,
        height,
        regions,
    })
}

fn select_regions(
    page: &RgbImage,
    source: &RegionSource,
    detector: Option<&dyn TextDetector>,
) -> Result<Vec<BoxCoords>> {
    let (width, height) = page.dimensions();

    match source {
        RegionSource::User(entries) => {
            let boxes = resolve_boxes(entries, width, height);
            if boxes.len() < entries.len() {
                tracing::info!(
                    "Skipped {} of {} user boxes",
                    entries.len() - boxes.len(),
                    entries.len()
                );
            }
            Ok(boxes)
        }
        RegionSource::Auto => {
            let detected: Vec<BoxCoords> = match detector {
                Some(detector) => match detector.detect(page) {
                    Ok(regions) => {
                        tracing::info!("🔎 {} found {} text regions", detector.name(), regions.len());
                        regions.iter().map(|r| r.coords()).collect()
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ {} detection failed: {}", detector.name(), e);
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };

            if detected.is_empty() {
                tracing::info!("No regions detected, using the whole image");
                Ok(vec![BoxCoords::full(width, height)])
            } else {
                Ok(detected)
            }
        }
    }
}

fn prepare_region(page: &RgbImage, coords: BoxCoords, preprocess: bool) -> Result<PreparedRegion> {
    let crop = DynamicImage::ImageRgb8(crop_region(page, coords)?);
    let ocr_input = if preprocess {
        DynamicImage::ImageLuma8(preprocess_for_ocr(&crop))
    } else {
        DynamicImage::ImageLuma8(crop.to_luma8())
    };
    let crop_png_base64 = encode_png_base64(&ocr_input)?;

    Ok(PreparedRegion {
        coords,
        ocr_input,
        crop_png_base64,
    })
}
