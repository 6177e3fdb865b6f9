//! Builds the pipeline's collaborators from `ServiceConfig`.

use crate::adapters::{BackendClient, GeminiEngine, TesseractEngine};
use crate::config::ServiceConfig;
use crate::core::pipeline::{OcrPipeline, PipelineSettings};
use crate::core::{OcrEngine, ResultSink, TextDetector};
use crate::utils::error::{OcrError, Result};
use crate::utils::validation::validate_required_field;
use std::sync::Arc;

pub fn build_engine(config: &ServiceConfig) -> Result<Arc<dyn OcrEngine>> {
    match config.ocr.engine.as_str() {
        "tesseract" => {
            let engine = TesseractEngine::new(config.tesseract_command(), config.ocr.language.clone())
                .with_modes(config.ocr.psm, config.ocr.oem)
                .with_tessdata_prefix(config.tessdata_prefix());
            tracing::info!("OCR engine: tesseract ({})", engine.command());
            Ok(Arc::new(engine))
        }
        "gemini" => Ok(Arc::new(build_gemini(config)?)),
        other => Err(OcrError::InvalidConfigValueError {
            field: "ocr.engine".to_string(),
            value: other.to_string(),
            reason: "Valid values: tesseract, gemini".to_string(),
        }),
    }
}

pub fn build_gemini(config: &ServiceConfig) -> Result<GeminiEngine> {
    let api_key = config.gemini_api_key();
    let api_key = validate_required_field("gemini.api_key (or GEMINI_API_KEY)", &api_key)?;

    let mut engine = GeminiEngine::new(api_key.clone(), config.gemini.model.clone())?
        .with_endpoint(config.gemini.endpoint.clone());
    if let Some(prompt) = config.gemini.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        engine = engine.with_prompt(prompt);
    }
    tracing::info!("OCR engine: gemini ({})", engine.model());
    Ok(engine)
}

#[cfg(feature = "yolo")]
pub fn build_detector(config: &ServiceConfig) -> Result<Option<Arc<dyn TextDetector>>> {
    use crate::adapters::YoloDetector;
    use crate::core::detection::DecodeParams;

    if !config.detector.enabled {
        return Ok(None);
    }
    let model_path = config
        .detector_model_path()
        .ok_or_else(|| OcrError::MissingConfigError {
            field: "detector.model_path".to_string(),
        })?;

    let params = DecodeParams {
        confidence: config.detector.confidence,
        iou: config.detector.iou,
    };
    let detector = YoloDetector::load(model_path, config.detector.input_size, params)?;
    Ok(Some(Arc::new(detector)))
}

#[cfg(not(feature = "yolo"))]
pub fn build_detector(config: &ServiceConfig) -> Result<Option<Arc<dyn TextDetector>>> {
    if config.detector.enabled {
        tracing::warn!("⚠️ detector.enabled is set but this build has no `yolo` feature; using whole-image fallback");
    }
    Ok(None)
}

pub fn build_sink(config: &ServiceConfig) -> Result<BackendClient> {
    match config.backend_target() {
        Some(url) => {
            tracing::info!("Backend: {} ({:?})", url, config.backend.mode);
            Ok(
                BackendClient::new(url, config.backend.mode, config.backend.timeout_seconds)?
                    .with_language(config.ocr.language.clone()),
            )
        }
        None => {
            tracing::info!("Backend: disabled");
            Ok(BackendClient::disabled())
        }
    }
}

pub fn build_pipeline(config: &ServiceConfig) -> Result<OcrPipeline> {
    build_pipeline_with_sink(config, Arc::new(build_sink(config)?))
}

/// Same as [`build_pipeline`] but results go to the given sink instead of `[backend]`.
pub fn build_pipeline_with_sink(
    config: &ServiceConfig,
    sink: Arc<dyn ResultSink>,
) -> Result<OcrPipeline> {
    let engine = build_engine(config)?;
    let mut pipeline = OcrPipeline::new(engine, sink, PipelineSettings::from_config(config));

    if let Some(detector) = build_detector(config)? {
        pipeline = pipeline.with_detector(detector);
    }
    Ok(pipeline)
}
