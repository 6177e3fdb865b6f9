pub use crate::app::pipelines::ocr_pipeline::{prepare_page, OcrPipeline, PipelineSettings};
