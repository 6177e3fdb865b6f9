pub mod boxes;
pub mod crop;
pub mod detection;
pub mod engine;
pub mod pipeline;
pub mod preprocess;
pub mod report;
pub mod text;

pub use crate::domain::model::{
    BackendReport, BackendStatus, BoxCoords, DetectedRegion, Detection, ExtractedPage, OcrJob,
    OcrOutcome, PreparedRegion, ProcessResponse, RegionSource,
};
pub use crate::domain::ports::{
    ConfigProvider, OcrEngine, Pipeline, ResultSink, Storage, TextDetector,
};
pub use crate::utils::error::Result;
