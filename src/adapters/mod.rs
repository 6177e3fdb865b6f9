pub mod backend;
pub mod gemini;
pub mod storage;
pub mod tesseract;

#[cfg(feature = "yolo")]
pub mod yolo;

pub use backend::{BackendClient, BackendMode};
pub use gemini::GeminiEngine;
pub use storage::LocalStorage;
pub use tesseract::TesseractEngine;

#[cfg(feature = "yolo")]
pub use yolo::YoloDetector;
