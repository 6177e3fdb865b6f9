pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::ServiceConfig;

pub use crate::adapters::{BackendClient, BackendMode, GeminiEngine, LocalStorage, TesseractEngine};
pub use crate::core::{engine::ExtractionEngine, pipeline::OcrPipeline};
pub use crate::utils::error::{OcrError, Result};
