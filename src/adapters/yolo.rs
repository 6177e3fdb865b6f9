//! ONNX Runtime YOLO text region detector.

use crate::core::detection::{decode_yolo_output, letterbox, DecodeParams};
use crate::core::{DetectedRegion, TextDetector};
use crate::utils::error::{OcrError, Result};
use image::RgbImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;

pub const DEFAULT_INPUT_SIZE: u32 = 640;

fn detection_error(context: &str, e: impl std::fmt::Display) -> OcrError {
    OcrError::DetectionError {
        message: format!("{}: {}", context, e),
    }
}

pub struct YoloDetector {
    session: Mutex<Session>,
    input_name: String,
    input_size: u32,
    params: DecodeParams,
    class_names: Vec<String>,
    model_path: String,
}

impl YoloDetector {
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: u32, params: DecodeParams) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(OcrError::MissingConfigError {
                field: format!("detector.model_path ({} not found)", model_path.display()),
            });
        }

        tracing::info!("Loading YOLO model from {}", model_path.display());

        let session = Session::builder()
            .map_err(|e| detection_error("Failed to create session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| detection_error("Failed to set optimization level", e))?
            .with_intra_threads(4)
            .map_err(|e| detection_error("Failed to set intra threads", e))?
            .commit_from_file(model_path)
            .map_err(|e| detection_error("Failed to load detector model", e))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        tracing::info!("✅ YOLO model loaded (input: {}, size: {})", input_name, input_size);

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            input_size,
            params,
            class_names: vec!["text".to_string()],
            model_path: model_path.display().to_string(),
        })
    }

    /// NCHW float tensor in [0, 1].
    fn to_tensor(image: &RgbImage) -> Array4<f32> {
        let (w, h) = image.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
            }
        }
        tensor
    }
}

impl TextDetector for YoloDetector {
    fn name(&self) -> &str {
        "yolo"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectedRegion>> {
        let (boxed, info) = letterbox(image, self.input_size);
        let input = Value::from_array(Self::to_tensor(&boxed))
            .map_err(|e| detection_error("Failed to create input tensor", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| detection_error("Detector session", "lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| detection_error(&format!("Inference with {} failed", self.model_path), e))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| detection_error("Failed to extract output tensor", e))?;
        let shape = output.shape().to_vec();
        let data: Vec<f32> = output.iter().copied().collect();

        decode_yolo_output(
            &data,
            &shape,
            self.params,
            info,
            image.width(),
            image.height(),
            &self.class_names,
        )
    }
}
