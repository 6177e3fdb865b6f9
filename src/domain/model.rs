use bytes::Bytes;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Axis-aligned pixel box, serialised as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct BoxCoords {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoxCoords {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box covering a whole `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub fn iou(&self, other: &BoxCoords) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        if ix2 <= ix1 || iy2 <= iy1 {
            return 0.0;
        }

        let inter = (ix2 - ix1) as f32 * (iy2 - iy1) as f32;
        let union = self.area() as f32 + other.area() as f32 - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }
}

impl From<[u32; 4]> for BoxCoords {
    fn from(v: [u32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoxCoords> for [u32; 4] {
    fn from(b: BoxCoords) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// OCR result for one region, in the shape the annotation frontend consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub box_coordinates: BoxCoords,
    pub extracted_text: String,
    pub cropped_image_base64: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub width: u32,
    pub height: u32,
}

impl From<BoxCoords> for BoundingBox {
    fn from(b: BoxCoords) -> Self {
        Self {
            x1: b.x1,
            y1: b.y1,
            x2: b.x2,
            y2: b.y2,
            width: b.width(),
            height: b.height(),
        }
    }
}

/// Text region proposed by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedRegion {
    pub detection_id: usize,
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
    pub class_name: Option<String>,
}

impl DetectedRegion {
    pub fn coords(&self) -> BoxCoords {
        BoxCoords::new(
            self.bounding_box.x1,
            self.bounding_box.y1,
            self.bounding_box.x2,
            self.bounding_box.y2,
        )
    }
}

/// Where the regions of a job come from.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionSource {
    /// Raw user-drawn boxes, validated per entry during extraction.
    User(Vec<serde_json::Value>),
    /// Run the detector, falling back to the whole image.
    Auto,
}

#[derive(Debug, Clone)]
pub struct OcrJob {
    pub project_id: String,
    pub filename: String,
    pub content_type: String,
    pub image: Bytes,
    pub regions: RegionSource,
}

/// Region cropped and cleaned, ready for the OCR engine.
#[derive(Debug, Clone)]
pub struct PreparedRegion {
    pub coords: BoxCoords,
    pub ocr_input: DynamicImage,
    pub crop_png_base64: String,
}

/// Decoded page dimensions plus its prepared regions, in reading order.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub width: u32,
    pub height: u32,
    pub regions: Vec<PreparedRegion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOutcome {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
}

impl OcrOutcome {
    pub fn boxes_with_text(&self) -> usize {
        self.detections
            .iter()
            .filter(|d| !d.extracted_text.is_empty())
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendReport {
    pub status: BackendStatus,
    pub message: String,
}

impl BackendReport {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: BackendStatus::Success,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: BackendStatus::Failed,
            message: message.into(),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: BackendStatus::Skipped,
            message: message.into(),
        }
    }
}

/// Body returned by `POST /images/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub processing_result: Vec<Detection>,
    pub filename: String,
    pub backend_status: BackendStatus,
    pub message: String,
}

impl ProcessResponse {
    pub fn new(outcome: OcrOutcome, report: BackendReport) -> Self {
        Self {
            processing_result: outcome.detections,
            filename: outcome.filename,
            backend_status: report.status,
            message: report.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMeta {
    pub tool: String,
    pub lang: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultImage {
    pub id: String,
    pub name: String,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub status: String,
    pub annotations: Vec<Detection>,
}

/// Export-style document posted to the backend in structured mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResult {
    pub meta: ResultMeta,
    pub images: Vec<ResultImage>,
    pub annotations: HashMap<String, Vec<Detection>>,
}

pub const TOOL_NAME: &str = "Khmer Data Annotation Tool";

impl StructuredResult {
    pub fn from_outcome(outcome: &OcrOutcome, lang: &str) -> Self {
        let image_id = format!("{}-1", outcome.filename);
        let timestamp = chrono::Utc::now()
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);

        let mut annotations = HashMap::new();
        annotations.insert(image_id.clone(), outcome.detections.clone());

        Self {
            meta: ResultMeta {
                tool: TOOL_NAME.to_string(),
                lang: lang.to_string(),
                timestamp,
            },
            images: vec![ResultImage {
                id: image_id,
                name: outcome.filename.clone(),
                path: format!("/uploads/{}", outcome.filename),
                width: outcome.width,
                height: outcome.height,
                status: "pending".to_string(),
                annotations: outcome.detections.clone(),
            }],
            annotations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_coords_serialises_as_array() {
        let b = BoxCoords::new(10, 20, 110, 60);
        let json = serde_json::to_value(b).unwrap();
        assert_eq!(json, serde_json::json!([10, 20, 110, 60]));

        let back: BoxCoords = serde_json::from_value(json).unwrap();
        assert_eq!(back, b);
        assert_eq!(back.width(), 100);
        assert_eq!(back.height(), 40);
    }

    #[test]
    fn test_iou() {
        let a = BoxCoords::new(0, 0, 10, 10);
        let b = BoxCoords::new(5, 0, 15, 10);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&BoxCoords::new(20, 20, 30, 30)), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_backend_status_wire_names() {
        let report = BackendReport::skipped("Backend call skipped");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "skipped");
    }

    #[test]
    fn test_structured_result_shape() {
        let outcome = OcrOutcome {
            filename: "page.png".to_string(),
            width: 800,
            height: 600,
            detections: vec![Detection {
                box_coordinates: BoxCoords::new(1, 2, 3, 4),
                extracted_text: "សួស្តី".to_string(),
                cropped_image_base64: String::new(),
            }],
        };

        let result = StructuredResult::from_outcome(&outcome, "khm");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["meta"]["tool"], TOOL_NAME);
        assert_eq!(json["meta"]["lang"], "khm");
        assert!(json["meta"]["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(json["images"][0]["id"], "page.png-1");
        assert_eq!(json["images"][0]["path"], "/uploads/page.png");
        assert_eq!(json["images"][0]["status"], "pending");
        assert_eq!(json["images"][0]["width"], 800);
        assert_eq!(
            json["annotations"]["page.png-1"][0]["extracted_text"],
            "សួស្តី"
        );
    }
}
