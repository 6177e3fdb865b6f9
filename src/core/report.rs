//! Report documents written by the batch tool.

use crate::domain::model::{DetectedRegion, Detection};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub image_path: String,
    pub model_path: Option<String>,
    pub confidence_threshold: f32,
    pub detections: Vec<DetectedRegion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub source_image: String,
    pub engine: String,
    pub model_used: Option<String>,
    pub prompt: Option<String>,
    pub extracted_text: String,
    pub detections_processed: usize,
    pub detections: Vec<Detection>,
}

impl ExtractionReport {
    /// Joins the per-region texts, one line each, skipping empty ones.
    pub fn joined_text(detections: &[Detection]) -> String {
        detections
            .iter()
            .map(|d| d.extracted_text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(50);
        let _ = writeln!(out, "KHMER TEXT EXTRACTION RESULTS");
        let _ = writeln!(out, "{}\n", rule);
        let _ = writeln!(out, "Image: {}", self.source_image);
        let _ = writeln!(out, "Engine: {}", self.engine);
        if let Some(model) = &self.model_used {
            let _ = writeln!(out, "Model: {}", model);
        }
        let _ = writeln!(out, "Total detections: {}\n", self.detections_processed);

        let _ = writeln!(out, "COORDINATE REFERENCE:");
        for (idx, d) in self.detections.iter().enumerate() {
            let b = d.box_coordinates;
            let _ = writeln!(
                out,
                "- Detection {}: ({}, {}) to ({}, {})",
                idx, b.x1, b.y1, b.x2, b.y2
            );
        }

        let _ = writeln!(out, "\nEXTRACTED TEXT:");
        let _ = writeln!(out, "{}", "-".repeat(30));
        for (idx, d) in self.detections.iter().enumerate() {
            let _ = writeln!(out, "Detection {}: {}", idx, d.extracted_text);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::BoxCoords;

    fn detection(text: &str, x: u32) -> Detection {
        Detection {
            box_coordinates: BoxCoords::new(x, 0, x + 10, 10),
            extracted_text: text.to_string(),
            cropped_image_base64: String::new(),
        }
    }

    #[test]
    fn test_render_text_lists_every_detection() {
        let detections = vec![detection("ក", 0), detection("", 20)];
        let report = ExtractionReport {
            source_image: "scan.png".to_string(),
            engine: "tesseract".to_string(),
            model_used: None,
            prompt: None,
            extracted_text: ExtractionReport::joined_text(&detections),
            detections_processed: 2,
            detections,
        };

        let text = report.render_text();
        assert!(text.contains("Image: scan.png"));
        assert!(text.contains("- Detection 1: (20, 0) to (30, 10)"));
        assert!(text.contains("Detection 0: ក"));
        assert_eq!(report.extracted_text, "ក");
    }
}
