//! Post-processing for YOLO-style text region detectors.
//!
//! The detector consumes a square letterboxed image and emits a
//! `[1, 4 + classes, anchors]` tensor of `cx, cy, w, h` followed by per-class
//! scores. Decoding maps those back to page pixels, filters by confidence,
//! and suppresses overlaps.

use crate::domain::model::{BoundingBox, BoxCoords, DetectedRegion};
use crate::utils::error::{OcrError, Result};
use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use std::cmp::Ordering;

pub const LETTERBOX_FILL: u8 = 114;

/// How a page was scaled and padded into the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    pub confidence: f32,
    pub iou: f32,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou: 0.45,
        }
    }
}

/// Resizes keeping the aspect ratio and pads to `size` x `size`.
pub fn letterbox(image: &RgbImage, size: u32) -> (RgbImage, LetterboxInfo) {
    let (w, h) = image.dimensions();
    let scale = (size as f32 / w.max(1) as f32).min(size as f32 / h.max(1) as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);

    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
    imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    (
        canvas,
        LetterboxInfo {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Decodes raw model output into page-space regions in reading order.
pub fn decode_yolo_output(
    data: &[f32],
    shape: &[usize],
    params: DecodeParams,
    info: LetterboxInfo,
    page_width: u32,
    page_height: u32,
    class_names: &[String],
) -> Result<Vec<DetectedRegion>> {
    let (features, anchors) = match shape {
        [1, features, anchors] if *features > 4 => (*features, *anchors),
        _ => {
            return Err(OcrError::DetectionError {
                message: format!("Unexpected detector output shape {:?}", shape),
            })
        }
    };
    if data.len() < features * anchors {
        return Err(OcrError::DetectionError {
            message: format!(
                "Detector output has {} values, expected {}",
                data.len(),
                features * anchors
            ),
        });
    }

    let at = |feature: usize, anchor: usize| data[feature * anchors + anchor];
    let mut candidates = Vec::new();

    for i in 0..anchors {
        let (class_id, score) = (4..features)
            .map(|f| (f - 4, at(f, i)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if score < params.confidence {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let to_page_x = |v: f32| ((v - info.pad_x) / info.scale).clamp(0.0, page_width as f32) as u32;
        let to_page_y = |v: f32| ((v - info.pad_y) / info.scale).clamp(0.0, page_height as f32) as u32;

        let coords = BoxCoords::new(
            to_page_x(cx - w / 2.0),
            to_page_y(cy - h / 2.0),
            to_page_x(cx + w / 2.0),
            to_page_y(cy + h / 2.0),
        );
        if coords.is_empty() {
            continue;
        }

        candidates.push((coords, score, class_id));
    }

    let mut kept = non_max_suppression(candidates, params.iou);
    kept.sort_by(|a, b| (a.0.y1, a.0.x1).cmp(&(b.0.y1, b.0.x1)));

    Ok(kept
        .into_iter()
        .enumerate()
        .map(|(detection_id, (coords, confidence, class_id))| DetectedRegion {
            detection_id,
            bounding_box: BoundingBox::from(coords),
            confidence,
            class_id,
            class_name: class_names.get(class_id).cloned(),
        })
        .collect())
}

/// Greedy class-agnostic NMS, highest confidence first.
pub fn non_max_suppression(
    mut candidates: Vec<(BoxCoords, f32, usize)>,
    iou_threshold: f32,
) -> Vec<(BoxCoords, f32, usize)> {
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut kept: Vec<(BoxCoords, f32, usize)> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept
            .iter()
            .all(|(other, _, _)| candidate.0.iou(other) <= iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}
