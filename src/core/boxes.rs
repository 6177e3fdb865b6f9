//! User-drawn box parsing.
//!
//! Boxes arrive as a JSON array from the annotation frontend. Each entry is
//! validated on its own: a malformed entry is skipped, it never rejects the
//! whole request.

use crate::domain::model::BoxCoords;
use crate::utils::error::{OcrError, Result};
use serde_json::Value;

/// Parses the `annotations` form field. Only a top-level JSON array is accepted.
pub fn parse_annotations(raw: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(raw).map_err(|e| OcrError::ValidationError {
        message: format!("Invalid annotations JSON: {}", e),
    })?;

    match value {
        Value::Array(items) => Ok(items),
        other => Err(OcrError::ValidationError {
            message: format!(
                "Invalid annotations JSON: expected a list of boxes, got {}",
                json_kind(&other)
            ),
        }),
    }
}

/// Resolves one raw entry into a clamped, non-empty box inside the image.
///
/// Accepted shapes:
/// - `[x1, y1, x2, y2]` with numbers or numeric strings
/// - `{"rect": {"x", "y", "w", "h"}}` as stored by the annotation backend
/// - `{"x1", "y1", "x2", "y2"}`
pub fn resolve_box(entry: &Value, width: u32, height: u32) -> Option<BoxCoords> {
    let (x1, y1, x2, y2) = raw_corners(entry)?;

    let x1 = clamp(x1, width);
    let y1 = clamp(y1, height);
    let x2 = clamp(x2, width);
    let y2 = clamp(y2, height);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(BoxCoords::new(x1, y1, x2, y2))
}

/// Resolves every entry in order, dropping the invalid ones.
pub fn resolve_boxes(entries: &[Value], width: u32, height: u32) -> Vec<BoxCoords> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            let resolved = resolve_box(entry, width, height);
            if resolved.is_none() {
                tracing::debug!("✗ Box {} skipped - invalid format or dimensions: {}", idx + 1, entry);
            }
            resolved
        })
        .collect()
}

fn raw_corners(entry: &Value) -> Option<(i64, i64, i64, i64)> {
    match entry {
        Value::Array(items) if items.len() == 4 => Some((
            coordinate(&items[0])?,
            coordinate(&items[1])?,
            coordinate(&items[2])?,
            coordinate(&items[3])?,
        )),
        Value::Object(obj) => {
            if let Some(rect) = obj.get("rect").and_then(Value::as_object) {
                let x = coordinate(rect.get("x")?)?;
                let y = coordinate(rect.get("y")?)?;
                let w = coordinate(rect.get("w")?)?;
                let h = coordinate(rect.get("h")?)?;
                Some((x, y, x.checked_add(w)?, y.checked_add(h)?))
            } else {
                Some((
                    coordinate(obj.get("x1")?)?,
                    coordinate(obj.get("y1")?)?,
                    coordinate(obj.get("x2")?)?,
                    coordinate(obj.get("y2")?)?,
                ))
            }
        }
        _ => None,
    }
}

/// Integer conversion of one coordinate; floats truncate toward zero.
fn coordinate(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn clamp(v: i64, max: u32) -> u32 {
    v.clamp(0, max as i64) as u32
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
