use crate::domain::model::DetectedRegion;
use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static DETECTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*]\s*)?(?:\*\*)?Detection\s+(\d+)(?:\*\*)?\s*:(?:\*\*)?\s*(.*)$").unwrap()
});

/// Collapses every whitespace run into one space and trims the ends.
pub fn normalize_whitespace(raw: &str) -> String {
    WHITESPACE.replace_all(raw, " ").trim().to_string()
}

/// Prompt for whole-page extraction of several detected regions at once.
pub fn build_region_prompt(regions: &[DetectedRegion]) -> String {
    let mut coordinates_info = String::new();
    for region in regions {
        let b = &region.bounding_box;
        coordinates_info.push_str(&format!(
            "- Detection {}: ({}, {}) to ({}, {})\n",
            region.detection_id, b.x1, b.y1, b.x2, b.y2
        ));
    }

    format!(
        "Extract Khmer text only inside these bounding boxes:\n\n{}\nReturn results as:\nDetection 0: [text]\nDetection 1: [text]\n...",
        coordinates_info
    )
}

/// Splits a `Detection N: text` reply into exactly `count` texts.
///
/// Missing ids stay empty, out-of-range ids are dropped, and continuation
/// lines are appended to the preceding detection.
pub fn parse_detection_lines(reply: &str, count: usize) -> Vec<String> {
    let mut texts = vec![String::new(); count];
    let mut current: Option<usize> = None;

    for line in reply.lines() {
        if let Some(caps) = DETECTION_LINE.captures(line) {
            current = caps[1].parse::<usize>().ok().filter(|id| *id < count);
            if let Some(id) = current {
                texts[id] = strip_brackets(&caps[2]).to_string();
            }
        } else if let Some(id) = current {
            if !line.trim().is_empty() {
                texts[id].push(' ');
                texts[id].push_str(line);
            }
        }
    }

    texts.iter().map(|t| normalize_whitespace(t)).collect()
}

fn strip_brackets(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(trimmed)
}
