#![cfg(unix)]

use anyhow::Result;
use httpmock::prelude::*;
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::Value;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Stand-in tesseract: drains the PNG from stdin and prints fixed Khmer text.
fn fake_tesseract(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("fake-tesseract");
    std::fs::write(&path, "#!/bin/sh\ncat > /dev/null\nprintf ' សួស្តី\\n'\n")?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

fn write_page(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    let img = RgbImage::from_fn(90, 60, |x, _| {
        if x % 12 < 6 {
            Rgb([15, 15, 15])
        } else {
            Rgb([245, 245, 245])
        }
    });
    DynamicImage::ImageRgb8(img).save_with_format(&path, image::ImageFormat::Png)?;
    Ok(path)
}

fn write_config(dir: &Path, backend_url: &str) -> Result<PathBuf> {
    let path = dir.join("batch.toml");
    let content = format!(
        "[tesseract]\ncommand = \"{}\"\n\n[output]\npath = \"{}\"\n\n[backend]\nurl = \"{}\"\n",
        fake_tesseract(dir)?.display(),
        dir.join("out").display(),
        backend_url
    );
    std::fs::write(&path, content)?;
    Ok(path)
}

fn run_batch(dir: &Path, args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_ocr-batch"))
        .args(args)
        .current_dir(dir)
        .env_remove("TESSERACT_CMD")
        .output()?)
}

fn read_json(path: PathBuf) -> Result<Value> {
    Ok(serde_json::from_slice(&std::fs::read(path)?)?)
}

#[test]
fn test_batch_writes_reports_without_forwarding() -> Result<()> {
    let dir = TempDir::new()?;
    let server = MockServer::start();
    let backend = server.mock(|when, then| {
        when.method(POST).path("/results");
        then.status(200);
    });

    let image = write_page(dir.path(), "page.png")?;
    let config = write_config(dir.path(), &server.url("/results"))?;
    let output = run_batch(
        dir.path(),
        &[image.to_str().unwrap(), "--config", config.to_str().unwrap()],
    )?;

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(backend.hits(), 0);

    let out = dir.path().join("out");
    let extraction = read_json(out.join("extraction.json"))?;
    assert_eq!(extraction["engine"], "tesseract");
    assert_eq!(extraction["detections_processed"], 1);
    assert_eq!(extraction["extracted_text"], "សួស្តី");
    assert_eq!(extraction["detections"][0]["box_coordinates"], serde_json::json!([0, 0, 90, 60]));

    let detections = read_json(out.join("detections.json"))?;
    assert_eq!(detections["detections"].as_array().unwrap().len(), 1);

    let text = std::fs::read_to_string(out.join("extraction.txt"))?;
    assert!(text.contains("Total detections: 1"));
    assert!(!out.join("annotated.png").exists());
    assert!(String::from_utf8_lossy(&output.stdout).contains("សួស្តី"));
    Ok(())
}

#[test]
fn test_batch_send_forwards_boxes_once() -> Result<()> {
    let dir = TempDir::new()?;
    let server = MockServer::start();
    let backend = server.mock(|when, then| {
        when.method(POST)
            .path("/results")
            .body_contains("name=\"project_id\"")
            .body_contains("batch-7");
        then.status(200);
    });

    let image = write_page(dir.path(), "page.png")?;
    let config = write_config(dir.path(), &server.url("/results"))?;
    let boxes = dir.path().join("boxes.json");
    std::fs::write(&boxes, r#"[[0, 0, 40, 30], {"x1": 45, "y1": 10, "x2": 90, "y2": 60}, "junk"]"#)?;

    let output = run_batch(
        dir.path(),
        &[
            image.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--boxes",
            boxes.to_str().unwrap(),
            "--send",
            "--project-id",
            "batch-7",
        ],
    )?;

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(backend.hits(), 1);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Backend response"));

    let extraction = read_json(dir.path().join("out").join("extraction.json"))?;
    assert_eq!(extraction["detections_processed"], 2);
    assert_eq!(extraction["detections"][0]["box_coordinates"], serde_json::json!([0, 0, 40, 30]));
    assert_eq!(extraction["detections"][1]["box_coordinates"], serde_json::json!([45, 10, 90, 60]));
    assert_eq!(extraction["extracted_text"], "សួស្តី\nសួស្តី");
    Ok(())
}

#[test]
fn test_batch_rejects_unsupported_image_extension() -> Result<()> {
    let dir = TempDir::new()?;
    let config = write_config(dir.path(), "http://127.0.0.1:9/results")?;
    let notes = dir.path().join("notes.pdf");
    std::fs::write(&notes, b"%PDF-1.4")?;

    let output = run_batch(
        dir.path(),
        &[notes.to_str().unwrap(), "--config", config.to_str().unwrap()],
    )?;

    assert_eq!(output.status.code(), Some(3));
    assert!(!dir.path().join("out").join("extraction.json").exists());
    Ok(())
}
