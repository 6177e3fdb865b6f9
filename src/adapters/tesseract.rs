//! Tesseract CLI engine.
//!
//! The crop is piped to `tesseract stdin stdout` as PNG, so no temp files are
//! involved.

use crate::core::crop::encode_png;
use crate::core::OcrEngine;
use crate::utils::error::{OcrError, Result};
use async_trait::async_trait;
use image::DynamicImage;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const ENGINE_NAME: &str = "tesseract";

#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: String,
    tessdata_prefix: Option<String>,
    language: String,
    psm: u8,
    oem: u8,
}

impl TesseractEngine {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            tessdata_prefix: None,
            language: language.into(),
            psm: 6,
            oem: 3,
        }
    }

    pub fn with_tessdata_prefix(mut self, prefix: Option<String>) -> Self {
        self.tessdata_prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    pub fn with_modes(mut self, psm: u8, oem: u8) -> Self {
        self.psm = psm;
        self.oem = oem;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
            "--psm".to_string(),
            self.psm.to_string(),
            "--oem".to_string(),
            self.oem.to_string(),
        ]
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let png = encode_png(image)?;

        let mut cmd = Command::new(&self.command);
        cmd.args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(prefix) = &self.tessdata_prefix {
            cmd.env("TESSDATA_PREFIX", prefix);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::ocr(
                    ENGINE_NAME,
                    format!("Tesseract not found at '{}'", self.command),
                )
            } else {
                OcrError::ocr(ENGINE_NAME, format!("cannot run tesseract: {}", e))
            }
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::ocr(ENGINE_NAME, "stdin not captured"))?;
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(&png).await;
            drop(stdin);
            written
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OcrError::ocr(ENGINE_NAME, format!("tesseract did not finish: {}", e)))?;

        // tesseract 提前結束時寫入端可能遇到 broken pipe，以結束狀態為準
        match writer.await {
            Ok(Err(e)) => tracing::debug!("tesseract stdin write ended early: {}", e),
            Err(e) => tracing::debug!("tesseract stdin writer aborted: {}", e),
            Ok(Ok(())) => {}
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ocr(
                ENGINE_NAME,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
