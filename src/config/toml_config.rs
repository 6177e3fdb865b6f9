use crate::adapters::backend::BackendMode;
use crate::adapters::gemini::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::core::ConfigProvider;
use crate::utils::error::{OcrError, Result};
use crate::utils::validation::{
    validate_choice, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

pub const ENGINES: [&str; 2] = ["tesseract", "gemini"];

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub tesseract: TesseractConfig,
    pub gemini: GeminiConfig,
    pub detector: DetectorConfig,
    pub backend: BackendConfig,
    pub output: OutputConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:5173".to_string()],
            max_upload_mb: 20,
        }
    }
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub engine: String,
    pub language: String,
    pub psm: u8,
    pub oem: u8,
    pub preprocess: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: "tesseract".to_string(),
            language: "khm".to_string(),
            psm: 6,
            oem: 3,
            preprocess: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub command: Option<String>,
    pub tessdata_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub prompt: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub enabled: bool,
    pub model_path: Option<String>,
    pub input_size: u32,
    pub confidence: f32,
    pub iou: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model_path: None,
            input_size: 640,
            confidence: 0.25,
            iou: 0.45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub mode: BackendMode,
    pub timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            mode: BackendMode::Multipart,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

/// 未替換的 `${VAR}` 或空字串視為未設定
fn configured(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.starts_with("${"))
}

fn from_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ServiceConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(OcrError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| OcrError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GEMINI_API_KEY})，未定義者保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("server.host", &self.server.host)?;
        validate_range("server.port", self.server.port, 1, u16::MAX)?;
        validate_positive_number("server.max_upload_mb", self.server.max_upload_mb, 1)?;
        for origin in &self.server.cors_origins {
            if origin != "*" {
                validate_url("server.cors_origins", origin)?;
            }
        }

        validate_choice("ocr.engine", &self.ocr.engine, &ENGINES)?;
        validate_non_empty_string("ocr.language", &self.ocr.language)?;
        validate_range("ocr.psm", self.ocr.psm, 0, 13)?;
        validate_range("ocr.oem", self.ocr.oem, 0, 3)?;

        if self.ocr.engine == "gemini" && self.gemini_api_key().is_none() {
            return Err(OcrError::MissingConfigError {
                field: "gemini.api_key (or GEMINI_API_KEY)".to_string(),
            });
        }

        if self.detector.enabled {
            let model_path = configured(&self.detector.model_path).ok_or_else(|| {
                OcrError::MissingConfigError {
                    field: "detector.model_path".to_string(),
                }
            })?;
            validate_path("detector.model_path", model_path)?;
            validate_range("detector.input_size", self.detector.input_size, 32, 4096)?;
        }
        validate_range("detector.confidence", self.detector.confidence, 0.0, 1.0)?;
        validate_range("detector.iou", self.detector.iou, 0.0, 1.0)?;

        if let Some(url) = self.backend_target() {
            validate_url("backend.url", url)?;
        }
        validate_positive_number(
            "backend.timeout_seconds",
            self.backend.timeout_seconds as usize,
            1,
        )?;

        validate_path("output.path", &self.output.path)?;

        Ok(())
    }

    /// 後端網址；未設定或停用時為 None
    pub fn backend_target(&self) -> Option<&str> {
        if !self.backend.enabled {
            return None;
        }
        configured(&self.backend.url)
    }

    /// 設定檔優先，其次是 TESSERACT_CMD，最後是 PATH 上的 tesseract
    pub fn tesseract_command(&self) -> String {
        configured(&self.tesseract.command)
            .map(str::to_string)
            .or_else(|| from_env("TESSERACT_CMD"))
            .unwrap_or_else(|| "tesseract".to_string())
    }

    pub fn tessdata_prefix(&self) -> Option<String> {
        configured(&self.tesseract.tessdata_prefix)
            .map(str::to_string)
            .or_else(|| from_env("TESSERACT_TESSDATA_PREFIX"))
    }

    pub fn gemini_api_key(&self) -> Option<String> {
        configured(&self.gemini.api_key)
            .map(str::to_string)
            .or_else(|| from_env("GEMINI_API_KEY"))
    }

    pub fn detector_model_path(&self) -> Option<&str> {
        configured(&self.detector.model_path)
    }

    /// 取得監控設定
    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ConfigProvider for ServiceConfig {
    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn ocr_language(&self) -> &str {
        &self.ocr.language
    }

    fn preprocess_enabled(&self) -> bool {
        self.ocr.preprocess
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ServiceConfig::from_toml_str("").unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.ocr.engine, "tesseract");
        assert_eq!(config.ocr_language(), "khm");
        assert_eq!((config.ocr.psm, config.ocr.oem), (6, 3));
        assert!(config.preprocess_enabled());
        assert_eq!(config.backend.mode, BackendMode::Multipart);
        assert!(config.backend_target().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
port = 9000
cors_origins = ["http://localhost:5173", "https://annotate.example.com"]
max_upload_mb = 5

[ocr]
engine = "tesseract"
psm = 7
preprocess = false

[tesseract]
command = "/usr/local/bin/tesseract"

[backend]
url = "http://127.0.0.1:3000/api/ocr/results"
mode = "structured"
timeout_seconds = 10

[monitoring]
enabled = true
"#;

        let config = ServiceConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.max_upload_bytes(), 5 * 1024 * 1024);
        assert_eq!(config.ocr.psm, 7);
        assert!(!config.preprocess_enabled());
        assert_eq!(config.tesseract_command(), "/usr/local/bin/tesseract");
        assert_eq!(config.backend.mode, BackendMode::Structured);
        assert_eq!(
            config.backend_target(),
            Some("http://127.0.0.1:3000/api/ocr/results")
        );
        assert!(config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("KHMER_OCR_TEST_BACKEND", "https://backend.test/upload");

        let config = ServiceConfig::from_toml_str(
            r#"
[backend]
url = "${KHMER_OCR_TEST_BACKEND}"
"#,
        )
        .unwrap();
        assert_eq!(config.backend_target(), Some("https://backend.test/upload"));

        std::env::remove_var("KHMER_OCR_TEST_BACKEND");
    }

    #[test]
    fn test_unresolved_placeholder_counts_as_unset() {
        let config = ServiceConfig::from_toml_str(
            r#"
[backend]
url = "${KHMER_OCR_TEST_DEFINITELY_UNSET}"
"#,
        )
        .unwrap();
        assert!(config.backend_target().is_none());
    }

    #[test]
    fn test_disabled_backend_has_no_target() {
        let config = ServiceConfig::from_toml_str(
            r#"
[backend]
enabled = false
url = "http://127.0.0.1:3000"
"#,
        )
        .unwrap();
        assert!(config.backend_target().is_none());
    }

    #[test]
    fn test_config_validation() {
        let bad_engine = ServiceConfig::from_toml_str("[ocr]\nengine = \"easyocr\"").unwrap();
        assert!(bad_engine.validate().is_err());

        let bad_psm = ServiceConfig::from_toml_str("[ocr]\npsm = 14").unwrap();
        assert!(bad_psm.validate().is_err());

        let bad_url = ServiceConfig::from_toml_str("[backend]\nurl = \"not-a-url\"").unwrap();
        assert!(bad_url.validate().is_err());

        let no_model = ServiceConfig::from_toml_str("[detector]\nenabled = true").unwrap();
        let err = no_model.validate().unwrap_err();
        assert!(matches!(err, OcrError::MissingConfigError { .. }));
    }

    #[test]
    fn test_gemini_requires_key() {
        let config = ServiceConfig::from_toml_str(
            r#"
[ocr]
engine = "gemini"

[gemini]
api_key = "abc123"
"#,
        )
        .unwrap();
        assert_eq!(config.gemini_api_key().as_deref(), Some("abc123"));
        assert!(config.validate().is_ok());
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ServiceConfig::from_toml_str("[server\nport = ").unwrap_err();
        assert!(matches!(err, OcrError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[ocr]\nlanguage = \"khm+eng\"\n")
            .unwrap();

        let config = ServiceConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.ocr_language(), "khm+eng");
    }
}
