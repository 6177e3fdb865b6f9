use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image decoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Invalid image: {message}")]
    InvalidImage { message: String },

    #[error("OCR engine '{engine}' failed: {message}")]
    OcrEngineError { engine: String, message: String },

    #[error("Region detection failed: {message}")]
    DetectionError { message: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Engine,
    Network,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl OcrError {
    pub fn ocr(engine: impl Into<String>, message: impl Into<String>) -> Self {
        OcrError::OcrEngineError {
            engine: engine.into(),
            message: message.into(),
        }
    }

    pub fn invalid_image(message: impl Into<String>) -> Self {
        OcrError::InvalidImage {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        OcrError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            OcrError::ConfigValidationError { .. }
            | OcrError::InvalidConfigValueError { .. }
            | OcrError::MissingConfigError { .. } => ErrorCategory::Configuration,
            OcrError::ValidationError { .. }
            | OcrError::InvalidImage { .. }
            | OcrError::ImageError(_)
            | OcrError::SerializationError(_) => ErrorCategory::Input,
            OcrError::OcrEngineError { .. } | OcrError::DetectionError { .. } => {
                ErrorCategory::Engine
            }
            OcrError::HttpError(_) => ErrorCategory::Network,
            OcrError::IoError(_) | OcrError::ProcessingError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Engine => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 是否為呼叫端輸入造成的錯誤 (HTTP 400)
    pub fn is_client_error(&self) -> bool {
        self.category() == ErrorCategory::Input
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            OcrError::HttpError(_) => "Check that the annotation backend or OCR API is reachable",
            OcrError::IoError(_) => "Check file paths and permissions",
            OcrError::SerializationError(_) => "Check that the JSON payload is well formed",
            OcrError::ImageError(_) | OcrError::InvalidImage { .. } => {
                "Upload a valid PNG or JPEG image"
            }
            OcrError::ConfigValidationError { .. } | OcrError::InvalidConfigValueError { .. } => {
                "Review the configuration file and command line flags"
            }
            OcrError::MissingConfigError { .. } => {
                "Set the missing value in the config file or .env"
            }
            OcrError::ValidationError { .. } => "Fix the request fields and try again",
            OcrError::OcrEngineError { .. } => {
                "Check TESSERACT_CMD / TESSERACT_TESSDATA_PREFIX or the Gemini API key"
            }
            OcrError::DetectionError { .. } => "Check the detector model path and input size",
            OcrError::ProcessingError { .. } => "Retry the request; see logs for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Input problem: {}", self),
            ErrorCategory::Engine => format!("OCR problem: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::System => format!("System problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = OcrError::invalid_image("truncated");
        assert_eq!(err.category(), ErrorCategory::Input);
        assert!(err.is_client_error());

        let err = OcrError::ocr("tesseract", "not found");
        assert_eq!(err.category(), ErrorCategory::Engine);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(!err.is_client_error());

        let err = OcrError::MissingConfigError {
            field: "gemini.api_key".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_user_friendly_message_contains_detail() {
        let err = OcrError::ValidationError {
            message: "Project ID is required".to_string(),
        };
        assert!(err.user_friendly_message().contains("Project ID is required"));
    }
}
