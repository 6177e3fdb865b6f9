use crate::config::toml_config::ServiceConfig;
use crate::utils::error::Result;
use clap::Parser;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "khmer-ocr.toml";

#[derive(Debug, Clone, Parser)]
#[command(name = "khmer-ocr")]
#[command(about = "Khmer OCR service for the annotation tool")]
pub struct CliConfig {
    /// Path to TOML configuration file (defaults to ./khmer-ocr.toml when present)
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,

    /// OCR engine: tesseract or gemini
    #[arg(long)]
    pub engine: Option<String>,

    /// Annotation backend that receives the results
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit JSON logs")]
    pub json_logs: bool,
}

impl CliConfig {
    /// Loads the TOML file (if any) and applies the command line on top.
    pub fn load(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                ServiceConfig::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => ServiceConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut ServiceConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(engine) = &self.engine {
            config.ocr.engine = engine.to_ascii_lowercase();
            tracing::info!("🔧 OCR engine overridden to: {}", config.ocr.engine);
        }
        if let Some(url) = &self.backend_url {
            config.backend.url = Some(url.clone());
            config.backend.enabled = true;
        }
        if self.monitor {
            config.monitoring.enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[server]\nport = 9000\n\n[ocr]\nengine = \"tesseract\"\n")
            .unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let cli = CliConfig::parse_from([
            "khmer-ocr",
            "--config",
            path.as_str(),
            "--port",
            "8100",
            "--engine",
            "Gemini",
            "--backend-url",
            "http://127.0.0.1:3000/upload",
            "--monitor",
        ]);
        let config = cli.load().unwrap();

        assert_eq!(config.server.port, 8100);
        assert_eq!(config.ocr.engine, "gemini");
        assert_eq!(config.backend_target(), Some("http://127.0.0.1:3000/upload"));
        assert!(config.monitoring_enabled());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let cli = CliConfig::parse_from(["khmer-ocr", "--config", "/nonexistent/khmer-ocr.toml"]);
        assert!(cli.load().is_err());
    }
}
