use clap::Parser;
use khmer_ocr::utils::error::ErrorSeverity;
use khmer_ocr::utils::{logger, validation::Validate};
use khmer_ocr::{server, CliConfig, OcrError};

fn exit_with(e: &OcrError, context: &str) -> ! {
    tracing::error!(
        "❌ {}: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 不存在時忽略
    let _ = dotenvy::dotenv();

    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting khmer-ocr service");

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => exit_with(&e, "Failed to load configuration"),
    };
    if cli.verbose {
        tracing::debug!("Service config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        exit_with(&e, "Configuration validation failed");
    }

    if config.monitoring_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    if let Err(e) = server::serve(config).await {
        exit_with(&e, "Service stopped with an error");
    }

    Ok(())
}
