use bytes::Bytes;
use clap::Parser;
use image::DynamicImage;
use khmer_ocr::app::factory::{build_detector, build_gemini, build_pipeline_with_sink, build_sink};
use khmer_ocr::config::cli::DEFAULT_CONFIG_FILE;
use khmer_ocr::config::ServiceConfig;
use khmer_ocr::core::boxes::{parse_annotations, resolve_boxes};
use khmer_ocr::core::crop::{draw_regions, encode_png};
use khmer_ocr::core::pipeline::prepare_page;
use khmer_ocr::core::report::{DetectionReport, ExtractionReport};
use khmer_ocr::core::{
    BackendReport, BackendStatus, BoxCoords, ConfigProvider, DetectedRegion, Detection, OcrJob,
    OcrOutcome, RegionSource, ResultSink, Storage,
};
use khmer_ocr::domain::model::BoundingBox;
use khmer_ocr::utils::error::{ErrorSeverity, OcrError, Result};
use khmer_ocr::utils::logger;
use khmer_ocr::utils::validation::{validate_file_extensions, Validate};
use khmer_ocr::{BackendClient, ExtractionEngine, LocalStorage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

#[derive(Parser, Debug)]
#[command(name = "ocr-batch")]
#[command(about = "Run Khmer OCR on a local image and write reports")]
struct Args {
    /// Image to process
    image: PathBuf,

    /// JSON file with user boxes (same format as the `annotations` form field)
    #[arg(short, long, conflicts_with = "detect")]
    boxes: Option<PathBuf>,

    /// Detect text regions with the configured YOLO model
    #[arg(long)]
    detect: bool,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Output directory (defaults to output.path from config)
    #[arg(short, long)]
    output: Option<String>,

    /// Override the OCR engine from config
    #[arg(long)]
    engine: Option<String>,

    /// Send every region to Gemini in one whole-page request
    #[arg(long)]
    page_mode: bool,

    /// Forward the results to the configured backend
    #[arg(long)]
    send: bool,

    #[arg(long, default_value = "local")]
    project_id: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    monitor: bool,
}

fn load_config(args: &Args) -> Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            ServiceConfig::from_file(DEFAULT_CONFIG_FILE)?
        }
        None => ServiceConfig::default(),
    };

    // 應用命令列覆蓋設定
    if let Some(engine) = &args.engine {
        config.ocr.engine = engine.to_ascii_lowercase();
    }
    if args.page_mode {
        config.ocr.engine = "gemini".to_string();
    }
    if args.detect {
        config.detector.enabled = true;
    }
    if let Some(output) = &args.output {
        config.output.path = output.clone();
    }
    if args.monitor {
        config.monitoring.enabled = true;
    }
    Ok(config)
}

fn region_from(detection_id: usize, coords: BoxCoords, confidence: f32) -> DetectedRegion {
    DetectedRegion {
        detection_id,
        bounding_box: BoundingBox::from(coords),
        confidence,
        class_id: 0,
        class_name: None,
    }
}

/// Picks the regions up front so the reports can show detector confidences.
async fn select_regions(
    args: &Args,
    config: &ServiceConfig,
    page: &DynamicImage,
) -> Result<(Vec<DetectedRegion>, bool)> {
    let (width, height) = (page.width(), page.height());

    if let Some(path) = &args.boxes {
        let raw = tokio::fs::read_to_string(path).await?;
        let entries = parse_annotations(&raw)?;
        let regions = resolve_boxes(&entries, width, height)
            .into_iter()
            .enumerate()
            .map(|(i, b)| region_from(i, b, 1.0))
            .collect();
        return Ok((regions, false));
    }

    if args.detect {
        let detector = build_detector(config)?.ok_or_else(|| OcrError::MissingConfigError {
            field: "detector (build with --features yolo and set detector.model_path)".to_string(),
        })?;
        let rgb = page.to_rgb8();
        let regions = tokio::task::spawn_blocking(move || detector.detect(&rgb))
            .await
            .map_err(|e| OcrError::processing(format!("Detection task failed: {}", e)))??;
        tracing::info!("🔎 Detected {} text regions", regions.len());
        if !regions.is_empty() {
            return Ok((regions, true));
        }
    }

    Ok((vec![region_from(0, BoxCoords::full(width, height), 1.0)], false))
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    config.validate()?;

    let image_path = args.image.display().to_string();
    validate_file_extensions("image", std::slice::from_ref(&image_path), IMAGE_EXTENSIONS)?;
    let filename = args
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.png".to_string());
    let bytes = Bytes::from(tokio::fs::read(&args.image).await?);
    let page = image::load_from_memory(&bytes).map_err(|e| OcrError::invalid_image(e.to_string()))?;
    tracing::info!("📷 Loaded {} ({}x{})", image_path, page.width(), page.height());

    let (regions, detected) = select_regions(&args, &config, &page).await?;
    let boxes: Vec<serde_json::Value> = regions
        .iter()
        .map(|r| serde_json::json!(<[u32; 4]>::from(r.coords())))
        .collect();
    let job = OcrJob {
        project_id: args.project_id.clone(),
        filename,
        content_type: content_type_for(&args.image).to_string(),
        image: bytes,
        regions: RegionSource::User(boxes),
    };

    let storage = LocalStorage::new(config.output_path());
    // 只有 --send 才轉送到 backend
    let sink = Arc::new(if args.send {
        build_sink(&config)?
    } else {
        BackendClient::disabled()
    });

    let (outcome, report, model_used, prompt) = if args.page_mode {
        let gemini = build_gemini(&config)?;
        let prepared = prepare_page(&job.image, &job.regions, None, config.ocr.preprocess)?;
        let texts = gemini.extract_page(&page, &regions).await?;
        let detections = prepared
            .regions
            .into_iter()
            .zip(texts)
            .map(|(region, text)| Detection {
                box_coordinates: region.coords,
                extracted_text: text,
                cropped_image_base64: region.crop_png_base64,
            })
            .collect();
        let outcome = OcrOutcome {
            filename: job.filename.clone(),
            width: prepared.width,
            height: prepared.height,
            detections,
        };
        let report = sink.submit(&job, &outcome).await;
        let prompt = khmer_ocr::core::text::build_region_prompt(&regions);
        (outcome, report, Some(gemini.model().to_string()), Some(prompt))
    } else {
        let pipeline = build_pipeline_with_sink(&config, sink.clone())?;
        let (model_used, prompt) = if config.ocr.engine == "gemini" {
            let gemini = build_gemini(&config)?;
            (Some(gemini.model().to_string()), Some(gemini.prompt().to_string()))
        } else {
            (None, None)
        };
        let engine = ExtractionEngine::new_with_monitoring(pipeline, config.monitoring_enabled());
        let (outcome, report) = engine.run(&job).await?;
        (outcome, report, model_used, prompt)
    };

    // 寫出報告
    let detection_report = DetectionReport {
        image_path: image_path.clone(),
        model_path: config.detector_model_path().filter(|_| detected).map(str::to_string),
        confidence_threshold: config.detector.confidence,
        detections: regions.clone(),
    };
    storage
        .write_file("detections.json", &serde_json::to_vec_pretty(&detection_report)?)
        .await?;

    let extraction_report = ExtractionReport {
        source_image: image_path,
        engine: config.ocr.engine.clone(),
        model_used,
        prompt,
        extracted_text: ExtractionReport::joined_text(&outcome.detections),
        detections_processed: outcome.detections.len(),
        detections: outcome.detections.clone(),
    };
    storage
        .write_file("extraction.json", &serde_json::to_vec_pretty(&extraction_report)?)
        .await?;
    storage
        .write_file("extraction.txt", extraction_report.render_text().as_bytes())
        .await?;

    if detected {
        let mut canvas = page.to_rgb8();
        draw_regions(&mut canvas, &regions);
        storage
            .write_file("annotated.png", &encode_png(&DynamicImage::ImageRgb8(canvas))?)
            .await?;
    }

    println!("\nExtracted Khmer Text:");
    println!("{}", "=".repeat(50));
    println!("{}", extraction_report.extracted_text);
    println!("{}", "=".repeat(50));
    println!("📁 Reports saved to: {}", storage.base_path().display());

    if args.send {
        print_backend_report(&report);
    }

    Ok(())
}

fn print_backend_report(report: &BackendReport) {
    match report.status {
        BackendStatus::Success => println!("✅ Backend response: {}", report.message),
        _ => println!("⚠️ Backend response: {}", report.message),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);
    tracing::info!("🚀 Starting ocr-batch");

    if let Err(e) = run(args).await {
        tracing::error!(
            "❌ Batch run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}
