use crate::core::{BackendReport, OcrJob, OcrOutcome, Pipeline, ProcessResponse};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct ExtractionEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ExtractionEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Runs extract → transform → load for one job.
    pub async fn run(&self, job: &OcrJob) -> Result<(OcrOutcome, BackendReport)> {
        tracing::info!(
            "🚀 New OCR job: project={}, file={}",
            job.project_id,
            job.filename
        );

        // Extract
        let page = self.pipeline.extract(job).await?;
        let region_count = page.regions.len();
        tracing::info!(
            "Prepared {} regions from {}x{} image",
            region_count,
            page.width,
            page.height
        );
        self.monitor.log_stats("Extract");

        // Transform
        let detections = self.pipeline.transform(page.regions).await?;
        let outcome = OcrOutcome {
            filename: job.filename.clone(),
            width: page.width,
            height: page.height,
            detections,
        };
        let with_text = outcome.boxes_with_text();
        tracing::info!(
            "OCR complete - processed: {}/{}, with text: {}, empty: {}",
            outcome.detections.len(),
            region_count,
            with_text,
            outcome.detections.len() - with_text
        );
        self.monitor.log_stats("Transform");

        // Load
        let report = self.pipeline.load(job, &outcome).await?;
        tracing::info!(
            "📤 Backend response: {:?} - {}",
            report.status,
            report.message
        );
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok((outcome, report))
    }

    /// Same as [`run`](Self::run), shaped as the HTTP response body.
    pub async fn process(&self, job: &OcrJob) -> Result<ProcessResponse> {
        let (outcome, report) = self.run(job).await?;
        Ok(ProcessResponse::new(outcome, report))
    }
}
