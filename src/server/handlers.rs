use super::errors::{ApiError, IMAGE_REQUIRED, PROJECT_ID_REQUIRED};
use super::AppState;
use crate::core::boxes::parse_annotations;
use crate::core::{OcrJob, ProcessResponse, RegionSource};
use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use serde_json::{json, Value};

struct UploadedImage {
    filename: String,
    content_type: String,
    data: Bytes,
}

#[derive(Default)]
struct UploadForm {
    project_id: Option<String>,
    annotations: Option<String>,
    image: Option<UploadedImage>,
}

impl UploadForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "project_id" => form.project_id = Some(field.text().await?),
                "annotations" => form.annotations = Some(field.text().await?),
                "image" => {
                    let filename = field.file_name().unwrap_or("upload.png").to_string();
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field.bytes().await?;
                    form.image = Some(UploadedImage {
                        filename,
                        content_type,
                        data,
                    });
                }
                other => tracing::debug!("Ignoring form field '{}'", other),
            }
        }

        Ok(form)
    }

    fn into_job(self) -> Result<OcrJob, ApiError> {
        let project_id = self
            .project_id
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::bad_request(PROJECT_ID_REQUIRED))?;

        let image = self
            .image
            .filter(|img| !img.data.is_empty())
            .ok_or_else(|| ApiError::bad_request(IMAGE_REQUIRED))?;

        let regions = region_source(self.annotations.as_deref())?;

        Ok(OcrJob {
            project_id,
            filename: image.filename,
            content_type: image.content_type,
            image: image.data,
            regions,
        })
    }
}

/// Missing, blank, `null` or `[]` annotations mean "detect for me".
fn region_source(raw: Option<&str>) -> Result<RegionSource, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty() && *r != "null") else {
        return Ok(RegionSource::Auto);
    };

    let entries: Vec<Value> = parse_annotations(raw)?;
    if entries.is_empty() {
        Ok(RegionSource::Auto)
    } else {
        Ok(RegionSource::User(entries))
    }
}

/// POST /images/
pub async fn process_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let job = UploadForm::read(&mut multipart).await?.into_job()?;

    tracing::info!(
        "Received file: {}, Content-Type: {}, project: {}",
        job.filename,
        job.content_type,
        job.project_id
    );
    match &job.regions {
        RegionSource::User(entries) => tracing::info!("Processing {} user boxes", entries.len()),
        RegionSource::Auto => tracing::info!("No annotations provided, detecting regions"),
    }

    let response = state.engine.process(&job).await?;
    Ok(Json(response))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let pipeline = state.engine.pipeline();
    Json(json!({
        "status": "ok",
        "engine": pipeline.engine_name(),
        "detector": pipeline.has_detector(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_source_defaults_to_auto() {
        assert_eq!(region_source(None).unwrap(), RegionSource::Auto);
        assert_eq!(region_source(Some("  ")).unwrap(), RegionSource::Auto);
        assert_eq!(region_source(Some("null")).unwrap(), RegionSource::Auto);
        assert_eq!(region_source(Some("[]")).unwrap(), RegionSource::Auto);
    }

    #[test]
    fn test_region_source_user_boxes() {
        let source = region_source(Some("[[0, 0, 10, 10]]")).unwrap();
        assert_eq!(source, RegionSource::User(vec![json!([0, 0, 10, 10])]));
    }

    #[test]
    fn test_region_source_rejects_bad_json() {
        let err = region_source(Some("{not json")).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert!(err.detail.starts_with("Invalid annotations JSON"));

        let err = region_source(Some("{\"x\": 1}")).unwrap_err();
        assert!(err.detail.starts_with("Invalid annotations JSON"));
    }
}
