//! Video classification endpoint (/upload)

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::Field},
    http::StatusCode,
    routing::post,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::AppState;
use crate::constants::UPLOAD_FIELD;
use crate::detector::Report;
use crate::services::error::{ApiError, LogErr};
use crate::services::upload::{TempUpload, video_extension};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/upload", post(upload))
}

#[derive(Serialize)]
pub struct UploadResponse {
    /// "Fake Video" or "Real Video"
    pub result: String,
    pub filename: Option<String>,
    #[serde(flatten)]
    pub report: Report,
}

/// POST /upload - Classify an uploaded video
/// Accepts multipart form data with a single "file" field holding the video.
/// The video is written to a temp dir, classified, and deleted once classification ends.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| {
            ApiError::new(e.status(), format!("Invalid multipart body: {}", e.body_text()))
        })?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let ext = video_extension(content_type.as_deref(), filename.as_deref()).ok_or_else(|| {
            log::warn!(
                "[upload] Rejecting unsupported upload type={:?} name={:?}",
                content_type,
                filename
            );
            ApiError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Please upload a valid video file",
            )
        })?;

        let temp = TempUpload::create(ext)
            .await
            .log_500("Failed to create temp dir")?;
        let report = classify_field(&state, field, temp).await?;
        return Ok(Json(UploadResponse {
            result: report.verdict.label.to_string(),
            filename,
            report,
        }));
    }

    Err(ApiError::new(
        StatusCode::BAD_REQUEST,
        format!("Missing '{}' field", UPLOAD_FIELD),
    ))
}

async fn classify_field(
    state: &AppState,
    mut field: Field<'_>,
    temp: TempUpload,
) -> Result<Report, ApiError> {
    let mut file = tokio::fs::File::create(temp.path())
        .await
        .log_500("Failed to create upload file")?;

    let mut written = 0usize;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| {
            ApiError::new(e.status(), format!("Failed to read upload: {}", e.body_text()))
        })?
    {
        written += chunk.len();
        file.write_all(&chunk)
            .await
            .log_500("Failed to write upload")?;
    }
    file.flush().await.log_500("Failed to write upload")?;
    drop(file);

    if written == 0 {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Uploaded file is empty"));
    }
    log::info!("[upload] Received {} bytes at {:?}", written, temp.path());

    // The temp dir lives until the blocking task ends, even if the client is gone.
    let detector = state.detector.clone();
    let report = tokio::task::spawn_blocking(move || {
        let report = detector.classify_path(temp.path());
        drop(temp);
        report
    })
        .await
        .log_500("Classification task failed")?
        .map_err(|e| {
            log::error!("[upload] Classification failed: {}", e);
            ApiError::from(e)
        })?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::detector::Detector;
    use crate::error::Result as DetectResult;
    use crate::model::FixedModel;
    use crate::routes::build_app;
    use crate::video::tests::SyntheticSampler;
    use crate::video::{Frame, FrameSampler, VideoInfo};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "XBOUNDARYX";

    /// Wraps the synthetic sampler and remembers which file it was asked to read
    struct RecordingSampler {
        inner: SyntheticSampler,
        delay: Duration,
        seen: Mutex<Option<(PathBuf, Vec<u8>)>>,
    }

    impl RecordingSampler {
        fn new(inner: SyntheticSampler, delay: Duration) -> Self {
            Self {
                inner,
                delay,
                seen: Mutex::new(None),
            }
        }

        fn seen_path(&self) -> PathBuf {
            self.seen.lock().unwrap().clone().unwrap().0
        }
    }

    impl FrameSampler for RecordingSampler {
        fn probe(&self, path: &Path) -> DetectResult<VideoInfo> {
            let bytes = std::fs::read(path)?;
            *self.seen.lock().unwrap() = Some((path.to_path_buf(), bytes));
            std::thread::sleep(self.delay);
            self.inner.probe(path)
        }

        fn frames_at(
            &self,
            path: &Path,
            indices: &[usize],
            size: u32,
        ) -> DetectResult<Vec<Frame>> {
            self.inner.frames_at(path, indices, size)
        }

        fn leading_frames(
            &self,
            path: &Path,
            count: usize,
            size: u32,
        ) -> DetectResult<Vec<Frame>> {
            self.inner.leading_frames(path, count, size)
        }
    }

    fn app_with(
        sampler: Arc<dyn FrameSampler>,
        probability: f32,
        max_upload_bytes: usize,
    ) -> Router {
        let settings = Settings {
            max_frames: 4,
            img_size: 8,
            max_upload_bytes,
            ..Settings::default()
        };
        let detector = Detector::new(sampler, Arc::new(FixedModel::new(probability)), &settings);
        build_app(Arc::new(AppState {
            detector,
            max_upload_bytes,
        }))
    }

    fn multipart_request(
        name: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upload_classifies_and_cleans_up() {
        let sampler = Arc::new(RecordingSampler::new(
            SyntheticSampler::with_frames(50),
            Duration::ZERO,
        ));
        let app = app_with(sampler.clone(), 0.92, 1024 * 1024);

        let response = app
            .oneshot(multipart_request("file", "clip.mp4", "video/mp4", b"fake mp4 bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["result"], "Fake Video");
        assert_eq!(json["label"], "fake");
        assert_eq!(json["filename"], "clip.mp4");
        assert_eq!(json["frames"]["sampled"], 4);
        assert!((json["confidence"].as_f64().unwrap() - 0.92).abs() < 1e-6);

        let (path, bytes) = sampler.seen.lock().unwrap().clone().unwrap();
        assert_eq!(bytes, b"fake mp4 bytes");
        assert_eq!(path.extension().unwrap(), "mp4");
        assert!(!path.exists());
        assert!(!path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_abandoned_upload_still_removes_temp_dir() {
        let sampler = Arc::new(RecordingSampler::new(
            SyntheticSampler::with_frames(50),
            Duration::from_millis(300),
        ));
        let app = app_with(sampler.clone(), 0.92, 1024 * 1024);

        // Client gives up while the blocking classification is still running
        let request = app.oneshot(multipart_request("file", "clip.mp4", "video/mp4", b"bytes"));
        let outcome = tokio::time::timeout(Duration::from_millis(100), request).await;
        assert!(outcome.is_err());

        let dir = sampler.seen_path().parent().unwrap().to_path_buf();
        assert!(dir.exists());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_upload_real_video() {
        let app = app_with(Arc::new(SyntheticSampler::with_frames(10)), 0.05, 1024 * 1024);
        let response = app
            .oneshot(multipart_request("file", "clip.webm", "video/webm", b"webm"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["result"], "Real Video");
        assert_eq!(json["confidence_level"], "very_high");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_video() {
        let app = app_with(Arc::new(SyntheticSampler::with_frames(10)), 0.5, 1024 * 1024);
        let response = app
            .oneshot(multipart_request("file", "notes.txt", "text/plain", b"hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let json = json_body(response).await;
        assert!(json["err"].is_string());
    }

    #[tokio::test]
    async fn test_upload_requires_file_field() {
        let app = app_with(Arc::new(SyntheticSampler::with_frames(10)), 0.5, 1024 * 1024);
        let response = app
            .oneshot(multipart_request("video", "clip.mp4", "video/mp4", b"data"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["err"], "Missing 'file' field");
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file() {
        let app = app_with(Arc::new(SyntheticSampler::with_frames(10)), 0.5, 1024 * 1024);
        let response = app
            .oneshot(multipart_request("file", "clip.mp4", "video/mp4", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_unreadable_video_is_422() {
        let mut sampler = SyntheticSampler::with_frames(10);
        sampler.info = None;
        let app = app_with(Arc::new(sampler), 0.5, 1024 * 1024);
        let response = app
            .oneshot(multipart_request("file", "clip.mp4", "video/mp4", b"garbage"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert!(json["err"].as_str().unwrap().starts_with("Cannot open video file"));
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_413() {
        let app = app_with(Arc::new(SyntheticSampler::with_frames(10)), 0.5, 64);
        let response = app
            .oneshot(multipart_request("file", "clip.mp4", "video/mp4", &[7u8; 4096]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health_and_test_endpoints() {
        let app = app_with(Arc::new(SyntheticSampler::with_frames(10)), 0.5, 1024);

        let response = app
            .clone()
            .oneshot(Request::get("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "working");

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
