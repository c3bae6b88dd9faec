use anyhow::Context;
use std::sync::Arc;

use deepfake_api::config::Settings;
use deepfake_api::detector::Detector;
use deepfake_api::model::OnnxModel;
use deepfake_api::routes::build_app;
use deepfake_api::video::FfmpegSampler;
use deepfake_api::{AppState, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let settings = Settings::from_env();

    let model = OnnxModel::load(&settings.model_path, settings.max_frames, settings.img_size)
        .with_context(|| format!("Failed to load model from {:?}", settings.model_path))?;
    let sampler = FfmpegSampler::new(settings.ffmpeg_threads);
    let detector = Detector::new(Arc::new(sampler), Arc::new(model), &settings);

    let state = Arc::new(AppState {
        detector,
        max_upload_bytes: settings.max_upload_bytes,
    });
    let app = build_app(state);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    log::info!(
        "[api] Listening on http://{} ({} frames @ {}px, threshold {})",
        addr,
        settings.max_frames,
        settings.img_size,
        settings.fake_threshold
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    log::info!("[api] Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[api] Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
