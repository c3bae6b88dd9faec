pub mod config;
pub mod constants;
pub mod detector;
pub mod error;
pub mod logging;
pub mod model;
pub mod routes;
pub mod services;
pub mod video;

use detector::Detector;

#[derive(Clone)]
pub struct AppState {
    pub detector: Detector,
    pub max_upload_bytes: usize,
}
