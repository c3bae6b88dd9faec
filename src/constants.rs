//! Application constants

/// Frames fed to the model per clip
pub const DEFAULT_MAX_FRAMES: usize = 20;

/// Square edge length every frame is resized to
pub const DEFAULT_IMG_SIZE: u32 = 128;

/// Probability above which a clip is labelled fake (strictly greater)
pub const DEFAULT_FAKE_THRESHOLD: f32 = 0.5;

/// Maximum upload size for videos (40 MB, same as the web uploader)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 40 * 1024 * 1024;

pub const DEFAULT_MODEL_PATH: &str = "best_model.onnx";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_FFMPEG_THREADS: usize = 1;

/// Multipart field carrying the video
pub const UPLOAD_FIELD: &str = "file";
