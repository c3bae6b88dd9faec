//! Per-request scratch space for uploaded videos.
//!
//! Each upload lands in its own temp directory so ffmpeg can read it from
//! disk; the directory is removed when the `TempUpload` is dropped, which
//! also covers requests abandoned mid-classification.

use std::path::{Path, PathBuf};

pub struct TempUpload {
    dir: PathBuf,
    path: PathBuf,
}

impl TempUpload {
    pub async fn create(ext: &str) -> std::io::Result<Self> {
        let dir = std::env::temp_dir()
            .join(format!("deepfake_upload_{}", rand::random::<u64>()));
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("input.{}", ext));
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            log::warn!("[upload] Failed to cleanup temp dir {:?}: {}", self.dir, e);
        }
    }
}

/// File extension for an uploaded video, or None when the upload is not a video.
///
/// Trusts a `video/*` content type; falls back to the file name when the
/// client sent no type or a generic one.
pub fn video_extension(
    content_type: Option<&str>,
    file_name: Option<&str>,
) -> Option<&'static str> {
    let from_name = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .and_then(known_extension);

    match content_type {
        Some(ct) if ct.starts_with("video/") => Some(match ct {
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            "video/x-matroska" => "mkv",
            "video/x-msvideo" => "avi",
            "video/mpeg" => "mpg",
            _ => from_name.unwrap_or("video"),
        }),
        None | Some("application/octet-stream") => from_name,
        Some(_) => None,
    }
}

fn known_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => Some("mp4"),
        "webm" => Some("webm"),
        "mov" => Some("mov"),
        "mkv" => Some("mkv"),
        "avi" => Some("avi"),
        "mpg" | "mpeg" => Some("mpg"),
        _ => None,
    }
}
