//! Runtime settings read from the environment.
//!
//! Every value has a default so the service starts with nothing but a model
//! file next to it. Unparseable or out-of-range values fall back to the default.

use std::env;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_FAKE_THRESHOLD, DEFAULT_FFMPEG_THREADS, DEFAULT_HOST, DEFAULT_IMG_SIZE,
    DEFAULT_MAX_FRAMES, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_MODEL_PATH, DEFAULT_PORT,
};

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub max_frames: usize,
    pub img_size: u32,
    pub fake_threshold: f32,
    pub max_upload_bytes: usize,
    pub ffmpeg_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            max_frames: DEFAULT_MAX_FRAMES,
            img_size: DEFAULT_IMG_SIZE,
            fake_threshold: DEFAULT_FAKE_THRESHOLD,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ffmpeg_threads: DEFAULT_FFMPEG_THREADS,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            host: lookup("HOST")
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(defaults.host),
            port: positive(&lookup, "PORT").unwrap_or(defaults.port),
            model_path: lookup("MODEL_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            max_frames: positive(&lookup, "MAX_FRAMES").unwrap_or(defaults.max_frames),
            img_size: positive(&lookup, "IMG_SIZE").unwrap_or(defaults.img_size),
            fake_threshold: lookup("FAKE_THRESHOLD")
                .and_then(|s| s.trim().parse::<f32>().ok())
                .filter(|t| *t > 0.0 && *t < 1.0)
                .unwrap_or(defaults.fake_threshold),
            max_upload_bytes: positive(&lookup, "MAX_UPLOAD_BYTES")
                .unwrap_or(defaults.max_upload_bytes),
            ffmpeg_threads: positive(&lookup, "FFMPEG_THREADS").unwrap_or(defaults.ffmpeg_threads),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn positive<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    lookup(key)
        .and_then(|s| s.trim().parse::<T>().ok())
        .filter(|v| *v > T::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let s = settings_from(&[]);
        assert_eq!(s.port, 8000);
        assert_eq!(s.max_frames, 20);
        assert_eq!(s.img_size, 128);
        assert_eq!(s.fake_threshold, 0.5);
        assert_eq!(s.max_upload_bytes, 40 * 1024 * 1024);
        assert_eq!(s.model_path, PathBuf::from("best_model.onnx"));
        assert_eq!(s.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_overrides_are_parsed() {
        let s = settings_from(&[
            ("PORT", "9001"),
            ("MAX_FRAMES", "16"),
            ("IMG_SIZE", "224"),
            ("FAKE_THRESHOLD", "0.7"),
            ("MODEL_PATH", "/models/df.onnx"),
        ]);
        assert_eq!(s.port, 9001);
        assert_eq!(s.max_frames, 16);
        assert_eq!(s.img_size, 224);
        assert_eq!(s.fake_threshold, 0.7);
        assert_eq!(s.model_path, PathBuf::from("/models/df.onnx"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let s = settings_from(&[
            ("PORT", "not-a-port"),
            ("MAX_FRAMES", "0"),
            ("FAKE_THRESHOLD", "1.5"),
            ("FFMPEG_THREADS", "-2"),
        ]);
        assert_eq!(s.port, 8000);
        assert_eq!(s.max_frames, 20);
        assert_eq!(s.fake_threshold, 0.5);
        assert_eq!(s.ffmpeg_threads, 1);
    }
}
