//! Frame decoding through the ffprobe/ffmpeg command line tools.
//!
//! Frames come back as raw rgb24 over stdout, already scaled by ffmpeg, so no
//! intermediate image files are written.

use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Stdio};

use super::{Frame, FrameSampler, VideoInfo};
use crate::error::{DetectError, Result};

pub struct FfmpegSampler {
    threads: usize,
}

impl FfmpegSampler {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// Decode with the given filter graph, keeping at most `max_frames` frames.
    fn decode_raw(
        &self,
        path: &Path,
        filter: &str,
        max_frames: usize,
        size: u32,
    ) -> Result<Vec<Frame>> {
        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(["-threads", &self.threads.to_string()])
            .arg("-i")
            .arg(path)
            .args(["-map", "0:v:0", "-an", "-sn"])
            .args(["-vf", filter])
            .args(["-fps_mode", "passthrough"])
            .args(["-frames:v", &max_frames.to_string()])
            .args(["-pix_fmt", "rgb24", "-f", "rawvideo", "pipe:1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        let frames = split_raw_frames(&output.stdout, size);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if frames.is_empty() {
                return Err(DetectError::Decode(format!(
                    "ffmpeg frame extraction failed: {}",
                    stderr.trim()
                )));
            }
            log::warn!(
                "[ffmpeg] Decoder stopped early after {} frames: {}",
                frames.len(),
                stderr.trim()
            );
        }
        Ok(frames)
    }
}

impl Default for FfmpegSampler {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FrameSampler for FfmpegSampler {
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let output = Command::new("ffprobe")
            .args(["-v", "error"])
            .args(["-select_streams", "v:0"])
            .args([
                "-show_entries",
                "stream=nb_frames,avg_frame_rate,r_frame_rate:format=duration",
            ])
            .args(["-of", "json"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DetectError::OpenVideo(stderr.trim().to_string()));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| DetectError::OpenVideo(format!("unreadable ffprobe output: {}", e)))?;
        resolve_info(&probe)
    }

    fn frames_at(&self, path: &Path, indices: &[usize], size: u32) -> Result<Vec<Frame>> {
        if indices.is_empty() {
            return Ok(Vec::new());
        }
        self.decode_raw(path, &select_filter(indices, size), indices.len(), size)
    }

    fn leading_frames(&self, path: &Path, count: usize, size: u32) -> Result<Vec<Frame>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.decode_raw(path, &scale_filter(size), count, size)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    nb_frames: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Frame count from the stream header, else estimated from duration and frame rate.
fn resolve_info(probe: &ProbeOutput) -> Result<VideoInfo> {
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| DetectError::OpenVideo("no video stream".to_string()))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate));
    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let counted = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<usize>().ok())
        .filter(|n| *n > 0);
    let total_frames = match (counted, fps, duration_secs) {
        (Some(n), _, _) => n,
        (None, Some(fps), Some(duration)) => (fps * duration).round() as usize,
        _ => 0,
    };

    Ok(VideoInfo {
        total_frames,
        fps,
        duration_secs,
    })
}

/// Parse an ffprobe rational like `30000/1001`.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.trim().split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn scale_filter(size: u32) -> String {
    format!("scale={}:{}:flags=bilinear", size, size)
}

/// Keep only the frames numbered in `indices`, then scale.
fn select_filter(indices: &[usize], size: u32) -> String {
    let terms: Vec<String> = indices.iter().map(|i| format!("eq(n\\,{})", i)).collect();
    format!("select='{}',{}", terms.join("+"), scale_filter(size))
}

/// Cut an rgb24 byte stream into frames; a trailing partial frame is dropped.
fn split_raw_frames(raw: &[u8], size: u32) -> Vec<Frame> {
    let frame_len = size as usize * size as usize * 3;
    if frame_len == 0 {
        return Vec::new();
    }
    raw.chunks_exact(frame_len)
        .filter_map(|chunk| Frame::from_raw(size, size, chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_json(json: &str) -> ProbeOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_resolve_info_uses_stream_frame_count() {
        let probe = probe_json(
            r#"{"streams":[{"nb_frames":"300","avg_frame_rate":"30/1","r_frame_rate":"30/1"}],
                "format":{"duration":"10.000000"}}"#,
        );
        let info = resolve_info(&probe).unwrap();
        assert_eq!(info.total_frames, 300);
        assert_eq!(info.fps, Some(30.0));
        assert_eq!(info.duration_secs, Some(10.0));
    }

    #[test]
    fn test_resolve_info_estimates_missing_count() {
        // webm containers usually omit nb_frames
        let probe = probe_json(
            r#"{"streams":[{"avg_frame_rate":"0/0","r_frame_rate":"25/1"}],
                "format":{"duration":"4.04"}}"#,
        );
        let info = resolve_info(&probe).unwrap();
        assert_eq!(info.fps, Some(25.0));
        assert_eq!(info.total_frames, 101);
    }

    #[test]
    fn test_resolve_info_unknown_count() {
        let probe = probe_json(r#"{"streams":[{"nb_frames":"N/A"}],"format":{}}"#);
        let info = resolve_info(&probe).unwrap();
        assert_eq!(info.total_frames, 0);
        assert_eq!(info.fps, None);
    }

    #[test]
    fn test_resolve_info_requires_video_stream() {
        let probe = probe_json(r#"{"streams":[],"format":{"duration":"3.0"}}"#);
        let err = resolve_info(&probe).unwrap_err();
        assert!(matches!(err, DetectError::OpenVideo(_)));
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("24"), Some(24.0));
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn test_select_filter_escapes_commas() {
        assert_eq!(
            select_filter(&[0, 7, 12], 128),
            "select='eq(n\\,0)+eq(n\\,7)+eq(n\\,12)',scale=128:128:flags=bilinear"
        );
    }

    #[test]
    fn test_split_raw_frames_drops_partial_tail() {
        let mut raw = vec![10u8; 2 * 2 * 3 * 2];
        raw.extend_from_slice(&[1, 2, 3]);
        let frames = split_raw_frames(&raw, 2);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].get_pixel(1, 1).0, [10, 10, 10]);
    }

    /// Encodes a 10 frame test pattern, or None when ffmpeg is not installed.
    fn encode_test_clip() -> Option<(std::path::PathBuf, std::path::PathBuf)> {
        let available = Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !available {
            eprintln!("ffmpeg not on PATH, skipping");
            return None;
        }

        let dir = std::env::temp_dir().join(format!("deepfake_ffmpeg_{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        let clip = dir.join("clip.mp4");
        let status = Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i", "testsrc=size=64x64:rate=10"])
            .args(["-frames:v", "10", "-c:v", "mpeg4"])
            .arg(&clip)
            .status()
            .unwrap();
        assert!(status.success());
        Some((dir, clip))
    }

    #[test]
    fn test_decodes_encoded_clip() {
        let Some((dir, clip)) = encode_test_clip() else {
            return;
        };
        let sampler = FfmpegSampler::default();

        let info = sampler.probe(&clip).unwrap();
        assert_eq!(info.total_frames, 10);

        let frames = sampler.frames_at(&clip, &[0, 5, 9], 16).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.dimensions() == (16, 16)));

        let leading = sampler.leading_frames(&clip, 20, 16).unwrap();
        assert_eq!(leading.len(), 10);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
