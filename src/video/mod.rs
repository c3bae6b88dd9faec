//! Video to clip preprocessing.
//!
//! Samples a fixed number of frames uniformly across a video, resizes them to
//! a square RGB frame and packs them into the tensor layout the model expects.
//! Decoding itself sits behind [`FrameSampler`] so the policy here can run
//! without ffmpeg.

use image::imageops::FilterType;
use serde::Serialize;
use std::path::Path;

use crate::error::{DetectError, Result};

mod ffmpeg;

pub use ffmpeg::FfmpegSampler;

/// Decoded RGB frame
pub type Frame = image::RgbImage;

/// Container metadata gathered before decoding
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoInfo {
    /// 0 when the container does not report a usable frame count
    pub total_frames: usize,
    pub fps: Option<f64>,
    pub duration_secs: Option<f64>,
}

/// Pluggable frame decoder
pub trait FrameSampler: Send + Sync {
    /// Read container metadata. Fails when the file is not a readable video.
    fn probe(&self, path: &Path) -> Result<VideoInfo>;

    /// Decode the frames at `indices` (sorted, no duplicates), scaled to `size`x`size`.
    /// May return fewer frames than requested when the stream ends early; the
    /// returned frames always match a prefix of `indices`.
    fn frames_at(&self, path: &Path, indices: &[usize], size: u32) -> Result<Vec<Frame>>;

    /// Decode up to `count` frames from the start of the stream, scaled to `size`x`size`.
    fn leading_frames(&self, path: &Path, count: usize, size: u32) -> Result<Vec<Frame>>;
}

/// How a clip was assembled
#[derive(Debug, Clone, Serialize)]
pub struct SampleStats {
    pub total_frames: usize,
    pub fps: Option<f64>,
    pub duration_secs: Option<f64>,
    /// Frames in the clip handed to the model
    pub sampled: usize,
    /// Frames that came straight from the decoder
    pub decoded: usize,
    /// Frames filled in by repeating the previous one
    pub padded: usize,
    /// True when the frame count was unknown and frames were read from the start
    pub sequential: bool,
}

/// Fixed-length run of equally sized frames
#[derive(Debug, Clone)]
pub struct Clip {
    pub frames: Vec<Frame>,
    pub size: u32,
    pub stats: SampleStats,
}

/// Model input in `[batch, frames, height, width, channels]` order, values in `[0, 1]`
#[derive(Debug, Clone)]
pub struct ClipTensor {
    pub shape: [usize; 5],
    pub data: Vec<f32>,
}

impl Clip {
    pub fn to_tensor(&self) -> ClipTensor {
        let size = self.size as usize;
        let mut data = Vec::with_capacity(self.frames.len() * size * size * 3);
        for frame in &self.frames {
            data.extend(frame.as_raw().iter().map(|&v| v as f32 / 255.0));
        }
        ClipTensor {
            shape: [1, self.frames.len(), size, size, 3],
            data,
        }
    }
}

/// `count` indices spread evenly over `[0, total - 1]`, truncated toward zero.
/// Repeats indices when the video is shorter than `count`.
pub fn uniform_indices(total: usize, count: usize) -> Vec<usize> {
    if total == 0 || count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![0];
    }

    let last = total - 1;
    let step = last as f64 / (count - 1) as f64;
    (0..count)
        .map(|i| {
            if i == count - 1 {
                last
            } else {
                (i as f64 * step) as usize
            }
        })
        .collect()
}

/// Sample `max_frames` frames from the video at `path`.
///
/// Uniform sampling when the frame count is known, otherwise the first
/// `max_frames` frames. Short results are padded with the last frame.
pub fn sample_clip(
    sampler: &dyn FrameSampler,
    path: &Path,
    max_frames: usize,
    size: u32,
) -> Result<Clip> {
    let info = sampler.probe(path)?;
    log::info!(
        "[video] Video info - total frames: {}, fps: {:.2}, duration: {:.2}s",
        info.total_frames,
        info.fps.unwrap_or(0.0),
        info.duration_secs.unwrap_or(0.0)
    );

    let (frames, decoded, repeated, sequential) = if info.total_frames > 0 {
        let requested = uniform_indices(info.total_frames, max_frames);
        let mut unique = requested.clone();
        unique.dedup();

        log::debug!("[video] Sampling {} frames at {:?}", max_frames, requested);
        let decoded = sampler.frames_at(path, &unique, size)?;
        if decoded.is_empty() {
            return Err(DetectError::NoFrames);
        }

        let mut frames: Vec<Frame> = Vec::with_capacity(requested.len());
        let mut repeated = 0usize;
        let mut last = &decoded[0];
        for idx in &requested {
            match unique.binary_search(idx).ok().and_then(|p| decoded.get(p)) {
                Some(frame) => last = frame,
                None => repeated += 1,
            }
            frames.push(last.clone());
        }
        (frames, decoded.len(), repeated, false)
    } else {
        log::warn!("[video] Cannot get frame count, reading sequentially");
        let frames = sampler.leading_frames(path, max_frames, size)?;
        if frames.is_empty() {
            return Err(DetectError::NoFrames);
        }
        log::info!("[video] Read {} frames sequentially", frames.len());
        let decoded = frames.len();
        (frames, decoded, 0, true)
    };

    let (frames, padded) = fit_to_length(frames, max_frames, size);
    if padded > 0 {
        log::warn!(
            "[video] Video has only {} frames, padded to {}",
            max_frames - padded,
            max_frames
        );
    }

    Ok(Clip {
        size,
        stats: SampleStats {
            total_frames: info.total_frames,
            fps: info.fps,
            duration_secs: info.duration_secs,
            sampled: frames.len(),
            decoded,
            padded: padded + repeated,
            sequential,
        },
        frames,
    })
}

/// Resize stray frames, truncate to `len`, pad with the last frame.
/// Returns the frames and how many were padded.
fn fit_to_length(frames: Vec<Frame>, len: usize, size: u32) -> (Vec<Frame>, usize) {
    let mut out: Vec<Frame> = frames
        .into_iter()
        .take(len)
        .map(|f| {
            if f.dimensions() == (size, size) {
                f
            } else {
                image::imageops::resize(&f, size, size, FilterType::Triangle)
            }
        })
        .collect();

    let mut padded = 0;
    if let Some(last) = out.last().cloned() {
        while out.len() < len {
            out.push(last.clone());
            padded += 1;
        }
    }
    (out, padded)
}
