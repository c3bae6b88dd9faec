//! Video in, verdict out.
//!
//! Glues the frame sampler and the model together and produces the report
//! returned by both the HTTP endpoint and the CLI.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::error::Result;
use crate::model::{DeepfakeModel, Verdict, interpret};
use crate::video::{FrameSampler, SampleStats, sample_clip};

/// Full result for one video
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    #[serde(flatten)]
    pub verdict: Verdict,
    pub frames: SampleStats,
    pub elapsed_ms: u64,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Detector {
    sampler: Arc<dyn FrameSampler>,
    model: Arc<dyn DeepfakeModel>,
    max_frames: usize,
    img_size: u32,
    threshold: f32,
}

impl Detector {
    pub fn new(
        sampler: Arc<dyn FrameSampler>,
        model: Arc<dyn DeepfakeModel>,
        settings: &Settings,
    ) -> Self {
        Self {
            sampler,
            model,
            max_frames: settings.max_frames,
            img_size: settings.img_size,
            threshold: settings.fake_threshold,
        }
    }

    /// Run the whole pipeline on a video file. Blocks on decoding and inference.
    pub fn classify_path(&self, path: &Path) -> Result<Report> {
        let started = Instant::now();

        let clip = sample_clip(self.sampler.as_ref(), path, self.max_frames, self.img_size)?;
        let tensor = clip.to_tensor();
        log::info!(
            "[detector] Preprocessed clip shape {:?} ({} decoded, {} padded)",
            tensor.shape,
            clip.stats.decoded,
            clip.stats.padded
        );

        let probability = self.model.predict(&tensor)?;
        log::info!("[detector] Raw prediction probability: {:.6}", probability);

        let verdict = interpret(probability, self.threshold)?;
        log::info!(
            "[detector] PREDICTION: {} - confidence {:.2}% ({})",
            verdict.label,
            verdict.confidence * 100.0,
            verdict.confidence_level.describe(verdict.label)
        );

        Ok(Report {
            verdict,
            frames: clip.stats,
            elapsed_ms: started.elapsed().as_millis() as u64,
            analyzed_at: Utc::now(),
        })
    }
}
