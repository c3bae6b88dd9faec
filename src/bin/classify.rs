//! Classify a single local video without starting the server.
//!
//! Uses the same sampler, model and thresholds as the HTTP service; every
//! flag can also come from the service's environment variables.

use anyhow::{Context, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use deepfake_api::config::Settings;
use deepfake_api::detector::{Detector, Report};
use deepfake_api::logging;
use deepfake_api::model::OnnxModel;
use deepfake_api::video::FfmpegSampler;

#[derive(Debug, Parser)]
#[command(name = "classify", about = "Check whether a video is a deepfake")]
struct Args {
    /// Video file to classify
    video: PathBuf,

    /// ONNX model file
    #[arg(long, env = "MODEL_PATH")]
    model: Option<PathBuf>,

    /// Fake probability must be strictly above this to label the video fake
    #[arg(long, env = "FAKE_THRESHOLD")]
    threshold: Option<f32>,

    #[arg(long, env = "MAX_FRAMES")]
    max_frames: Option<usize>,

    #[arg(long, env = "IMG_SIZE")]
    img_size: Option<u32>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let args = Args::parse();

    let mut settings = Settings::from_env();
    if let Some(model) = args.model {
        settings.model_path = model;
    }
    if let Some(threshold) = args.threshold {
        if !(threshold > 0.0 && threshold < 1.0) {
            bail!("--threshold must be between 0 and 1, got {}", threshold);
        }
        settings.fake_threshold = threshold;
    }
    if let Some(n) = args.max_frames.filter(|n| *n > 0) {
        settings.max_frames = n;
    }
    if let Some(n) = args.img_size.filter(|n| *n > 0) {
        settings.img_size = n;
    }

    if !args.video.exists() {
        bail!("Video file not found at {:?}", args.video);
    }

    let model = OnnxModel::load(&settings.model_path, settings.max_frames, settings.img_size)
        .with_context(|| format!("Failed to load model from {:?}", settings.model_path))?;
    let detector = Detector::new(
        Arc::new(FfmpegSampler::new(settings.ffmpeg_threads)),
        Arc::new(model),
        &settings,
    );

    let report = detector
        .classify_path(&args.video)
        .with_context(|| format!("Failed to classify {:?}", args.video))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&args.video, &report);
    }
    Ok(())
}

fn print_report(video: &Path, report: &Report) {
    let verdict = &report.verdict;
    let rule = "=".repeat(70);

    println!("{}", rule);
    println!("RESULTS - {}", video.display());
    println!("{}", rule);
    println!("Threshold: {}", verdict.threshold);
    println!("Probability of FAKE: {:.2}%", verdict.fake_probability * 100.0);
    println!("Probability of REAL: {:.2}%", verdict.real_probability * 100.0);
    println!("{}", "-".repeat(70));
    println!("PREDICTION: {}", verdict.label);
    println!("  Confidence: {:.2}%", verdict.confidence * 100.0);
    println!("  {}", verdict.confidence_level.describe(verdict.label));
    println!("{}", "-".repeat(70));
    println!(
        "Frames: {} sampled ({} decoded, {} padded) of {} total{}",
        report.frames.sampled,
        report.frames.decoded,
        report.frames.padded,
        report.frames.total_frames,
        if report.frames.sequential { ", read sequentially" } else { "" }
    );
    println!("Analyzed in {} ms", report.elapsed_ms);
}
