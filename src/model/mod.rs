use serde::Serialize;

use crate::error::{DetectError, Result};
use crate::video::ClipTensor;

mod onnx;

pub use onnx::OnnxModel;

/// Pluggable deepfake classifier
pub trait DeepfakeModel: Send + Sync {
    /// Probability in `[0, 1]` that the clip is fake
    fn predict(&self, clip: &ClipTensor) -> Result<f32>;
}

/// Model that always answers with the same probability - for tests or dry runs
pub struct FixedModel {
    probability: f32,
}

impl FixedModel {
    pub fn new(probability: f32) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl DeepfakeModel for FixedModel {
    fn predict(&self, _clip: &ClipTensor) -> Result<f32> {
        Ok(self.probability)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Fake,
    Real,
}

impl Label {
    /// Text shown to users
    pub fn display_text(&self) -> &'static str {
        match self {
            Label::Fake => "Fake Video",
            Label::Real => "Real Video",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryHigh,
    High,
    Moderate,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence > 0.9 {
            ConfidenceLevel::VeryHigh
        } else if confidence > 0.7 {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Moderate
        }
    }

    /// One-line reading of the verdict at this confidence
    pub fn describe(&self, label: Label) -> &'static str {
        match (self, label) {
            (ConfidenceLevel::VeryHigh, Label::Fake) => "Very high confidence - likely a deepfake",
            (ConfidenceLevel::High, Label::Fake) => "High confidence - probably a deepfake",
            (ConfidenceLevel::Moderate, Label::Fake) => "Moderate confidence - might be a deepfake",
            (ConfidenceLevel::VeryHigh, Label::Real) => "Very high confidence - likely authentic",
            (ConfidenceLevel::High, Label::Real) => "High confidence - probably authentic",
            (ConfidenceLevel::Moderate, Label::Real) => "Moderate confidence - might be authentic",
        }
    }
}

/// Classification outcome for a single clip
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub label: Label,
    /// Probability of the chosen label
    pub confidence: f32,
    pub confidence_level: ConfidenceLevel,
    pub fake_probability: f32,
    pub real_probability: f32,
    pub threshold: f32,
}

impl Verdict {
    pub fn is_fake(&self) -> bool {
        self.label == Label::Fake
    }
}

/// Turn the model's fake probability into a verdict.
/// A clip is fake only when the probability is strictly above `threshold`.
pub fn interpret(fake_probability: f32, threshold: f32) -> Result<Verdict> {
    if !fake_probability.is_finite() || !(0.0..=1.0).contains(&fake_probability) {
        return Err(DetectError::Model(format!(
            "model output {} is not a probability",
            fake_probability
        )));
    }

    let real_probability = 1.0 - fake_probability;
    let (label, confidence) = if fake_probability > threshold {
        (Label::Fake, fake_probability)
    } else {
        (Label::Real, real_probability)
    };

    Ok(Verdict {
        label,
        confidence,
        confidence_level: ConfidenceLevel::from_confidence(confidence),
        fake_probability,
        real_probability,
        threshold,
    })
}
