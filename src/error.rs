//! Errors raised while turning a video into a verdict

/// Error types for the detection pipeline
#[derive(Debug)]
pub enum DetectError {
    /// The container could not be opened or probed
    OpenVideo(String),
    /// Probing worked but not a single frame could be decoded
    NoFrames,
    /// The decoder ran but produced unusable output
    Decode(String),
    /// Model loading or forward pass failed
    Model(String),
    Io(std::io::Error),
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectError::OpenVideo(s) => write!(f, "Cannot open video file: {}", s),
            DetectError::NoFrames => write!(f, "No frames found in video"),
            DetectError::Decode(s) => write!(f, "Failed to preprocess video: {}", s),
            DetectError::Model(s) => write!(f, "Model error: {}", s),
            DetectError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for DetectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DetectError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DetectError {
    fn from(e: std::io::Error) -> Self {
        DetectError::Io(e)
    }
}

impl DetectError {
    /// True when the upload itself is at fault rather than the service
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            DetectError::OpenVideo(_) | DetectError::NoFrames | DetectError::Decode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DetectError>;
