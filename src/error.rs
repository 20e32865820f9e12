use std::path::PathBuf;

use thiserror::Error;

/// Central error type for the wav2midi-core crate.
#[derive(Debug, Error)]
pub enum ConvertError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("Input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("Model bundle `{0}` not found")]
    ModelNotFound(String),

    #[error("No config file found in {}", dir.display())]
    ConfigNotFound { dir: PathBuf },

    #[error("No checkpoint found in {}", dir.display())]
    CheckpointNotFound { dir: PathBuf },

    #[error("Selected input stem '{stem}' not found in pre-separation outputs")]
    UnresolvedPrimaryStem { stem: String },

    #[error("Stem '{stem}' is not declared by the selected model")]
    UnknownStem { stem: String },

    #[error("Sample rates do not match ({left} Hz vs {right} Hz)")]
    SampleRateMismatch { left: u32, right: u32 },

    #[error("Channel counts do not match ({left} vs {right})")]
    ChannelMismatch { left: u16, right: u16 },

    #[error("Unsupported sample format in {}: {detail}", path.display())]
    UnsupportedFormat { path: PathBuf, detail: String },

    #[error("No wav files found in {}", dir.display())]
    NoOutputProduced { dir: PathBuf },

    #[error("{tool} failed: {reason}")]
    ExternalToolFailure { tool: String, reason: String },

    #[error("A conversion is already running")]
    Busy,

    #[error("Settings error: {0}")]
    Settings(String),
}

impl ConvertError {
    pub(crate) fn tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ConvertError::ExternalToolFailure {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for ConvertError {
    fn from(e: std::io::Error) -> Self {
        ConvertError::Anyhow(e.into())
    }
}

impl From<hound::Error> for ConvertError {
    fn from(e: hound::Error) -> Self {
        ConvertError::Anyhow(e.into())
    }
}

impl From<serde_yaml::Error> for ConvertError {
    fn from(e: serde_yaml::Error) -> Self {
        ConvertError::Anyhow(e.into())
    }
}

impl From<toml::de::Error> for ConvertError {
    fn from(e: toml::de::Error) -> Self {
        ConvertError::Settings(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
