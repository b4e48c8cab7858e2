use thiserror::Error;

/// Errors surfaced by the synthesis pipeline.
#[derive(Debug, Error)]
pub enum TtsError {
    /// Rejected before any inference call is made.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or malformed config, vocabulary, voice style or model file.
    #[error("Asset error: {0}")]
    Asset(String),

    /// The inference engine failed or returned a malformed tensor.
    #[error("Inference error in {operation}: {message}")]
    Inference {
        operation: &'static str,
        message: String,
    },

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TtsError {
    pub(crate) fn inference(operation: &'static str, message: impl Into<String>) -> Self {
        TtsError::Inference {
            operation,
            message: message.into(),
        }
    }

    pub(crate) fn asset(message: impl Into<String>) -> Self {
        TtsError::Asset(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        TtsError::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TtsError>;
