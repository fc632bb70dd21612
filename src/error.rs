use burn::record::RecorderError;
use thiserror::Error;

/// The error type for LUMNet construction, weight loading and inference.
#[derive(Error, Debug)]
pub enum LumNetError {
    /// The model configuration is logically inconsistent.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// An input tensor does not fit the model.
    #[error("Invalid input tensor shape for `{input}`: expected {expected}, got {actual:?}")]
    InvalidTensorShape {
        /// Name of the offending input.
        input: &'static str,
        /// Human readable description of the accepted shape.
        expected: String,
        /// The shape that was passed in.
        actual: [usize; 4],
    },

    /// Pretrained weights were requested but the crate was built without network support.
    #[error("Pretrained weights for {model} require the `pretrained` feature")]
    PretrainedUnavailable { model: &'static str },

    #[error("Could not download weights: {0}")]
    Download(#[from] std::io::Error),

    #[error("Could not load weights: {0}")]
    Recorder(#[from] RecorderError),
}

/// A specialized `Result` type for LUMNet operations.
pub type LumNetResult<T> = Result<T, LumNetError>;

impl LumNetError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}
