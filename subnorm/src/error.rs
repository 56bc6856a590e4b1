use crate::types::PayloadKind;
use thiserror::Error;

/// Result alias used throughout the crate
pub type SubnormResult<T> = Result<T, SubnormError>;

/// Errors produced while normalizing, serializing or fetching captions
#[derive(Error, Debug)]
pub enum SubnormError {
    /// The payload could not be turned into cues at all
    #[error("Malformed {format} caption data: {message}")]
    MalformedCaptionData { format: PayloadKind, message: String },

    /// The content matches none of the supported payload formats
    #[error("Unrecognized caption data: {message}")]
    UnrecognizedPayload { message: String },

    /// A timestamp string or number violates its format or sign constraints
    #[error("Invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    /// A cue ends before it starts
    #[error("Invalid timing for cue {index}: end {end} precedes start {start}")]
    InvalidCueTiming { index: usize, start: f64, end: f64 },

    #[error("No {language} captions found for video {video_id}")]
    CaptionNotFound { video_id: String, language: String },

    #[error("Caption provider unavailable: {message}")]
    ProviderUnavailable { message: String, retry_after: u64 },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("File system error: {source}")]
    FileSystem {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl SubnormError {
    pub(crate) fn malformed(format: PayloadKind, message: impl Into<String>) -> Self {
        Self::MalformedCaptionData {
            format,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_timestamp(value: impl ToString) -> Self {
        Self::InvalidTimestamp {
            value: value.to_string(),
        }
    }

    /// Whether a caller may try the same request again.
    ///
    /// Only provider-side availability problems qualify. Normalization errors
    /// are deterministic and retrying them yields the same failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubnormError::ProviderUnavailable { .. })
    }

    /// Suggested delay in seconds before retrying
    pub fn retry_delay(&self) -> Option<u64> {
        match self {
            SubnormError::ProviderUnavailable { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// The payload kind involved, for errors raised while parsing one
    pub fn payload_kind(&self) -> Option<PayloadKind> {
        match self {
            SubnormError::MalformedCaptionData { format, .. } => Some(*format),
            _ => None,
        }
    }
}
