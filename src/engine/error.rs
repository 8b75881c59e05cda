use crate::engine::types::ReferenceRole;

/// Programming or usage errors. These propagate immediately instead of being
/// recovered per shot.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("unknown brand style '{0}'")]
    UnknownStyle(String),
    #[error("unknown aspect ratio '{0}'")]
    UnknownAspectRatio(String),
    #[error("missing required {0} reference image")]
    MissingReference(ReferenceRole),
}

/// Failures talking to a collaborator. Timeouts, connection failures and
/// throttling statuses are retry-eligible; the engine surfaces them without
/// retrying on its own beyond the adapter's bounded retry.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("request failed with status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("invalid response payload: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout(_) | TransportError::Connect(_) => true,
            TransportError::Status { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            TransportError::Request(_) | TransportError::InvalidResponse(_) => false,
        }
    }
}

/// Per-shot generation failure, tagged with the shot index so callers can
/// report status without aborting sibling shots.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("shot {index}: no image part in response")]
    NoImage { index: usize },
    #[error("shot {index}: failed to decode returned image: {detail}")]
    Decode { index: usize, detail: String },
    #[error("shot {index}: link returned instead of image: {url}")]
    LinkInsteadOfImage { index: usize, url: String },
    #[error("shot {index}: empty brief, skipped")]
    EmptyBrief { index: usize },
    #[error("shot {index}: transport failure: {source}")]
    Transport {
        index: usize,
        #[source]
        source: TransportError,
    },
}

impl GenerationError {
    pub fn shot_index(&self) -> usize {
        match self {
            GenerationError::NoImage { index }
            | GenerationError::Decode { index, .. }
            | GenerationError::LinkInsteadOfImage { index, .. }
            | GenerationError::EmptyBrief { index }
            | GenerationError::Transport { index, .. } => *index,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::Transport { source, .. } if source.is_retryable())
    }
}
