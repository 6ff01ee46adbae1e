use thiserror::Error;

pub type Result<T> = std::result::Result<T, MiniAppError>;

#[derive(Error, Debug)]
pub enum MiniAppError {
    #[error("{0} is required")]
    MissingParameter(&'static str),
    #[error("{0} is malformed: {1}")]
    MalformedParameter(&'static str, String),
    #[error("Upstream credential is not configured")]
    UpstreamConfig,
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("User not found")]
    NotFound,
    #[error("Render failure: {0}")]
    Render(String),
    #[error("Action cancelled by the user")]
    ActionCancelled,
    #[error("Host error: {0}")]
    Host(#[from] HostError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Parsing error")]
    Parse,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for MiniAppError {
    fn from(_: serde_json::Error) -> Self {
        Self::Parse
    }
}

impl From<url::ParseError> for MiniAppError {
    fn from(_: url::ParseError) -> Self {
        Self::Parse
    }
}

/// Failure of a capability provided by the hosting client.
///
/// `Rejected` is reserved for an explicit "no" from the user (closing a
/// wallet prompt, cancelling a transfer sheet); everything else is an
/// ordinary failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("rejected by the user: {0}")]
    Rejected(String),
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
}

impl HostError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, HostError::Rejected(_))
    }
}
