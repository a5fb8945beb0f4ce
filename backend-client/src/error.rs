use perfsheriff_core::BackendError;
use perfsheriff_core::BugId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid dashboard URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("dashboard returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The dashboard answered with an `{"error": ...}` body.
    #[error("{0}")]
    Remote(String),

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bug id {0} cannot be sent to the dashboard")]
    UnsendableBugId(BugId),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        BackendError::new(err.to_string())
    }
}
