use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// No access credential configured; raised before any network call.
    #[error("No API key configured")]
    AuthenticationMissing,

    /// The supplied messages contain no user-authored text; raised before
    /// any network call.
    #[error("Message contains no user text")]
    EmptyPrompt,

    /// The remote service rejected the request after a completed exchange.
    /// `detail` is the remote's text, verbatim where available.
    #[error("Agent request rejected ({status} {code}): {detail}")]
    RequestRejected {
        status: u16,
        code: String,
        detail: String,
    },

    /// A 2xx response arrived without a body to stream.
    #[error("Agent response had no body")]
    EmptyResponseBody,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
