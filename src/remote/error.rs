use thiserror::Error;

/// Failure of a single call against the geodata API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never produced a response (connection refused, timeout, ...).
    #[error("Request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("Server rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The session token is missing, invalid or expired.
    #[error("Unauthorized, the session is no longer valid")]
    Unauthorized,

    /// The server answered with a body that does not have the expected shape.
    #[error("Invalid response from server: {0}")]
    MalformedResponse(String),

    /// The request could not be built from the given input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RemoteError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteError::Unauthorized)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}
