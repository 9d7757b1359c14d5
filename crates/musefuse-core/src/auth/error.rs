use thiserror::Error;

/// Session lifecycle errors.
///
/// None of the variants carry a token or a password.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("Unable to reach server: {0}")]
    TransportFailure(String),

    #[error("Token has no readable expiry")]
    MalformedToken,

    #[error("Session expired")]
    Expired,

    #[error("Token refresh rejected: {message}")]
    RefreshRejected { message: String },

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Response discarded - session changed while the request was in flight")]
    Superseded,

    #[error("Session storage error: {0}")]
    Storage(String),
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Storage(error.to_string())
    }
}
