use thiserror::Error;

/// Error taxonomy for every client-facing operation.
///
/// `Validation` and `Auth` are surfaced to the caller synchronously;
/// transport failures during the poll loop are swallowed into the loop's
/// continue-and-retry policy and never appear here. `SessionExpired` is the
/// only error that forces a full re-authentication flow.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally before any request was issued.
    #[error("{0}")]
    Validation(String),

    /// The configured server pool is empty. Terminal for a selection round.
    #[error("no servers available")]
    NoServers,

    /// Transport failure: the server never produced a response. Retriable.
    #[error("connection failed: {0}")]
    Connection(String),

    /// 4xx from login/register, carrying the server's message verbatim
    /// when it sent one.
    #[error("{0}")]
    Auth(String),

    /// The poll loop observed a 401; the session is gone.
    #[error("session expired")]
    SessionExpired,

    /// An authenticated operation was attempted without a live session.
    #[error("not logged in")]
    NotAuthenticated,

    /// Non-2xx from an authenticated endpoint outside the auth flow.
    #[error("{0}")]
    Api(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("download failed: {0}")]
    Download(String),

    /// Malformed transport encoding (cipher input that is not valid
    /// base64, or decrypted bytes that are not UTF-8). Degraded, not fatal.
    #[error("{0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Connection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
