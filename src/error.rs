use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong between reading a gradebook export and
/// handing back a populated spreadsheet.
#[derive(Debug, Error)]
pub enum Error {
    /// The input (grid, spreadsheet reference, or a remote response body)
    /// does not have the shape we rely on.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Non-success HTTP response that is not a rate-limit rejection.
    #[error("remote API error (HTTP {status}): {message}")]
    RemoteApi { status: u16, message: String },

    /// HTTP 429. Retried inside the client, never handed to callers.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("tab \"{0}\" not found")]
    TabNotFound(String),

    #[error("gradebook export failed: {0}")]
    ExportFailed(String),

    #[error("timed out waiting for gradebook export after {attempts} polls")]
    ExportTimeout { attempts: u32 },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
