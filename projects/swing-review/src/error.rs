/// Errors from fetching analysis data, either over HTTP or from a local export.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The request never got a response.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status code.
    #[error("backend error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body as returned.
        body: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested resource does not exist in this source.
    #[error("not found: {0}")]
    NotFound(String),
}

impl SourceError {
    /// Whether the error means "nothing there" rather than "could not ask".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Status { status, .. } => *status == 404,
            _ => false,
        }
    }
}

/// Errors reported by a media surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurfaceError {
    /// The surface has no playable data yet.
    #[error("surface not ready")]
    NotReady,

    /// The surface failed to load its source.
    #[error("surface errored: {0}")]
    Errored(String),
}

/// Returned when a load result arrives after a newer load was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("load generation {ticket} superseded by generation {current}")]
pub struct StaleLoad {
    pub ticket: u64,
    pub current: u64,
}
