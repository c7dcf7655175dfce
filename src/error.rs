use std::time::Duration;
use thiserror::Error;

/// Failure to establish an authenticated session. Fatal for the whole run.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials: set {0} in the environment or .env")]
    MissingCredentials(&'static str),

    #[error("browser error during {step}: {message}")]
    Browser { step: &'static str, message: String },

    #[error("login rejected: sign-in page shows an error after submit")]
    Rejected,

    #[error("login finished but the browser holds no session cookies")]
    NoCookies,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Failure of a single cell fetch. Absorbed by the orchestrator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("backend returned HTTP {status}")]
    Status { status: u16 },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unparseable response body: {0}")]
    Parse(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status } => *status == 429 || *status >= 500,
            FetchError::Timeout(_) | FetchError::Transport(_) => true,
            FetchError::Parse(_) => false,
        }
    }
}

/// Rejected bounding box or grid parameters.
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("invalid bounding box: lat [{lat_min}, {lat_max}], lon [{lon_min}, {lon_max}]")]
    InvalidBox {
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    },

    #[error("grid divisions must be at least 1")]
    ZeroDivisions,
}

/// Failure while handing a result set to the CSV collaborator.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
