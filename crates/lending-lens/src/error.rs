use crate::config::ConfigError;
use crate::lending::calendar::DateRangeError;
use crate::lending::commit::{CommitError, RepositoryError};
use crate::lending::import::LoanImportError;
use crate::lending::session::SessionError;
use crate::lending::store::FetchError;
use crate::lending::sweep::SweepError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    InvalidRequest(String),
    Import(LoanImportError),
    Range(DateRangeError),
    Sweep(SweepError),
    Session(SessionError),
    Fetch(FetchError),
    Commit(CommitError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_)
            | AppError::Import(_)
            | AppError::Range(_)
            | AppError::Sweep(_)
            | AppError::Session(_) => StatusCode::BAD_REQUEST,
            AppError::Commit(CommitError::Disabled | CommitError::Rejected) => {
                StatusCode::FORBIDDEN
            }
            AppError::Fetch(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Commit(CommitError::Repository(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::InvalidRequest(message) => write!(f, "invalid request: {}", message),
            AppError::Import(err) => write!(f, "import error: {}", err),
            AppError::Range(err) => write!(f, "invalid date range: {}", err),
            AppError::Sweep(err) => write!(f, "invalid sweep: {}", err),
            AppError::Session(err) => write!(f, "invalid selection: {}", err),
            AppError::Fetch(err) => write!(f, "loan store error: {}", err),
            AppError::Commit(err) => write!(f, "threshold commit failed: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::InvalidRequest(_) => None,
            AppError::Import(err) => Some(err),
            AppError::Range(err) => Some(err),
            AppError::Sweep(err) => Some(err),
            AppError::Session(err) => Some(err),
            AppError::Fetch(err) => Some(err),
            AppError::Commit(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<LoanImportError> for AppError {
    fn from(value: LoanImportError) -> Self {
        Self::Import(value)
    }
}

impl From<DateRangeError> for AppError {
    fn from(value: DateRangeError) -> Self {
        Self::Range(value)
    }
}

impl From<SweepError> for AppError {
    fn from(value: SweepError) -> Self {
        Self::Sweep(value)
    }
}

impl From<SessionError> for AppError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

impl From<FetchError> for AppError {
    fn from(value: FetchError) -> Self {
        Self::Fetch(value)
    }
}

impl From<CommitError> for AppError {
    fn from(value: CommitError) -> Self {
        Self::Commit(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Commit(CommitError::Repository(value))
    }
}
