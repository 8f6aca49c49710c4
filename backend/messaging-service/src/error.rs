use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("a user cannot exchange messages with themselves")]
    InvalidPair,

    #[error("communication not established between sender and receiver")]
    CommunicationNotPermitted,

    #[error("unauthorized")]
    Unauthorized,

    /// Caller is authenticated but not allowed to act on the resource
    /// (e.g. deleting someone else's message).
    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("media error: {0}")]
    Media(String),

    #[error("internal server error")]
    Internal,
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => {
                AppError::StoreUnavailable("connection pool timed out".into())
            }
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

impl AppError {
    /// Returns whether this error is retryable (e.g., database connection timeout)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::StoreTimeout(_) | AppError::StoreUnavailable(_) | AppError::Internal
        )
    }

    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) | AppError::InvalidPair => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden | AppError::CommunicationNotPermitted => 403,
            AppError::NotFound => 404,
            AppError::StoreTimeout(_) => 504,
            AppError::StoreUnavailable(_) => 503,
            AppError::Config(_)
            | AppError::StartServer(_)
            | AppError::Media(_)
            | AppError::Internal => 500,
        }
    }

    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
                "INTERNAL_SERVER_ERROR"
            }
            AppError::BadRequest(_) => "INVALID_REQUEST",
            AppError::InvalidPair => "INVALID_PAIR",
            AppError::CommunicationNotPermitted => "COMMUNICATION_NOT_PERMITTED",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound => "NOT_FOUND",
            AppError::StoreTimeout(_) => "STORE_TIMEOUT",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::Media(_) => "MEDIA_ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
    pub status: u16,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = ResponseError::status_code(self);
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        HttpResponse::build(status).json(ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.code(),
            status: status.as_u16(),
        })
    }
}
