use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;

use crate::domain::errors::DomainError;

pub const TEMPORARILY_UNAVAILABLE: &str =
    "Order service is temporarily unavailable. Please try again in a moment.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Order not found")]
    NotFound,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Unauthenticated(msg) => AppError::Unauthenticated(msg),
            DomainError::InvalidInput(msg) => AppError::BadRequest(msg),
            e @ (DomainError::ProductNotFound(_)
            | DomainError::ProductUnavailable(_)
            | DomainError::ColorNotFound(_)
            | DomainError::InsufficientStock { .. }) => AppError::BadRequest(e.to_string()),
            DomainError::NotFound => AppError::NotFound,
            DomainError::Conflict(msg) | DomainError::Unavailable(msg) => AppError::Unavailable(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<BlockingError> for AppError {
    fn from(e: BlockingError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Unavailable(_) | AppError::Internal(_) => {
                log::error!("{self}");
                TEMPORARILY_UNAVAILABLE.to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}
