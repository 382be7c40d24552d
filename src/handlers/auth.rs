use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;

use crate::errors::AppError;

pub const MISSING_TOKEN: &str = "Missing authorization token.";

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Result<String, AppError> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthenticated(MISSING_TOKEN.to_string()))
}
