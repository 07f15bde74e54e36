pub mod auth;
pub mod health;
pub mod listen;
pub mod speak;
pub mod vaanga;

use axum::{extract::rejection::JsonRejection, http::HeaderValue, Json};
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// Unwrap a JSON body, turning malformed payloads into validation errors
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::validation(rejection.body_text()))
}

/// Elapsed time in seconds, rounded to milliseconds
pub(crate) fn seconds(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}

pub(crate) fn seconds_header(elapsed: Duration) -> HeaderValue {
    HeaderValue::from_str(&format!("{:.3}", elapsed.as_secs_f64())).unwrap_or(HeaderValue::from_static("0.000"))
}
