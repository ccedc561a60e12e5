//! Multipart field reading with errors mapped to API errors.

use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use bytes::Bytes;

use farmhub_core::error::AppError;

use crate::error::ApiError;

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::payload_too_large(e.body_text()).into()
    } else {
        AppError::validation(format!("Multipart error: {}", e.body_text())).into()
    }
}

/// Read the next field of a form, if any.
pub(crate) async fn next_field<'a>(
    multipart: &'a mut axum::extract::Multipart,
) -> Result<Option<Field<'a>>, ApiError> {
    multipart.next_field().await.map_err(multipart_error)
}

/// Read a field as UTF-8 text.
pub(crate) async fn text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

/// Read a field's full body.
pub(crate) async fn bytes(field: Field<'_>) -> Result<Bytes, ApiError> {
    field.bytes().await.map_err(multipart_error)
}

/// Parse a required text field.
pub(crate) fn required<T: std::str::FromStr>(
    name: &str,
    value: Option<String>,
) -> Result<T, ApiError> {
    let value = value.ok_or_else(|| AppError::validation(format!("{name} is required")))?;
    value
        .trim()
        .parse()
        .map_err(|_| AppError::validation(format!("{name} is invalid: {value}")).into())
}
