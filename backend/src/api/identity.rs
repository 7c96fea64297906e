//! Caller identity extraction.
//!
//! The caller is named by the `x-user-id` header, a positive integer.
//! Authentication happens upstream; this backend trusts the header.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;
use crate::models::UserId;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The user making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl Caller {
    pub fn from_header(value: Option<&str>) -> Result<Self, ApiError> {
        let raw = value
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?;
        match raw.trim().parse::<u64>() {
            Ok(id) if id > 0 => Ok(Self(UserId(id))),
            _ => Err(ApiError::Unauthorized(format!(
                "Invalid {USER_ID_HEADER} header '{raw}'"
            ))),
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .map(|value| value.to_str().map_err(|_| ()))
            .transpose()
            .map_err(|_| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header")))?;
        Self::from_header(value)
    }
}
