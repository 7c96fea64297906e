//! Extractors whose rejections render as [`ApiError`] bodies.
//!
//! axum's own `Json`, `Path` and `Query` reject with plain text. These
//! wrappers run the same extraction and turn the rejection into a
//! `BAD_REQUEST` JSON error.

use axum::extract::{FromRequest, FromRequestParts};

use super::error::ApiError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Typed path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

/// Typed query string.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);
