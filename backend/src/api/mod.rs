//! HTTP API module.
//!
//! This module provides the HTTP server, request/response types, caller
//! identity extraction and the activity feed for the Scorebook backend.

pub mod error;
pub mod extract;
pub mod identity;
pub mod logs;
pub mod server;
pub mod types;

pub use error::{error_response, ApiError};
pub use extract::{JsonBody, PathParam, QueryParams};
pub use identity::{Caller, USER_ID_HEADER};
pub use logs::*;
pub use server::{open_store, router, start_server, AppState};
pub use types::*;
