//! Error types for the Scorebook backend.
//!
//! One enum per layer, with `From` conversions so `?` works across
//! layer boundaries:
//!
//! - [`StoreError`] - storage engine and snapshot failures
//! - [`ValidationError`] - rejected composition fields or comment content
//! - [`ServiceError`] - everything an operation can report to its caller
//! - [`ConfigError`] - invalid environment or command-line configuration
//! - [`ServerError`] - startup and shutdown of the HTTP server

use thiserror::Error;

use crate::models::{CommentId, CompositionId, UserId};

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by an [`crate::store::EntityStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read or write the snapshot file.
    #[error("Snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot contents could not be encoded or decoded.
    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Snapshot was written by an incompatible format version.
    #[error("Unsupported snapshot version {found} (expected {expected})")]
    SnapshotVersion { found: u32, expected: u32 },

    /// A composition removal was committed while comments still point at it.
    #[error("Composition {id} still has {comments} comment(s) attached")]
    DanglingComments { id: CompositionId, comments: usize },
}

// =============================================================================
// Validation Errors
// =============================================================================

/// A rejected field value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty or whitespace-only text.
    #[error("Field '{field}' must not be empty")]
    Empty { field: &'static str },

    /// Text longer than the field allows.
    #[error("Field '{field}' must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// Integer outside the inclusive range of the field.
    #[error("Field '{field}' must be between {min} and {max}")]
    OutOfRange { field: &'static str, min: i64, max: i64 },

    /// Input that does not parse as an integer.
    #[error("Field '{field}' must be an integer")]
    NotANumber { field: &'static str },

    /// Text that does not match the field's pattern.
    #[error("Field '{field}' must be a https://www.youtube.com/ link")]
    Pattern { field: &'static str },

    /// Several fields failed at once (composition creation).
    #[error("{} invalid field(s): {}", .0.len(), join_messages(.0))]
    Fields(Vec<ValidationError>),
}

impl ValidationError {
    /// Name of the offending field, `None` for [`ValidationError::Fields`].
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Empty { field }
            | Self::TooLong { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::NotANumber { field }
            | Self::Pattern { field } => Some(field),
            Self::Fields(_) => None,
        }
    }
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Service Errors (top-level)
// =============================================================================

/// Errors returned by the catalogue operations.
///
/// Patch outcomes that change nothing are not errors; see
/// [`crate::services::patch::PatchOutcome`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid comment content or composition field. Nothing was written.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The referenced composition does not exist.
    #[error("Composition {0} not found")]
    CompositionNotFound(CompositionId),

    /// The referenced comment does not exist.
    #[error("Comment {0} not found")]
    CommentNotFound(CommentId),

    /// The composition disappeared while its counter was being adjusted.
    /// The enclosing comment mutation was aborted.
    #[error("Composition {0} vanished while its comment counter was being adjusted")]
    ConsistencyViolation(CompositionId),

    /// Removal refused because comments still reference the composition.
    #[error("Composition {id} has {comments} comment(s); remove them first")]
    ReferentialIntegrity { id: CompositionId, comments: usize },

    /// Blank search string.
    #[error("Search query must not be empty")]
    EmptyQuery,

    /// The capability check denied the requester.
    #[error("User {requester} may not modify comment {comment}")]
    Forbidden { requester: UserId, comment: CommentId },

    /// Storage failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid configuration value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A value could not be parsed or is out of bounds.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Store could not be opened.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Socket bind or serve failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for validators.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for catalogue operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
