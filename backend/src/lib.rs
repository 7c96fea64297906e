//! # Scorebook - composition catalogue with user comments
//!
//! Scorebook stores musical compositions and the comments users leave on
//! them. Each composition carries a denormalized comment count that stays
//! exact under concurrent comment writes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────────┐     ┌─────────────────┐
//! │  HTTP API   │────▶│       Services       │────▶│   EntityStore   │
//! │ (axum, SSE) │     │ comments, counter,   │     │ (memory + JSON  │
//! │             │     │ patch, search, ...   │     │    snapshot)    │
//! └─────────────┘     └──────────────────────┘     └─────────────────┘
//! ```
//!
//! A comment write and the matching counter adjustment are staged in one
//! per-composition unit of work and committed together.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scorebook::{AppConfig, MemoryStore, Services};
//!
//! let config = AppConfig::default();
//! let services = Services::new(Arc::new(MemoryStore::new()), &config);
//! let comment = services.comments.add_comment("Lovely", composition_id, user_id)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (Composition, Comment, ids)
//! - [`validation`] - Field validators
//! - [`store`] - Storage seam and the in-memory implementation
//! - [`services`] - Catalogue operations
//! - [`config`] - Runtime configuration
//! - [`api`] - HTTP API server and activity feed

// Core modules
pub mod error;
pub mod models;

// Validation
pub mod validation;

// Storage
pub mod store;

// Operations
pub mod services;

// Configuration
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ServerError, ServiceError, ServiceResult, StoreError, StoreResult,
    ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Comment, CommentId, Composition, CompositionDraft, CompositionId, Difficulty, UserId,
};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{CommentFilter, CompositionFilter, CompositionUnit, EntityStore, MemoryStore};

// =============================================================================
// Re-exports - Services
// =============================================================================

pub use services::{
    AttributePatchEngine, AuthorOnly, CommentAccess, CommentLifecycle, CompositionCatalog,
    CompositionSearch, CounterCoordinator, CounterDrift, NoOpReason, PatchField, PatchOutcome,
    Removal, RemovalPolicy, Services, Unrestricted,
};

// =============================================================================
// Re-exports - Config & API
// =============================================================================

pub use config::AppConfig;
pub use api::{router, start_server, AppState};
