//! HTTP server for the Scorebook API.
//!
//! # API Endpoints
//!
//! | Method | Path                               | Description                      |
//! |--------|------------------------------------|----------------------------------|
//! | GET    | `/health`                          | Health check                     |
//! | GET    | `/api/events`                      | SSE activity feed                |
//! | POST   | `/api/compositions`                | Add a composition                |
//! | GET    | `/api/compositions?diff=&adder=`   | List by difficulty or adder      |
//! | GET    | `/api/compositions/search?q=`      | Title prefix search              |
//! | GET    | `/api/compositions/{id}`           | Get one composition              |
//! | PATCH  | `/api/compositions/{id}`           | Patch one field                  |
//! | DELETE | `/api/compositions/{id}`           | Remove a composition             |
//! | POST   | `/api/compositions/{id}/reconcile` | Recount comments                 |
//! | GET    | `/api/compositions/{id}/comments`  | Comments of a composition        |
//! | POST   | `/api/compositions/{id}/comments`  | Add a comment                    |
//! | GET    | `/api/comments/mine`               | Comments written by the caller   |
//! | PUT    | `/api/comments/{id}`               | Edit a comment                   |
//! | DELETE | `/api/comments/{id}`               | Delete a comment                 |
//! | GET    | `/api/users/{id}/comments`         | Comments written by a user       |
//!
//! Mutating routes and `/api/comments/mine` need an `x-user-id` header.

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post, put},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::error::ApiError;
use super::extract::{JsonBody, PathParam, QueryParams};
use super::identity::{Caller, USER_ID_HEADER};
use super::logs::ACTIVITY;
use super::types::{
    status, AddCommentRequest, CommentListResponse, CommentResponse, CompositionListResponse,
    CompositionQuery, CompositionResponse, EditCommentRequest, PatchRequest, ReconcileResponse,
    RemovalResponse, SearchQuery,
};
use crate::config::AppConfig;
use crate::error::{ServerResult, ServiceResult};
use crate::models::{CommentId, CompositionDraft, CompositionId, UserId};
use crate::services::{PatchOutcome, Services};
use crate::store::{EntityStore, MemoryStore};
use crate::validation;

type ApiResult<T> = Result<T, ApiError>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
        }
    }
}

/// Open the store described by `config`.
pub fn open_store(config: &AppConfig) -> ServerResult<Arc<dyn EntityStore>> {
    let store = match &config.snapshot_path {
        Some(path) => MemoryStore::open(path)?,
        None => MemoryStore::new(),
    };
    Ok(Arc::new(store))
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(USER_ID_HEADER),
        ])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/events", get(sse_events))
        .route(
            "/api/compositions",
            post(add_composition).get(list_compositions),
        )
        .route("/api/compositions/search", get(search_compositions))
        .route(
            "/api/compositions/{id}",
            get(get_composition)
                .patch(patch_composition)
                .delete(remove_composition),
        )
        .route("/api/compositions/{id}/reconcile", post(reconcile_composition))
        .route(
            "/api/compositions/{id}/comments",
            get(list_composition_comments).post(add_comment),
        )
        .route("/api/comments/mine", get(list_my_comments))
        .route("/api/comments/{id}", put(edit_comment).delete(delete_comment))
        .route("/api/users/{id}/comments", get(list_user_comments))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server and serve until Ctrl-C.
pub async fn start_server(config: AppConfig) -> ServerResult<()> {
    config.validate()?;
    let store = open_store(&config)?;
    let state = AppState::new(Services::new(store, &config));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        removal_policy = %config.removal_policy,
        snapshot = ?config.snapshot_path,
        "Scorebook server running on http://{address}"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Scorebook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
    }
}

/// Run a store-bound operation off the async worker threads.
///
/// Unit-of-work row locks and snapshot writes block.
async fn blocking<T, F>(operation: F) -> ApiResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|err| ApiError::Aborted(err.to_string()))?
        .map_err(ApiError::from)
}

// =============================================================================
// Health & Events
// =============================================================================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "scorebook",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "compositions": "GET|POST /api/compositions",
            "composition": "GET|PATCH|DELETE /api/compositions/{id}",
            "search": "GET /api/compositions/search?q=",
            "reconcile": "POST /api/compositions/{id}/reconcile",
            "comments": "GET|POST /api/compositions/{id}/comments",
            "comment": "PUT|DELETE /api/comments/{id}",
            "myComments": "GET /api/comments/mine",
            "userComments": "GET /api/users/{id}/comments",
            "events": "GET /api/events (SSE)"
        }
    }))
}

/// SSE endpoint streaming the activity feed
async fn sse_events() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = ACTIVITY.subscribe();

    // lagged receivers skip the entries they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Compositions
// =============================================================================

async fn add_composition(
    State(state): State<AppState>,
    Caller(caller): Caller,
    JsonBody(draft): JsonBody<CompositionDraft>,
) -> ApiResult<(StatusCode, Json<CompositionResponse>)> {
    let services = state.services.clone();
    let composition = blocking(move || services.compositions.add_composition(&draft, caller)).await?;
    Ok((
        StatusCode::CREATED,
        Json(CompositionResponse::new(status::ADDED_COMP, composition)),
    ))
}

async fn list_compositions(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<CompositionQuery>,
) -> ApiResult<Json<CompositionListResponse>> {
    let services = state.services.clone();
    let response = match (query.diff, query.adder) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "Filter by either 'diff' or 'adder', not both".to_string(),
            ))
        }
        (Some(diff), None) => {
            let difficulty =
                validation::difficulty("diff", diff).map_err(|err| ApiError::Service(err.into()))?;
            let found = blocking(move || services.compositions.by_difficulty(difficulty)).await?;
            CompositionListResponse::new(status::GOT_COMPS_BY_DIFF, found)
        }
        (None, Some(adder)) => {
            let found = blocking(move || services.compositions.by_adder(UserId(adder))).await?;
            CompositionListResponse::new(status::GOT_COMPS_BY_ADDER_ID, found)
        }
        (None, None) => {
            let found = blocking(move || services.compositions.all()).await?;
            CompositionListResponse::new(status::GOT_COMPS, found)
        }
    };
    Ok(Json(response))
}

async fn search_compositions(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> ApiResult<Json<CompositionListResponse>> {
    let services = state.services.clone();
    let found = blocking(move || services.search.search_by_title_prefix(&query.q)).await?;
    Ok(Json(CompositionListResponse::new(
        status::SEARCH_COMPLETED,
        found,
    )))
}

async fn get_composition(
    State(state): State<AppState>,
    PathParam(id): PathParam<u64>,
) -> ApiResult<Json<CompositionResponse>> {
    let services = state.services.clone();
    let composition = blocking(move || services.compositions.by_id(CompositionId(id))).await?;
    Ok(Json(CompositionResponse::new(status::GOT_COMP_BY_ID, composition)))
}

/// `x-user-id` is required only to identify the caller; any user may patch.
async fn patch_composition(
    State(state): State<AppState>,
    Caller(_caller): Caller,
    PathParam(id): PathParam<u64>,
    JsonBody(request): JsonBody<PatchRequest>,
) -> ApiResult<Json<PatchOutcome>> {
    let services = state.services.clone();
    let outcome = blocking(move || {
        services
            .patch
            .apply_patch(CompositionId(id), &request.field, &request.value.to_raw())
    })
    .await?;
    Ok(Json(outcome))
}

/// `x-user-id` is required only to identify the caller; any user may remove.
async fn remove_composition(
    State(state): State<AppState>,
    Caller(_caller): Caller,
    PathParam(id): PathParam<u64>,
) -> ApiResult<Json<RemovalResponse>> {
    let services = state.services.clone();
    let removal = blocking(move || services.compositions.remove(CompositionId(id))).await?;
    Ok(Json(removal.into()))
}

/// `x-user-id` is required only to identify the caller; any user may reconcile.
async fn reconcile_composition(
    State(state): State<AppState>,
    Caller(_caller): Caller,
    PathParam(id): PathParam<u64>,
) -> ApiResult<Json<ReconcileResponse>> {
    let services = state.services.clone();
    let drift = blocking(move || services.counter.reconcile(CompositionId(id))).await?;
    Ok(Json(drift.into()))
}

// =============================================================================
// Comments
// =============================================================================

async fn list_composition_comments(
    State(state): State<AppState>,
    PathParam(id): PathParam<u64>,
) -> ApiResult<Json<CommentListResponse>> {
    let services = state.services.clone();
    let comments = blocking(move || {
        let id = CompositionId(id);
        services.compositions.by_id(id)?;
        services.comments.list_by_composition(id)
    })
    .await?;
    Ok(Json(CommentListResponse::new(
        status::GOT_COMMENTS_BY_COMP,
        comments,
    )))
}

async fn add_comment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(id): PathParam<u64>,
    JsonBody(request): JsonBody<AddCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let services = state.services.clone();
    let comment = blocking(move || {
        services
            .comments
            .add_comment(&request.content, CompositionId(id), caller)
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse::new(status::ADDED_COMMENT, comment)),
    ))
}

async fn list_my_comments(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<CommentListResponse>> {
    let services = state.services.clone();
    let comments = blocking(move || services.comments.list_by_user(caller)).await?;
    Ok(Json(CommentListResponse::new(
        status::GOT_COMMENTS_BY_USER,
        comments,
    )))
}

async fn list_user_comments(
    State(state): State<AppState>,
    PathParam(id): PathParam<u64>,
) -> ApiResult<Json<CommentListResponse>> {
    let services = state.services.clone();
    let comments = blocking(move || services.comments.list_by_user(UserId(id))).await?;
    Ok(Json(CommentListResponse::new(
        status::GOT_COMMENTS_BY_USER,
        comments,
    )))
}

async fn edit_comment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(id): PathParam<u64>,
    JsonBody(request): JsonBody<EditCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let services = state.services.clone();
    let comment = blocking(move || {
        services
            .comments
            .edit_comment(CommentId(id), caller, &request.content)
    })
    .await?;
    Ok(Json(CommentResponse::new(status::EDITED_COMMENT, comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(id): PathParam<u64>,
) -> ApiResult<Json<CommentResponse>> {
    let services = state.services.clone();
    let comment = blocking(move || services.comments.delete_comment(CommentId(id), caller)).await?;
    Ok(Json(CommentResponse::new(status::REMOVED_COMMENT, comment)))
}
