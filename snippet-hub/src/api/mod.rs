//! HTTP API layer exposing the file mutation endpoints.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header::RETRY_AFTER, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use snippet_hub_core::auth::{Session, TokenVerifier};
use snippet_hub_core::error::CoreError;
use snippet_hub_core::events::EventBus;
use snippet_hub_core::model::{FileRecord, FileSettingsUpdate, NewFile};
use snippet_hub_core::mutation::{MutationService, UnloadOutcome};
use snippet_hub_core::permissions;
use snippet_hub_core::ratelimit::{
    Decision, RateLimiter, ACTION_CREATE_FILE, ACTION_DELETE_FILE, ACTION_SAVE_ON_UNLOAD,
    ACTION_UPDATE_FILE,
};
use snippet_hub_core::storage::{FileStore, UserStore};
use snippet_hub_core::validate;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub files: Arc<dyn FileStore>,
    pub users: Arc<dyn UserStore>,
    pub service: Arc<MutationService>,
    pub limiter: Arc<RateLimiter>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(
        files: Arc<dyn FileStore>,
        users: Arc<dyn UserStore>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new());
        let events = EventBus::new();
        let service = Arc::new(MutationService::new(
            files.clone(),
            limiter.clone(),
            events.clone(),
        ));
        Self {
            files,
            users,
            service,
            limiter,
            verifier,
            events,
        }
    }
}

async fn resolve_session(parts: &Parts, state: &AppState) -> Option<Session> {
    let headers = &parts.headers;
    if let Some(auth) = headers.get("Authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            if let Some(session) = state.verifier.verify(token).await {
                return Some(session);
            }
        }
    }
    // X-User-Id fallback for local development and tests; the role comes from
    // the user store so seeded admins keep their quota bypass.
    let user_id = headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())?;
    let role = state
        .users
        .find_by_id(&user_id)
        .await
        .ok()
        .flatten()
        .map(|u| u.role)
        .unwrap_or(snippet_hub_core::model::Role::User);
    Some(Session { user_id, role })
}

/// Required identity; rejects with 401 when no session resolves.
pub struct Auth(pub Session);

impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_session(parts, state)
            .await
            .map(Auth)
            .ok_or(ApiError(CoreError::Unauthorized))
    }
}

/// Optional identity for read endpoints; never rejects.
pub struct MaybeAuth(pub Option<Session>);

impl FromRequestParts<AppState> for MaybeAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(resolve_session(parts, state).await))
    }
}

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden | CoreError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            CoreError::NotFound => StatusCode::NOT_FOUND,
            CoreError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            CoreError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            CoreError::SaveFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let mut response =
            (status, Json(json!({ "error": self.0.to_string() }))).into_response();
        if let CoreError::RateLimited {
            limit,
            remaining,
            reset_in,
        } = &self.0
        {
            let headers = response.headers_mut();
            insert_rate_headers(headers, *limit, *remaining, *reset_in);
            if let Ok(value) = HeaderValue::from_str(&reset_in.to_string()) {
                headers.insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

fn store_failed(err: anyhow::Error) -> ApiError {
    ApiError(CoreError::SaveFailed(err.to_string()))
}

fn insert_rate_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_in: u64) {
    for (name, value) in [
        (X_RATELIMIT_LIMIT, limit.to_string()),
        (X_RATELIMIT_REMAINING, remaining.to_string()),
        (X_RATELIMIT_RESET, reset_in.to_string()),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

/// Header set for successful mutations, read via `peek` so the request is not
/// counted twice.
fn rate_headers(decision: Decision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_rate_headers(
        &mut headers,
        decision.limit,
        decision.remaining,
        decision.reset_in,
    );
    headers
}

#[derive(Deserialize)]
struct ContentUpdateRequest {
    content: String,
    title: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnloadRequest {
    file_id: String,
    content: String,
    title: Option<String>,
}

#[derive(Serialize)]
struct UnloadResponse {
    success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    skipped: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/files", post(create_file).get(list_files))
        .route("/files/{id}", get(get_file).delete(delete_file))
        .route("/files/{id}/content", put(update_content))
        .route("/files/{id}/settings", put(update_settings))
        .route("/save-on-unload", post(save_on_unload))
        .with_state(state)
}

async fn create_file(
    State(state): State<AppState>,
    Auth(session): Auth,
    Json(input): Json<NewFile>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.service.create_file(Some(&session), input).await?;
    let headers = rate_headers(state.limiter.peek(&session.user_id, ACTION_CREATE_FILE));
    Ok((StatusCode::CREATED, headers, Json(record)))
}

async fn list_files(
    State(state): State<AppState>,
    Auth(session): Auth,
) -> Result<Json<Vec<FileRecord>>, ApiError> {
    let owned = state
        .files
        .find_by_owner(&session.user_id)
        .await
        .map_err(store_failed)?;
    Ok(Json(owned))
}

async fn get_file(
    State(state): State<AppState>,
    MaybeAuth(session): MaybeAuth,
    Path(id): Path<String>,
) -> Result<Json<FileRecord>, ApiError> {
    let id = validate::parse_file_id(&id)?;
    let file = state
        .files
        .find_by_id(&id)
        .await
        .map_err(store_failed)?
        .ok_or(CoreError::NotFound)?;
    let user_id = session.as_ref().map(|s| s.user_id.as_str());
    if !permissions::can_read(user_id, &file) {
        return Err(match session {
            None => CoreError::Unauthorized.into(),
            Some(_) => CoreError::Forbidden.into(),
        });
    }
    Ok(Json(file))
}

async fn update_content(
    State(state): State<AppState>,
    Auth(session): Auth,
    Path(id): Path<String>,
    Json(req): Json<ContentUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .service
        .update_content(Some(&session), &id, &req.content, req.title.as_deref())
        .await?;
    let headers = rate_headers(state.limiter.peek(&session.user_id, ACTION_UPDATE_FILE));
    Ok((headers, Json(record)))
}

async fn update_settings(
    State(state): State<AppState>,
    Auth(session): Auth,
    Path(id): Path<String>,
    Json(update): Json<FileSettingsUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .service
        .update_settings(Some(&session), &id, update)
        .await?;
    let headers = rate_headers(state.limiter.peek(&session.user_id, ACTION_UPDATE_FILE));
    Ok((headers, Json(record)))
}

async fn delete_file(
    State(state): State<AppState>,
    Auth(session): Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.delete_file(Some(&session), &id).await?;
    let headers = rate_headers(state.limiter.peek(&session.user_id, ACTION_DELETE_FILE));
    Ok((StatusCode::NO_CONTENT, headers))
}

async fn save_on_unload(
    State(state): State<AppState>,
    Auth(session): Auth,
    Json(req): Json<UnloadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .service
        .save_on_unload(
            Some(&session),
            &req.file_id,
            &req.content,
            req.title.as_deref(),
        )
        .await?;
    let headers = rate_headers(state.limiter.peek(&session.user_id, ACTION_SAVE_ON_UNLOAD));
    Ok((
        headers,
        Json(UnloadResponse {
            success: true,
            skipped: outcome == UnloadOutcome::Skipped,
        }),
    ))
}
