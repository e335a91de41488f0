use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::{error, warn};

use paste_types::api::{CreatePasteRequest, HealthResponse, PasteResponse};

use crate::clock::ReferenceTime;
use crate::error::{ApiError, json_error};
use crate::render::{self, NotFoundView, PasteView};
use crate::service::PasteService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub pastes: PasteService,
    /// Base for retrieval URLs. When unset it is derived from the request.
    pub public_url: Option<String>,
    /// Honor the reference-time header. Never enable in production.
    pub test_mode: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/healthz", get(health))
        .route("/api/pastes", post(create_paste))
        .route("/api/pastes/{id}", get(get_paste))
        .route("/p/{id}", get(view_paste))
        .with_state(state)
}

fn base_url(headers: &HeaderMap, public_url: Option<&str>) -> String {
    if let Some(url) = public_url {
        return url.trim_end_matches('/').to_string();
    }

    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", proto, host)
}

/// GET /api/healthz — 200 iff the store answers a trivial query.
pub async fn health(State(state): State<AppState>) -> Response {
    match state.pastes.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                ok: true,
                error: None,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    ok: false,
                    error: Some("Database connection failed".into()),
                }),
            )
                .into_response()
        }
    }
}

/// POST /api/pastes — malformed JSON is a validation failure like any other.
pub async fn create_paste(
    State(state): State<AppState>,
    ReferenceTime(now): ReferenceTime,
    headers: HeaderMap,
    body: Result<Json<CreatePasteRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!("Rejected create body: {}", rejection.body_text());
            return json_error(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let base = base_url(&headers, state.public_url.as_deref());
    match state.pastes.create_paste(req, now, &base).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) if e.is_server_error() => {
            error!("Failed to create paste: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create paste")
        }
        Err(e) => e.into_response(),
    }
}

/// GET /api/pastes/{id} — consumes one view.
pub async fn get_paste(
    State(state): State<AppState>,
    ReferenceTime(now): ReferenceTime,
    Path(id): Path<String>,
) -> Result<Json<PasteResponse>, ApiError> {
    let paste = state.pastes.fetch_paste(&id, now).await?;

    Ok(Json(PasteResponse {
        content: paste.content,
        remaining_views: paste.remaining_views,
        expires_at: paste.expires_at,
    }))
}

/// GET /p/{id} — HTML view; consumes one view exactly like the JSON route.
pub async fn view_paste(
    State(state): State<AppState>,
    ReferenceTime(now): ReferenceTime,
    Path(id): Path<String>,
) -> Response {
    match state.pastes.fetch_paste(&id, now).await {
        Ok(paste) => render::render_template(StatusCode::OK, PasteView::from(paste)),
        Err(ApiError::NotFound) => render::render_template(StatusCode::NOT_FOUND, NotFoundView),
        Err(e) => {
            error!("Failed to render paste: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
