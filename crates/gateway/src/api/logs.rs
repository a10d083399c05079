//! Log endpoints.
//!
//! - `POST /api/mock`: append a line without a device
//! - `GET  /api/data`: full content of a log (polled by the browser)
//! - `GET  /:filename`: raw log file, or a static asset for other names

use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::api::body::ApiBody;
use crate::api::error::{api_error, ApiError};
use crate::api::{log_name_field, required};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockBody {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub log_name: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    #[serde(default)]
    pub filename: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/mock
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn mock(
    State(state): State<AppState>,
    ApiBody(body): ApiBody<MockBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let data = body
        .data
        .filter(|d| !d.is_empty())
        .ok_or(sl_domain::error::Error::MissingField("data"))?;
    let log_name = log_name_field(body.log_name, body.filename)?;

    let name = state.sessions.inject(&log_name, &data).await?;
    Ok(Json(json!({
        "message": "Mock data logged",
        "filename": name.as_str(),
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/data
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Missing or never-written logs read as empty so clients can start
/// polling before any data arrives.
pub async fn data(
    State(state): State<AppState>,
    Query(query): Query<DataQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Ok(filename) = required(query.filename, "filename") else {
        return Ok(Json(json!({ "content": "" })));
    };
    let content = state.logs.read_all_async(&filename).await?;
    Ok(Json(json!({ "content": content })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /:filename
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn serve_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Response {
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return api_error(StatusCode::BAD_REQUEST, "Invalid filename.");
    }

    let suffix = format!(".{}", state.logs.extension());
    if !filename.ends_with(&suffix) {
        return serve_static(&state, request).await;
    }

    match state.logs.exists_async(&filename).await {
        Ok(true) => {}
        Ok(false) => return api_error(StatusCode::NOT_FOUND, "File not found."),
        Err(e) => return ApiError(e).into_response(),
    }

    match state.logs.read_all_async(&filename).await {
        Ok(content) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            Body::from(content),
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn serve_static(state: &AppState, request: Request) -> Response {
    match ServeDir::new(&state.config.server.static_dir)
        .oneshot(request)
        .await
    {
        Ok(res) => res.into_response(),
        Err(never) => match never {},
    }
}
