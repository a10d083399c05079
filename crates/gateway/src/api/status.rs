//! `GET /api/status`: what is open right now.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use sl_sessions::SessionStatus;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub active_ports: Vec<String>,
    pub sessions: Vec<SessionStatus>,
    pub connected: bool,
    /// The only session's log, or the default name.
    pub filename: String,
    pub default_filename: String,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.sessions.snapshot();
    Json(StatusResponse {
        active_ports: snapshot.active_ports(),
        connected: snapshot.is_connected(),
        filename: snapshot.current_log_name().to_owned(),
        default_filename: snapshot.default_log_name.clone(),
        sessions: snapshot.sessions,
    })
}
