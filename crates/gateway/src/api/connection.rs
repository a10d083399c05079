//! Device connection endpoints.
//!
//! - `POST /api/connect`: open a device and bind it to a log
//! - `POST /api/disconnect`: close a device (idempotent)
//! - `POST /api/filename`: rebind a device's log, or set the default name

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;

use sl_domain::error::Error;
use sl_sessions::CloseOutcome;

use crate::api::body::ApiBody;
use crate::api::error::ApiError;
use crate::api::{log_name_field, required};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Browsers post the baud rate straight from a `<select>`, so both
/// `9600` and `"9600"` are accepted.  Any other shape is kept rather than
/// failing the whole request.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BaudRate {
    Number(u32),
    Text(String),
    Other(serde_json::Value),
}

impl BaudRate {
    /// 0 when unparseable; the registry substitutes its default.
    pub fn value(&self) -> u32 {
        match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().unwrap_or(0),
            Self::Other(_) => 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectBody {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub baud_rate: Option<BaudRate>,
    #[serde(default)]
    pub log_name: Option<String>,
    /// Older clients send the log name as `filename`.
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DisconnectBody {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilenameBody {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub log_name: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/connect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn connect(
    State(state): State<AppState>,
    ApiBody(body): ApiBody<ConnectBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = required(body.path, "path")?;
    let log_name = log_name_field(body.log_name, body.filename)?;
    let baud_rate = body.baud_rate.as_ref().map(BaudRate::value).unwrap_or(0);

    let session = state.sessions.open(&path, baud_rate, &log_name).await?;

    Ok(Json(json!({
        "message": format!("Connected to {}", session.device_id),
        "port": session.device_id,
        "filename": session.log_name,
        "baudRate": session.baud_rate,
        "sessionId": session.session_id,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/disconnect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Always 200 once a path is given: the session is gone afterwards even
/// when the device reported a fault while closing.
pub async fn disconnect(
    State(state): State<AppState>,
    ApiBody(body): ApiBody<DisconnectBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = required(body.path, "path")?;

    let message = match state.sessions.close(&path).await {
        Ok(CloseOutcome::Closed) => "Disconnected".to_owned(),
        Ok(CloseOutcome::NotOpen) => "No active connection or already disconnected".to_owned(),
        Err(e @ Error::Close { .. }) => {
            tracing::warn!(device = %path, error = %e, "disconnect completed with close fault");
            format!("Disconnected with error: {e}")
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(json!({ "message": message })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/filename
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// With a `path`, future lines from that device go to the new log.
/// Without one, the process-wide default name changes.
pub async fn set_filename(
    State(state): State<AppState>,
    ApiBody(body): ApiBody<FilenameBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let log_name = log_name_field(body.log_name, body.filename)?;

    match body.path.map(|p| p.trim().to_owned()).filter(|p| !p.is_empty()) {
        Some(path) => {
            let name = state.sessions.set_log_name(&path, &log_name).await?;
            Ok(Json(json!({
                "message": format!("Logging {path} to {name}"),
                "port": path,
                "filename": name.as_str(),
            })))
        }
        None => {
            let name = state.sessions.set_default_log_name(&log_name)?;
            Ok(Json(json!({
                "message": format!("Default filename set to {name}"),
                "filename": name.as_str(),
            })))
        }
    }
}
