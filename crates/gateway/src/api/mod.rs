pub mod body;
pub mod connection;
pub mod error;
pub mod logs;
pub mod ports;
pub mod status;

use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

use sl_domain::config::Config;
use sl_domain::error::Error;

use crate::state::AppState;

/// Build the full router.  Unmatched paths fall through to the static
/// asset directory.
pub fn router(config: &Config) -> Router<AppState> {
    Router::new()
        .route("/api/ports", get(ports::list_ports))
        .route("/api/connect", post(connection::connect))
        .route("/api/disconnect", post(connection::disconnect))
        .route("/api/filename", post(connection::set_filename))
        .route("/api/mock", post(logs::mock))
        .route("/api/data", get(logs::data))
        .route("/api/status", get(status::status))
        .route("/:filename", get(logs::serve_file))
        .fallback_service(ServeDir::new(&config.server.static_dir))
}

// ── Request field helpers ─────────────────────────────────────────────

/// Trimmed, non-empty value of a required field.
pub(crate) fn required(value: Option<String>, field: &'static str) -> Result<String, Error> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or(Error::MissingField(field))
}

/// The log name from `logName`, falling back to the legacy `filename` key.
pub(crate) fn log_name_field(
    log_name: Option<String>,
    filename: Option<String>,
) -> Result<String, Error> {
    let value = log_name
        .filter(|v| !v.trim().is_empty())
        .or(filename);
    required(value, "logName")
}
