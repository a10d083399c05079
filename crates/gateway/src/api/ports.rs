//! `GET /api/ports`: serial ports the provider can see.

use axum::extract::State;
use axum::response::Json;

use sl_domain::error::Error;
use sl_serial::PortDescriptor;

use crate::api::error::ApiError;
use crate::state::AppState;

pub async fn list_ports(State(state): State<AppState>) -> Result<Json<Vec<PortDescriptor>>, ApiError> {
    let serial = state.serial.clone();
    let ports = tokio::task::spawn_blocking(move || serial.list_ports())
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;
    Ok(Json(ports))
}
