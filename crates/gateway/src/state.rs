use std::sync::Arc;

use sl_domain::config::Config;
use sl_logstore::LogStore;
use sl_serial::SerialProvider;
use sl_sessions::SessionRegistry;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub logs: Arc<LogStore>,
    pub sessions: Arc<SessionRegistry>,
    pub serial: Arc<dyn SerialProvider>,
}
