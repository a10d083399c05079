//! AppState construction shared by `serve` and the integration tests.

use std::sync::Arc;

use anyhow::Context;

use sl_domain::config::{Config, ConfigSeverity, SerialProviderKind};
use sl_logstore::{default_log_name, LogStore};
use sl_serial::{LineOptions, MockSerialProvider, SerialProvider, SystemSerialProvider};
use sl_sessions::{RegistrySettings, SessionRegistry};

use crate::state::AppState;

/// Validate config, open the log store, pick the serial provider and
/// return a fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let serial = build_provider(&config);
    build_app_state_with(config, serial)
}

/// Same as [`build_app_state`] with an externally supplied provider.
pub fn build_app_state_with(
    config: Arc<Config>,
    serial: Arc<dyn SerialProvider>,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    // ── Log store ────────────────────────────────────────────────────
    let logs = Arc::new(
        LogStore::new(&config.logs.dir, &config.logs.extension)
            .with_context(|| format!("opening log dir {}", config.logs.dir.display()))?,
    );

    // ── Session registry ─────────────────────────────────────────────
    let raw_default = config
        .logs
        .default_name
        .clone()
        .unwrap_or_else(|| default_log_name(&chrono::Local::now()));
    let default_name = logs
        .normalize(&raw_default)
        .with_context(|| format!("logs.default_name {raw_default:?}"))?;
    tracing::info!(log_name = %default_name, "default log name");

    let sessions = SessionRegistry::new(
        logs.clone(),
        serial.clone(),
        RegistrySettings {
            default_baud_rate: config.serial.default_baud_rate,
            default_log_name: default_name,
        },
    );

    Ok(AppState {
        config,
        logs,
        sessions,
        serial,
    })
}

pub fn build_provider(config: &Config) -> Arc<dyn SerialProvider> {
    match config.serial.provider {
        SerialProviderKind::System => {
            tracing::info!("serial provider: system");
            Arc::new(SystemSerialProvider::new(LineOptions::from(&config.serial)))
        }
        SerialProviderKind::Mock => {
            tracing::warn!(ports = ?config.serial.mock_ports, "serial provider: mock");
            Arc::new(
                MockSerialProvider::new(config.serial.mock_ports.iter().cloned())
                    .with_capacity(config.serial.channel_capacity),
            )
        }
    }
}
