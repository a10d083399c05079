//! The `serve` command: middleware stack, listener and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use sl_domain::config::{Config, CorsConfig};

use crate::{api, bootstrap, telemetry};

pub async fn run(
    config: Arc<Config>,
    tracer_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "SerialLog starting");

    let state = bootstrap::build_app_state(config.clone())?;

    let max_concurrent = config.server.max_concurrent_requests;
    let governor = match &config.server.rate_limit {
        Some(rl) => {
            let limits = GovernorConfigBuilder::default()
                .per_second(rl.requests_per_second)
                .burst_size(rl.burst_size)
                .finish()
                .context("server.rate_limit: requests_per_second and burst_size must be > 0")?;
            tracing::info!(
                requests_per_second = rl.requests_per_second,
                burst_size = rl.burst_size,
                "per-IP rate limiting enabled"
            );
            Some(GovernorLayer {
                config: Arc::new(limits),
            })
        }
        None => None,
    };

    if !config.server.static_dir.exists() {
        tracing::info!(
            dir = %config.server.static_dir.display(),
            "static directory not found; only the API is served"
        );
    }

    let router = api::router(&config)
        .layer(build_cors_layer(&config.server.cors))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
        .layer(TraceLayer::new_for_http());
    let app = match governor {
        Some(layer) => router.layer(layer).with_state(state.clone()),
        None => router.with_state(state.clone()),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, max_concurrent, "SerialLog listening");

    // The governor keys on the peer address, which needs ConnectInfo.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("axum server error")?;

    let closed = state.sessions.close_all().await;
    tracing::info!(closed, "server stopped, devices released");

    telemetry::shutdown(tracer_provider);
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "SIGTERM handler unavailable"),
        }
    }

    let _ = ctrl_c.await;
    tracing::info!("received SIGINT, shutting down");
}

// ── CORS ─────────────────────────────────────────────────────────────

/// Origins may end in `:*` to match any port on that host
/// (e.g. `http://localhost:*`).  A lone `"*"` allows every origin.
pub fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if cors.allowed_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured with wildcard \"*\"; all origins allowed");
        return base.allow_origin(Any);
    }

    let rules = OriginRules::new(&cors.allowed_origins);
    if rules.port_wildcards.is_empty() {
        return base.allow_origin(AllowOrigin::list(rules.exact));
    }
    base.allow_origin(AllowOrigin::predicate(move |origin, _| {
        rules.allows(origin)
    }))
}

struct OriginRules {
    exact: Vec<HeaderValue>,
    /// `scheme://host:` prefixes that accept any numeric port.
    port_wildcards: Vec<String>,
}

impl OriginRules {
    fn new(origins: &[String]) -> Self {
        let mut rules = Self {
            exact: Vec::new(),
            port_wildcards: Vec::new(),
        };
        for origin in origins {
            if let Some(prefix) = origin.strip_suffix('*').filter(|p| p.ends_with(':')) {
                rules.port_wildcards.push(prefix.to_owned());
            } else if let Ok(value) = origin.parse::<HeaderValue>() {
                rules.exact.push(value);
            } else {
                tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
            }
        }
        rules
    }

    fn allows(&self, origin: &HeaderValue) -> bool {
        if self.exact.iter().any(|e| e == origin) {
            return true;
        }
        let Ok(origin) = origin.to_str() else {
            return false;
        };
        self.port_wildcards.iter().any(|prefix| {
            origin
                .strip_prefix(prefix.as_str())
                .is_some_and(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
        })
    }
}
