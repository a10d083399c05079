//! Tracing setup for the server and the one-shot CLI commands.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use sl_domain::config::ObservabilityConfig;

/// JSON logs on stdout, plus span export when an OTLP endpoint is set.
///
/// Keep the returned provider alive and call [`shutdown`] on exit so
/// buffered spans are flushed.
pub fn init_server(obs: &ObservabilityConfig) -> Option<SdkTracerProvider> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sl_gateway=debug,sl_sessions=debug"));

    let provider = if obs.otlp_enabled() {
        build_provider(obs)
    } else {
        None
    };
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("seriallog")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .with(otel_layer)
        .init();

    if let Some(endpoint) = obs.otlp_endpoint.as_deref().filter(|_| provider.is_some()) {
        tracing::info!(endpoint, sample_rate = obs.sample_rate, "exporting spans over OTLP");
    }
    provider
}

/// Compact stderr output for `ports`, `doctor` and friends.
pub fn init_cli() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

pub fn shutdown(provider: Option<SdkTracerProvider>) {
    let Some(provider) = provider else {
        return;
    };
    if let Err(e) = provider.shutdown() {
        tracing::warn!(error = ?e, "span exporter shutdown failed");
    }
}

/// The subscriber is not installed yet, so failures go to stderr and the
/// server keeps running with logs only.
fn build_provider(obs: &ObservabilityConfig) -> Option<SdkTracerProvider> {
    let endpoint = obs.otlp_endpoint.as_deref()?.trim();
    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("WARNING: OTLP exporter for {endpoint} unavailable ({e}); spans will not be exported");
            return None;
        }
    };

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(obs.service_name.clone())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_sampler(Sampler::TraceIdRatioBased(obs.sample_rate))
            .with_resource(resource)
            .build(),
    )
}
