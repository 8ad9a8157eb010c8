//! Tracing and OpenTelemetry initialisation.
//!
//! Call [`init_tracing`] once at process startup.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`). When set, spans from every loop are exported over OTLP/HTTP. |
//! | `RUST_LOG` | Log filter (default [`DEFAULT_FILTER`]). |
//! | `TELEOP_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Example
//!
//! ```rust,no_run
//! // Hold the guard for the entire lifetime of the process.
//! let _guard = teleop_runtime::telemetry::init_tracing("teleop");
//! ```

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Engine logs at `info`; the HTTP stack under the MJPEG client only reports
/// warnings, since it logs every connection at `debug`/`info`.
pub const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn,hyper_util=warn";

/// Install the global `tracing` subscriber, with an OTLP exporter when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set and a plain console formatter
/// otherwise.
///
/// The returned [`TracerProviderGuard`] must be held until exit; dropping it
/// flushes pending spans.  Calling this twice in one process is a no-op for
/// the second call's subscriber.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let env_filter = filter_from(std::env::var("RUST_LOG").ok());
    let use_json = std::env::var("TELEOP_LOG_FORMAT").as_deref() == Ok("json");

    let provider = build_provider(service_name, std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok());
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("teleop")));

    let registry = tracing_subscriber::registry().with(env_filter).with(otel_layer);
    let installed = if use_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_thread_names(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_thread_names(true))
            .try_init()
    };
    if let Err(e) = installed {
        eprintln!("[teleop] tracing subscriber already installed: {e}");
    }

    TracerProviderGuard(provider)
}

/// RAII guard that shuts down the OTel [`SdkTracerProvider`] on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// `true` when spans are being exported.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[teleop] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

/// `RUST_LOG` when it parses, [`DEFAULT_FILTER`] otherwise.
fn filter_from(directives: Option<String>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| match EnvFilter::try_new(&d) {
            Ok(filter) => Some(filter),
            Err(e) => {
                eprintln!("[teleop] ignoring RUST_LOG {d:?}: {e}");
                None
            }
        })
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Build an [`SdkTracerProvider`] exporting to `endpoint`.
///
/// Returns `None` without an endpoint or when the exporter cannot be built;
/// the caller then falls back to console output only.
fn build_provider(service_name: &str, endpoint: Option<String>) -> Option<SdkTracerProvider> {
    let endpoint = endpoint.filter(|e| !e.trim().is_empty())?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[teleop] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();

    // The loops run on plain OS threads with no async runtime, so spans are
    // exported synchronously.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}
