//! Logging and span export for the control loop.
//!
//! The engine opens one span per arbitration cycle and one per chain
//! cancellation; everything else is plain events inside them:
//!
//! | Span | Opened by | Fields |
//! |---|---|---|
//! | `tick` | `Engine::tick` | `tick` (cycle counter of the sensor frame) |
//! | `cancel_chain` | `BehaviorTable::cancel_chain` | `root` |
//!
//! At the default `info` level only start-up, emergency and stall events are
//! printed.  `RUST_LOG=behave_kernel=debug` shows every delegation, exit and
//! entry; the cycle spans are what an OTLP collector receives.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `BEHAVE_LOG_FORMAT=json` | Newline-delimited JSON instead of compact lines. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | Export spans over OTLP/HTTP to this collector. |
//!
//! # Example
//!
//! ```rust,no_run
//! // Hold the guard until the process exits so pending spans are flushed.
//! let _guard = behave_runtime::telemetry::init_tracing("behave");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Instrumentation scope name attached to exported spans.
pub const TRACER_NAME: &str = "behave";

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Console output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Telemetry settings, normally read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` does not parse.
    pub filter: String,
    pub format: LogFormat,
    /// OTLP/HTTP collector; `None` disables span export.
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Compact,
            otlp_endpoint: None,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let format = match get("BEHAVE_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };
        Self {
            filter: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            format,
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Install the global subscriber from the environment.  See [`init_with`].
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    init_with(service_name, &TelemetryConfig::from_env())
}

/// Install the global subscriber described by `config`.
///
/// A second call in the same process leaves the first subscriber in place.
/// Keep the returned [`TracerProviderGuard`] alive until the process exits.
pub fn init_with(service_name: &str, config: &TelemetryConfig) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let provider = config
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| build_provider(service_name, endpoint));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if let Some(p) = &provider {
        layers.push(
            tracing_opentelemetry::layer()
                .with_tracer(p.tracer(TRACER_NAME))
                .boxed(),
        );
    }
    layers.push(match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
    });

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }

    TracerProviderGuard(provider)
}

// ─────────────────────────────────────────────────────────────────────────────
// RAII guard
// ─────────────────────────────────────────────────────────────────────────────

/// Flushes and shuts down the span exporter when dropped.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// Whether spans are being exported.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[behave] span exporter shutdown error: {e}");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

/// `None` when the exporter cannot be built; console logging still works.
fn build_provider(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[behave] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // The CLI starts its tokio runtime later; a batch exporter would
            // need one here.
            .with_simple_exporter(exporter)
            .build(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_compact_info_without_export() {
        let cfg = TelemetryConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg, TelemetryConfig::default());
    }

    #[test]
    fn reads_format_filter_and_endpoint() {
        let cfg = TelemetryConfig::from_lookup(lookup(&[
            ("BEHAVE_LOG_FORMAT", "json"),
            ("RUST_LOG", "behave_kernel=debug"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4318"),
        ]));
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.filter, "behave_kernel=debug");
        assert_eq!(cfg.otlp_endpoint.as_deref(), Some("http://localhost:4318"));
    }

    #[test]
    fn blank_endpoint_and_unknown_format_are_ignored() {
        let cfg = TelemetryConfig::from_lookup(lookup(&[
            ("BEHAVE_LOG_FORMAT", "yaml"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "  "),
        ]));
        assert_eq!(cfg.format, LogFormat::Compact);
        assert_eq!(cfg.otlp_endpoint, None);
    }

    #[test]
    fn second_init_keeps_running_without_export() {
        let cfg = TelemetryConfig::default();
        let first = init_with("behave-test", &cfg);
        let second = init_with("behave-test", &cfg);
        assert!(!first.is_exporting());
        assert!(!second.is_exporting());
    }
}
