mod metrics;

pub use metrics::{HistogramSummary, MetricSample, MetricType, MetricsRecorder};

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use trellis_core::manifest::LogLevel;

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "trellis_sync" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit JSON-formatted lines instead of the human-readable format.
    pub json_output: bool,
    /// Whether metrics recording is enabled.
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json_output: false,
            metrics_enabled: true,
        }
    }
}

/// Handle to the installed telemetry stack.
pub struct TelemetryGuard {
    filter_handle: reload::Handle<EnvFilter, Registry>,
    module_levels: Arc<RwLock<Vec<(String, Level)>>>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl TelemetryGuard {
    /// Retune the process-wide filter to a server-supplied log level.
    /// Module overrides from the initial config are preserved.
    pub fn apply_log_level(&self, level: LogLevel) {
        let filter = filter_string(level.as_filter_directive(), &self.module_levels.read());
        match EnvFilter::try_new(&filter) {
            Ok(new_filter) => {
                if let Err(e) = self.filter_handle.reload(new_filter) {
                    tracing::warn!(error = %e, "failed to reload log filter");
                }
            }
            Err(e) => tracing::warn!(filter = %filter, error = %e, "bad log filter directive"),
        }
    }

    /// Change the log level for a specific module at runtime.
    pub fn set_module_level(&self, module: &str, level: Level) {
        let mut levels = self.module_levels.write();
        if let Some(entry) = levels.iter_mut().find(|(m, _)| m == module) {
            entry.1 = level;
        } else {
            levels.push((module.to_string(), level));
        }
    }

    /// Access the metrics recorder for recording and querying.
    pub fn metrics(&self) -> Option<&Arc<MetricsRecorder>> {
        self.metrics.as_ref()
    }
}

/// Initialize the telemetry subsystem. Call once at startup.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let module_levels = Arc::new(RwLock::new(config.module_levels.clone()));

    let default_directive = config.log_level.to_string().to_lowercase();
    let filter_str = filter_string(&default_directive, &config.module_levels);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));
    let (filter_layer, filter_handle) = reload::Layer::new(env_filter);

    let registry = tracing_subscriber::registry().with(filter_layer);
    if config.json_output {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_list(true),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }

    let metrics = if config.metrics_enabled {
        Some(Arc::new(MetricsRecorder::new()))
    } else {
        None
    };

    TelemetryGuard {
        filter_handle,
        module_levels,
        metrics,
    }
}

fn filter_string(default_directive: &str, module_levels: &[(String, Level)]) -> String {
    let mut filter = default_directive.to_owned();
    for (module, level) in module_levels {
        filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_string_default_only() {
        assert_eq!(filter_string("info", &[]), "info");
    }

    #[test]
    fn filter_string_with_module_overrides() {
        let modules = vec![
            ("trellis_sync".to_owned(), Level::DEBUG),
            ("hyper".to_owned(), Level::WARN),
        ];
        assert_eq!(
            filter_string("info", &modules),
            "info,trellis_sync=debug,hyper=warn"
        );
    }

    #[test]
    fn manifest_levels_map_to_valid_directives() {
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
            LogLevel::None,
        ] {
            let filter = filter_string(level.as_filter_directive(), &[]);
            assert!(
                EnvFilter::try_new(&filter).is_ok(),
                "directive {filter:?} rejected"
            );
        }
    }
}
