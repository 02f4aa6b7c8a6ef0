use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use trellis_core::ids::{SessionId, WidgetId};
use trellis_core::model::WidgetModel;
use trellis_sync::chrome::ConnectionChrome;
use trellis_sync::connection::{ConnectionConfig, ConnectionManager, SyncHandle};
use trellis_sync::registry::ModelRegistry;
use trellis_sync::transport::{ws_base_url, Transport};
use trellis_telemetry::TelemetryGuard;

use crate::fetch::{BootstrapError, ManifestClient};
use crate::host::HostPage;
use crate::loader::{ModuleLoader, ModuleSource, RenderContext};
use crate::session::SessionStore;

/// Knobs for one bootstrap run.
#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    /// HTTP base of the widget server; the WebSocket url derives from it.
    pub server_url: String,
    /// Keep the splash up at least this long, measured from the start of
    /// the manifest request.
    pub min_splash: Duration,
    /// Wrap each widget container in an isolation boundary before render.
    pub isolate_widgets: bool,
    pub connection: ConnectionConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            min_splash: Duration::from_secs(1),
            isolate_widgets: false,
            connection: ConnectionConfig::default(),
        }
    }
}

/// Readiness counters for one run. Every manifest widget lands in exactly
/// one bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub total: usize,
    pub rendered: usize,
    pub missing_container: usize,
    pub module_unavailable: usize,
    pub render_failed: usize,
}

impl BootstrapReport {
    pub fn done(&self) -> usize {
        self.rendered + self.missing_container + self.module_unavailable + self.render_failed
    }

    pub fn is_complete(&self) -> bool {
        self.done() == self.total
    }
}

/// A finished bootstrap: the counters plus the live connection.
pub struct BootstrapOutcome {
    pub report: BootstrapReport,
    pub manager: ConnectionManager,
    pub handle: SyncHandle,
    pub registry: Arc<ModelRegistry>,
}

/// Drives the page bootstrap end to end: manifest fetch, connection spawn,
/// per-widget load and render, splash dismissal.
pub struct WidgetBootstrapper {
    config: BootstrapConfig,
    manifests: ManifestClient,
    sessions: Arc<dyn SessionStore>,
    loader: Arc<dyn ModuleLoader>,
    host: Arc<dyn HostPage>,
    chrome: Arc<dyn ConnectionChrome>,
    transport: Arc<dyn Transport>,
    telemetry: Option<Arc<TelemetryGuard>>,
}

impl WidgetBootstrapper {
    pub fn new(
        config: BootstrapConfig,
        sessions: Arc<dyn SessionStore>,
        loader: Arc<dyn ModuleLoader>,
        host: Arc<dyn HostPage>,
        chrome: Arc<dyn ConnectionChrome>,
        transport: Arc<dyn Transport>,
        telemetry: Option<Arc<TelemetryGuard>>,
    ) -> Self {
        let manifests = ManifestClient::new(config.server_url.clone());
        Self {
            config,
            manifests,
            sessions,
            loader,
            host,
            chrome,
            transport,
            telemetry,
        }
    }

    /// Run the sequence once. Widgets are processed sequentially and failure
    /// is isolated per widget; only a manifest fetch failure aborts the run.
    pub async fn run(&self) -> Result<BootstrapOutcome, BootstrapError> {
        let started = Instant::now();
        self.host.show_splash();

        let stored = self.sessions.load();
        let manifest = self.manifests.fetch_manifest(stored.as_deref()).await?;
        self.sessions.store(&manifest.session_id);
        info!(
            session_id = %manifest.session_id,
            widgets = manifest.widgets.len(),
            "widget manifest received"
        );

        if let Some(level) = manifest.log_level {
            if let Some(telemetry) = &self.telemetry {
                telemetry.apply_log_level(level);
            }
        }

        let metrics = self.telemetry.as_ref().and_then(|t| t.metrics().cloned());
        let registry = Arc::new(ModelRegistry::new());

        let mut connection = self.config.connection.clone();
        connection.server_url = ws_base_url(&self.config.server_url);
        let manager = ConnectionManager::spawn(
            connection,
            SessionId::from_raw(manifest.session_id.clone()),
            Arc::clone(&self.transport),
            Arc::clone(&registry),
            Arc::clone(&self.chrome),
            metrics.clone(),
        );
        let handle = manager.handle();

        let mut report = BootstrapReport {
            total: manifest.widgets.len(),
            ..Default::default()
        };

        // Manifest order is a hash map; render in id order so runs are
        // reproducible.
        let mut widget_ids: Vec<&String> = manifest.widgets.keys().collect();
        widget_ids.sort();

        for widget_id in widget_ids {
            let widget = &manifest.widgets[widget_id];

            let Some(element) = self.host.container(widget_id) else {
                debug!(widget_id = %widget_id, "no container on the page, skipping");
                report.missing_container += 1;
                continue;
            };
            let element = if self.config.isolate_widgets {
                self.host.wrap_isolated(&element)
            } else {
                element
            };

            if let Some(css) = &widget.css {
                self.host.inject_style(widget_id, css);
            }

            let source = ModuleSource::classify(&widget.module_url);
            let Some(module) = self.loader.load(widget_id, &source).await else {
                warn!(
                    widget_id = %widget_id,
                    module_url = %widget.module_url,
                    "widget module unavailable, skipping"
                );
                report.module_unavailable += 1;
                continue;
            };

            let model = Arc::new(WidgetModel::new(WidgetId::new(widget_id.as_str())));
            handle.register(Arc::clone(&model));
            for (key, value) in &widget.defaults {
                model.seed_default(key, value);
            }

            let render_started = Instant::now();
            match module.render(RenderContext { model, element }).await {
                Ok(()) => {
                    report.rendered += 1;
                    if let Some(m) = &metrics {
                        m.histogram_observe(
                            "bootstrap.render.duration_ms",
                            &[("widget_id", widget_id.as_str())],
                            render_started.elapsed().as_secs_f64() * 1000.0,
                        );
                    }
                    debug!(widget_id = %widget_id, "widget rendered");
                }
                Err(e) => {
                    error!(widget_id = %widget_id, error = %e, "widget render failed");
                    report.render_failed += 1;
                }
            }
        }

        let elapsed = started.elapsed();
        if elapsed < self.config.min_splash {
            tokio::time::sleep(self.config.min_splash - elapsed).await;
        }
        self.host.dismiss_splash();
        info!(
            rendered = report.rendered,
            total = report.total,
            "bootstrap complete"
        );

        Ok(BootstrapOutcome {
            report,
            manager,
            handle,
            registry,
        })
    }
}
