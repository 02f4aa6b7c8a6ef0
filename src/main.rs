use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tracing::Level;

use trellis_bootstrap::{
    BootstrapConfig, HeadlessPage, MemorySessionStore, ModuleLoader, ModuleSource,
    RenderContext, RenderError, WidgetBootstrapper, WidgetModule,
};
use trellis_core::model::ModelTopic;
use trellis_sync::{ConnectionConfig, LoggingChrome, WsTransport};
use trellis_telemetry::{init_telemetry, TelemetryConfig};

/// Headless inspector for trellis widget servers: bootstraps every widget
/// the server advertises and mirrors state changes to the log.
#[derive(Parser)]
#[command(name = "trellis", version)]
struct Cli {
    /// HTTP base url of the widget server.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Default log level until the manifest overrides it.
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    /// Skip the widget-state resync request on (re)connect.
    #[arg(long)]
    no_resync: bool,

    /// Minimum splash display time in milliseconds.
    #[arg(long, default_value_t = 1000)]
    min_splash_ms: u64,

    /// Wrap widget containers in an isolation boundary.
    #[arg(long)]
    isolate: bool,
}

/// Module that mounts into the log: announces the mount, then mirrors every
/// property change.
struct LoggingModule;

#[async_trait]
impl WidgetModule for LoggingModule {
    async fn render(&self, ctx: RenderContext) -> Result<(), RenderError> {
        let widget_id = ctx.model.id().clone();
        tracing::info!(
            widget_id = %widget_id,
            element = ctx.element.selector(),
            "widget mounted"
        );
        ctx.model.on(ModelTopic::AnyChange, move |event| {
            tracing::info!(
                widget_id = %widget_id,
                key = %event.key,
                value = %event.value,
                "property changed"
            );
        });
        Ok(())
    }
}

/// Loader that gives every widget a [`LoggingModule`], whatever its source.
struct LoggingModuleLoader;

#[async_trait]
impl ModuleLoader for LoggingModuleLoader {
    async fn load(
        &self,
        _widget_id: &str,
        _source: &ModuleSource,
    ) -> Option<Arc<dyn WidgetModule>> {
        Some(Arc::new(LoggingModule))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry = Arc::new(init_telemetry(TelemetryConfig {
        log_level: cli.log_level,
        json_output: cli.json_logs,
        ..TelemetryConfig::default()
    }));

    tracing::info!(server = %cli.server, "starting trellis inspector");

    let mut connection = ConnectionConfig::default();
    connection.resync_on_open = !cli.no_resync;
    let config = BootstrapConfig {
        server_url: cli.server.clone(),
        min_splash: Duration::from_millis(cli.min_splash_ms),
        isolate_widgets: cli.isolate,
        connection,
    };

    let bootstrapper = WidgetBootstrapper::new(
        config,
        Arc::new(MemorySessionStore::new()),
        Arc::new(LoggingModuleLoader),
        Arc::new(HeadlessPage::new()),
        Arc::new(LoggingChrome),
        Arc::new(WsTransport),
        Some(Arc::clone(&telemetry)),
    );

    let outcome = bootstrapper.run().await?;
    tracing::info!(
        rendered = outcome.report.rendered,
        total = outcome.report.total,
        "page ready, mirroring server state (ctrl-c to exit)"
    );

    let mut states = outcome.handle.state_changes();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
        }
        _ = states.wait_for(|state| state.is_terminal()) => {
            tracing::warn!(state = outcome.handle.state().name(), "connection ended");
        }
    }
    outcome.manager.shutdown().await;

    if let Some(metrics) = telemetry.metrics() {
        for sample in metrics.snapshot() {
            tracing::info!(
                metric = %sample.name,
                value = sample.value,
                labels = sample.labels.as_deref().unwrap_or("{}"),
                "final metric"
            );
        }
    }

    Ok(())
}
