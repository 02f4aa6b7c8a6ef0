use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use trellis_core::model::WidgetModel;

use crate::host::ElementHandle;

/// How the manifest names a widget module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleSource {
    /// A module url: absolute, or page-relative (`./x`, `/x`).
    Url(String),
    /// The manifest embedded the module source verbatim.
    Inline(String),
}

impl ModuleSource {
    /// Strings starting with `http`, `./` or `/` are urls; anything else is
    /// treated as inline source.
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with("http") || raw.starts_with("./") || raw.starts_with('/') {
            Self::Url(raw.to_owned())
        } else {
            Self::Inline(raw.to_owned())
        }
    }
}

/// Everything a module receives at render time.
pub struct RenderContext {
    pub model: Arc<WidgetModel>,
    pub element: ElementHandle,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),
}

/// A loaded widget implementation.
#[async_trait]
pub trait WidgetModule: Send + Sync {
    async fn render(&self, ctx: RenderContext) -> Result<(), RenderError>;
}

/// Resolves a module source to an implementation. `None` means no module is
/// available for this widget; the bootstrapper skips it and moves on.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, widget_id: &str, source: &ModuleSource)
        -> Option<Arc<dyn WidgetModule>>;
}

pub type ModuleFactory = Arc<dyn Fn() -> Arc<dyn WidgetModule> + Send + Sync>;

/// Url-only loader backed by explicit registrations. Inline sources are
/// refused; [`InlineLoader`] is the permissive wrapper.
#[derive(Default)]
pub struct RegistryLoader {
    factories: RwLock<HashMap<String, ModuleFactory>>,
}

impl RegistryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, module_url: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn WidgetModule> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(module_url.into(), Arc::new(factory));
    }
}

#[async_trait]
impl ModuleLoader for RegistryLoader {
    async fn load(
        &self,
        widget_id: &str,
        source: &ModuleSource,
    ) -> Option<Arc<dyn WidgetModule>> {
        match source {
            ModuleSource::Url(url) => {
                let module = self.factories.read().get(url).map(|factory| factory());
                if module.is_none() {
                    tracing::debug!(
                        widget_id = %widget_id,
                        module_url = %url,
                        "no module registered for url"
                    );
                }
                module
            }
            ModuleSource::Inline(_) => {
                tracing::debug!(widget_id = %widget_id, "inline module source refused");
                None
            }
        }
    }
}

/// Turns inline module source into an implementation, or `None` when the
/// source cannot be interpreted.
pub type InlineCompiler = Arc<dyn Fn(&str) -> Option<Arc<dyn WidgetModule>> + Send + Sync>;

/// Wrapper that also accepts inline module sources, for parity with servers
/// that embed code in the manifest. Every inline load is logged at warn
/// level; url sources delegate to the inner loader.
pub struct InlineLoader {
    inner: Arc<dyn ModuleLoader>,
    compile: InlineCompiler,
}

impl InlineLoader {
    pub fn new(inner: Arc<dyn ModuleLoader>, compile: InlineCompiler) -> Self {
        Self { inner, compile }
    }
}

#[async_trait]
impl ModuleLoader for InlineLoader {
    async fn load(
        &self,
        widget_id: &str,
        source: &ModuleSource,
    ) -> Option<Arc<dyn WidgetModule>> {
        match source {
            ModuleSource::Inline(src) => {
                tracing::warn!(
                    widget_id = %widget_id,
                    "executing inline widget source from the manifest"
                );
                (self.compile)(src)
            }
            url => self.inner.load(widget_id, url).await,
        }
    }
}
