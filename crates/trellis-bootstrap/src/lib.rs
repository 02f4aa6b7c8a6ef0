pub mod bootstrap;
pub mod fetch;
pub mod host;
pub mod loader;
pub mod session;

pub use bootstrap::{
    BootstrapConfig, BootstrapOutcome, BootstrapReport, WidgetBootstrapper,
};
pub use fetch::{BootstrapError, ManifestClient};
pub use host::{ElementHandle, HeadlessPage, HostPage};
pub use loader::{
    InlineLoader, ModuleLoader, ModuleSource, RegistryLoader, RenderContext, RenderError,
    WidgetModule,
};
pub use session::{MemorySessionStore, SessionStore};
