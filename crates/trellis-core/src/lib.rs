pub mod emitter;
pub mod errors;
pub mod ids;
pub mod manifest;
pub mod model;
pub mod wire;

pub use emitter::{Emitter, SubscriptionId};
pub use errors::SyncError;
pub use ids::{ClientId, SessionId, WidgetId};
pub use manifest::{LogLevel, WidgetConfig, WidgetManifest};
pub use model::{ChangeEvent, ModelTopic, UpdateSink, WidgetModel};
pub use wire::{ClientMessage, ServerMessage};
