use std::sync::Arc;

use dashmap::DashMap;

use trellis_core::ids::WidgetId;
use trellis_core::model::WidgetModel;

/// Registry of live widget models, shared between the bootstrapper (writer)
/// and the inbound dispatcher (reader).
#[derive(Default)]
pub struct ModelRegistry {
    models: DashMap<WidgetId, Arc<WidgetModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its widget id. Re-registering an id replaces
    /// the mapping; the returned stale model no longer receives dispatches.
    pub fn insert(&self, model: Arc<WidgetModel>) -> Option<Arc<WidgetModel>> {
        self.models.insert(model.id().clone(), model)
    }

    pub fn get(&self, id: &WidgetId) -> Option<Arc<WidgetModel>> {
        self.models.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &WidgetId) -> Option<Arc<WidgetModel>> {
        self.models.remove(id).map(|(_, model)| model)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn widget_ids(&self) -> Vec<WidgetId> {
        self.models.iter().map(|entry| entry.key().clone()).collect()
    }
}
