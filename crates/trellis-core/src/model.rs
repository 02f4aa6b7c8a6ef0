use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::emitter::{Emitter, SubscriptionId};
use crate::ids::WidgetId;

/// Topics a widget model emits on.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum ModelTopic {
    /// A specific property changed (local or remote).
    Change(String),
    /// Any property changed.
    AnyChange,
    /// A server-originated update was applied.
    Update,
}

/// Payload delivered to model listeners.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub key: String,
    pub value: Value,
}

/// Outbound seam: where unsuppressed property changes go.
///
/// The sync layer installs an implementation when the model is registered
/// with a session; until then changes stay local.
pub trait UpdateSink: Send + Sync {
    fn send_update(&self, widget_id: &WidgetId, property: &str, value: &Value);
}

/// Reactive key/value store backing one widget.
///
/// Listeners fire synchronously, in registration order, before `set`
/// returns. Server-originated updates are applied through [`apply_remote`],
/// which suppresses the outbound echo.
///
/// [`apply_remote`]: WidgetModel::apply_remote
pub struct WidgetModel {
    id: WidgetId,
    properties: RwLock<HashMap<String, Value>>,
    emitter: Emitter<ModelTopic, ChangeEvent>,
    suppress_outbound: AtomicBool,
    sink: RwLock<Option<Arc<dyn UpdateSink>>>,
}

impl WidgetModel {
    pub fn new(id: WidgetId) -> Self {
        Self {
            id,
            properties: RwLock::new(HashMap::new()),
            emitter: Emitter::new(),
            suppress_outbound: AtomicBool::new(false),
            sink: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &WidgetId {
        &self.id
    }

    /// Install the outbound sink. Called by the sync layer at registration.
    pub fn attach_sink(&self, sink: Arc<dyn UpdateSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Store a value and notify listeners; propagate to the server.
    /// Unknown keys are created. Never fails.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.set_inner(key.into(), value, false);
    }

    /// Store a value and notify listeners without propagating to the server.
    pub fn set_suppressed(&self, key: impl Into<String>, value: Value) {
        self.set_inner(key.into(), value, true);
    }

    fn set_inner(&self, key: String, value: Value, suppress: bool) {
        self.properties.write().insert(key.clone(), value.clone());

        let event = ChangeEvent {
            key: key.clone(),
            value: value.clone(),
        };
        self.emitter.emit(&ModelTopic::Change(key.clone()), &event);
        self.emitter.emit(&ModelTopic::AnyChange, &event);

        if suppress || self.suppress_outbound.load(Ordering::SeqCst) {
            return;
        }
        if let Some(sink) = self.sink.read().as_ref() {
            sink.send_update(&self.id, &key, &value);
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.properties.read().get(key).cloned()
    }

    /// Apply a server-originated update: value stored, listeners fire, no
    /// echo back to the server. Fires `Update` after the change topics.
    pub fn apply_remote(&self, property: impl Into<String>, value: Value) {
        let property = property.into();
        self.suppress_outbound.store(true, Ordering::SeqCst);
        let _guard = SuppressGuard(&self.suppress_outbound);
        self.set_inner(property.clone(), value.clone(), true);
        self.emitter.emit(
            &ModelTopic::Update,
            &ChangeEvent {
                key: property,
                value,
            },
        );
    }

    /// Seed a default value: only when the key is unset, and never
    /// propagated to the server.
    pub fn seed_default(&self, key: &str, value: &Value) -> bool {
        if self.properties.read().contains_key(key) {
            return false;
        }
        self.set_inner(key.to_owned(), value.clone(), true);
        true
    }

    pub fn on<F>(&self, topic: ModelTopic, handler: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.emitter.on(topic, handler)
    }

    pub fn off_subscription(&self, id: SubscriptionId) -> bool {
        self.emitter.off(id)
    }

    /// Remove every handler for one topic.
    pub fn off(&self, topic: &ModelTopic) -> usize {
        self.emitter.off_topic(topic)
    }

    /// Remove every handler for every topic.
    pub fn off_all(&self) {
        self.emitter.off_all();
    }

    /// Invoke handlers for a topic directly. No-op when none registered.
    pub fn trigger(&self, topic: &ModelTopic, event: &ChangeEvent) -> usize {
        self.emitter.emit(topic, event)
    }

    /// Reserved hook; persistence is server-side today.
    pub fn save(&self) {}
}

struct SuppressGuard<'a>(&'a AtomicBool);

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(WidgetId, String, Value)>>,
    }

    impl UpdateSink for RecordingSink {
        fn send_update(&self, widget_id: &WidgetId, property: &str, value: &Value) {
            self.sent
                .lock()
                .push((widget_id.clone(), property.to_owned(), value.clone()));
        }
    }

    fn model_with_sink() -> (WidgetModel, Arc<RecordingSink>) {
        let model = WidgetModel::new(WidgetId::new("w1"));
        let sink = Arc::new(RecordingSink::default());
        model.attach_sink(sink.clone());
        (model, sink)
    }

    #[test]
    fn set_then_get() {
        let model = WidgetModel::new(WidgetId::new("w1"));
        model.set("count", serde_json::json!(3));
        assert_eq!(model.get("count"), Some(serde_json::json!(3)));
        assert_eq!(model.get("missing"), None);
    }

    #[test]
    fn set_fires_change_and_any_change_once() {
        let model = WidgetModel::new(WidgetId::new("w1"));
        let changes = Arc::new(Mutex::new(Vec::new()));
        let any = Arc::new(Mutex::new(Vec::new()));

        let c = Arc::clone(&changes);
        model.on(ModelTopic::Change("count".into()), move |e| {
            c.lock().push(e.value.clone());
        });
        let a = Arc::clone(&any);
        model.on(ModelTopic::AnyChange, move |e| {
            a.lock().push((e.key.clone(), e.value.clone()));
        });

        model.set("count", serde_json::json!(1));

        assert_eq!(*changes.lock(), vec![serde_json::json!(1)]);
        assert_eq!(*any.lock(), vec![("count".to_owned(), serde_json::json!(1))]);
    }

    #[test]
    fn one_outbound_update_per_set_final_value_wins() {
        let (model, sink) = model_with_sink();
        model.set("count", serde_json::json!(1));
        model.set("count", serde_json::json!(2));

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1, "count");
        assert_eq!(sent[1].2, serde_json::json!(2));
        drop(sent);
        assert_eq!(model.get("count"), Some(serde_json::json!(2)));
    }

    #[test]
    fn suppressed_set_fires_listeners_but_never_sends() {
        let (model, sink) = model_with_sink();
        let fired = Arc::new(Mutex::new(0));
        let f = Arc::clone(&fired);
        model.on(ModelTopic::Change("x".into()), move |_| *f.lock() += 1);

        model.set_suppressed("x", serde_json::json!("quiet"));

        assert_eq!(*fired.lock(), 1);
        assert!(sink.sent.lock().is_empty());
        assert_eq!(model.get("x"), Some(serde_json::json!("quiet")));
    }

    #[test]
    fn apply_remote_has_no_echo_and_fires_update() {
        let (model, sink) = model_with_sink();
        let updates = Arc::new(Mutex::new(Vec::new()));
        let u = Arc::clone(&updates);
        model.on(ModelTopic::Update, move |e| {
            u.lock().push((e.key.clone(), e.value.clone()));
        });

        model.apply_remote("label", serde_json::json!("from server"));

        assert!(sink.sent.lock().is_empty(), "remote update must not echo");
        assert_eq!(model.get("label"), Some(serde_json::json!("from server")));
        assert_eq!(
            *updates.lock(),
            vec![("label".to_owned(), serde_json::json!("from server"))]
        );
    }

    #[test]
    fn set_after_apply_remote_propagates_again() {
        let (model, sink) = model_with_sink();
        model.apply_remote("x", serde_json::json!(1));
        model.set("x", serde_json::json!(2));
        assert_eq!(sink.sent.lock().len(), 1, "suppression must not leak");
    }

    #[test]
    fn seed_default_only_when_unset() {
        let (model, sink) = model_with_sink();
        assert!(model.seed_default("theme", &serde_json::json!("dark")));
        assert!(!model.seed_default("theme", &serde_json::json!("light")));

        assert_eq!(model.get("theme"), Some(serde_json::json!("dark")));
        assert!(sink.sent.lock().is_empty(), "defaults never propagate");
    }

    #[test]
    fn off_topic_removes_those_listeners() {
        let model = WidgetModel::new(WidgetId::new("w1"));
        let fired = Arc::new(Mutex::new(0));

        let f = Arc::clone(&fired);
        model.on(ModelTopic::Change("a".into()), move |_| *f.lock() += 1);
        let f = Arc::clone(&fired);
        model.on(ModelTopic::AnyChange, move |_| *f.lock() += 100);

        assert_eq!(model.off(&ModelTopic::Change("a".into())), 1);
        model.set("a", serde_json::json!(1));
        assert_eq!(*fired.lock(), 100, "only the AnyChange listener remains");
    }

    #[test]
    fn off_all_silences_the_model() {
        let model = WidgetModel::new(WidgetId::new("w1"));
        let fired = Arc::new(Mutex::new(0));
        let f = Arc::clone(&fired);
        model.on(ModelTopic::AnyChange, move |_| *f.lock() += 1);

        model.off_all();
        model.set("a", serde_json::json!(1));
        assert_eq!(*fired.lock(), 0);
    }

    #[test]
    fn trigger_without_handlers_is_noop() {
        let model = WidgetModel::new(WidgetId::new("w1"));
        let ran = model.trigger(
            &ModelTopic::Update,
            &ChangeEvent {
                key: "k".into(),
                value: Value::Null,
            },
        );
        assert_eq!(ran, 0);
    }

    #[test]
    fn changes_without_sink_stay_local() {
        let model = WidgetModel::new(WidgetId::new("w1"));
        model.set("k", serde_json::json!(true));
        assert_eq!(model.get("k"), Some(serde_json::json!(true)));
    }
}
