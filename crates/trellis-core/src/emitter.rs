use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// Handle returned by [`Emitter::on`], used to detach a single subscription.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Typed publish/subscribe table keyed by topic.
///
/// Handlers for a topic run synchronously, in registration order. The
/// handler list is snapshotted before invocation, so a handler may call back
/// into the emitter (subscribe, unsubscribe, emit) without deadlocking.
pub struct Emitter<K, P> {
    inner: RwLock<Inner<K, P>>,
}

struct Inner<K, P> {
    next_id: u64,
    topics: HashMap<K, Vec<(SubscriptionId, Handler<P>)>>,
    index: HashMap<SubscriptionId, K>,
}

impl<K, P> Emitter<K, P>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 0,
                topics: HashMap::new(),
                index: HashMap::new(),
            }),
        }
    }

    /// Register a handler for a topic. Handlers fire in registration order.
    pub fn on<F>(&self, topic: K, handler: F) -> SubscriptionId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner
            .topics
            .entry(topic.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        inner.index.insert(id, topic);
        id
    }

    /// Remove a single subscription. Returns false if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.write();
        let Some(topic) = inner.index.remove(&id) else {
            return false;
        };
        if let Some(handlers) = inner.topics.get_mut(&topic) {
            handlers.retain(|(hid, _)| *hid != id);
            if handlers.is_empty() {
                inner.topics.remove(&topic);
            }
        }
        true
    }

    /// Remove every handler registered for a topic. Returns how many.
    pub fn off_topic(&self, topic: &K) -> usize {
        let mut inner = self.inner.write();
        let Some(handlers) = inner.topics.remove(topic) else {
            return 0;
        };
        for (id, _) in &handlers {
            inner.index.remove(id);
        }
        handlers.len()
    }

    /// Remove every handler for every topic.
    pub fn off_all(&self) {
        let mut inner = self.inner.write();
        inner.topics.clear();
        inner.index.clear();
    }

    /// Invoke all handlers for a topic with the payload. No-op when none are
    /// registered. Returns how many handlers ran.
    pub fn emit(&self, topic: &K, payload: &P) -> usize {
        let snapshot: Vec<Handler<P>> = {
            let inner = self.inner.read();
            match inner.topics.get(topic) {
                Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return 0,
            }
        };
        for handler in &snapshot {
            handler(payload);
        }
        snapshot.len()
    }

    pub fn handler_count(&self, topic: &K) -> usize {
        self.inner
            .read()
            .topics
            .get(topic)
            .map_or(0, |handlers| handlers.len())
    }
}

impl<K, P> Default for Emitter<K, P>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
