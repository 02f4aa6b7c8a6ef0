use parking_lot::Mutex;

/// Where the manifest's session id survives between runs. The original
/// browser client kept it in local storage; headless hosts keep it wherever
/// suits them.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, session_id: &str);
    fn clear(&self);
}

/// Process-lifetime store for one-shot clients and tests.
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a previously issued session id.
    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(session_id.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    fn store(&self, session_id: &str) {
        *self.slot.lock() = Some(session_id.to_owned());
    }

    fn clear(&self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let store = MemorySessionStore::new();
        assert!(store.load().is_none());
    }

    #[test]
    fn store_then_load() {
        let store = MemorySessionStore::new();
        store.store("sess_a");
        assert_eq!(store.load().as_deref(), Some("sess_a"));

        store.store("sess_b");
        assert_eq!(store.load().as_deref(), Some("sess_b"));
    }

    #[test]
    fn clear_forgets_session() {
        let store = MemorySessionStore::with_session("sess_a");
        assert_eq!(store.load().as_deref(), Some("sess_a"));
        store.clear();
        assert!(store.load().is_none());
    }
}
