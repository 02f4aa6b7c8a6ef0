use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Opaque reference to a mount point on the host page. Presentation layers
/// decide what it maps to: a DOM node, a terminal pane, a log scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementHandle {
    selector: String,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Handle for an isolation wrapper around this element.
    pub fn isolated(&self) -> Self {
        Self {
            selector: format!("{}::isolated", self.selector),
        }
    }
}

/// Page-side collaborator for the bootstrapper. The bootstrapper decides
/// *when* containers are resolved, styles land, and the splash goes away;
/// the implementation decides *where*.
pub trait HostPage: Send + Sync {
    /// Mount point for the widget; `None` when the page has no slot for it.
    fn container(&self, widget_id: &str) -> Option<ElementHandle>;
    /// Wrap the element so widget styles cannot leak into the page.
    fn wrap_isolated(&self, element: &ElementHandle) -> ElementHandle;
    fn inject_style(&self, widget_id: &str, css: &str);
    fn show_splash(&self);
    fn dismiss_splash(&self);
}

/// Host with a container for every widget id and no real rendering surface.
/// Backs headless clients and tests.
#[derive(Default)]
pub struct HeadlessPage {
    missing: HashSet<String>,
    splash_visible: AtomicBool,
    injected_styles: Mutex<Vec<(String, String)>>,
}

impl HeadlessPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend these widget ids have no mount point on the page.
    pub fn without_containers<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            missing: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn splash_visible(&self) -> bool {
        self.splash_visible.load(Ordering::Relaxed)
    }

    /// `(widget_id, css)` pairs in injection order.
    pub fn injected_styles(&self) -> Vec<(String, String)> {
        self.injected_styles.lock().clone()
    }
}

impl HostPage for HeadlessPage {
    fn container(&self, widget_id: &str) -> Option<ElementHandle> {
        if self.missing.contains(widget_id) {
            return None;
        }
        Some(ElementHandle::new(format!("#widget-{widget_id}")))
    }

    fn wrap_isolated(&self, element: &ElementHandle) -> ElementHandle {
        element.isolated()
    }

    fn inject_style(&self, widget_id: &str, css: &str) {
        tracing::debug!(widget_id = %widget_id, bytes = css.len(), "style injected");
        self.injected_styles
            .lock()
            .push((widget_id.to_owned(), css.to_owned()));
    }

    fn show_splash(&self) {
        self.splash_visible.store(true, Ordering::Relaxed);
    }

    fn dismiss_splash(&self) {
        self.splash_visible.store(false, Ordering::Relaxed);
        tracing::debug!("splash dismissed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containers_exist_unless_marked_missing() {
        let page = HeadlessPage::without_containers(["gone"]);
        assert!(page.container("counter").is_some());
        assert!(page.container("gone").is_none());
    }

    #[test]
    fn isolation_derives_a_distinct_handle() {
        let element = ElementHandle::new("#widget-a");
        let wrapped = element.isolated();
        assert_ne!(element, wrapped);
        assert!(wrapped.selector().starts_with("#widget-a"));
    }

    #[test]
    fn splash_toggles() {
        let page = HeadlessPage::new();
        assert!(!page.splash_visible());
        page.show_splash();
        assert!(page.splash_visible());
        page.dismiss_splash();
        assert!(!page.splash_visible());
    }

    #[test]
    fn styles_are_recorded_in_order() {
        let page = HeadlessPage::new();
        page.inject_style("a", ".a {}");
        page.inject_style("b", ".b {}");
        let styles = page.injected_styles();
        assert_eq!(styles[0].0, "a");
        assert_eq!(styles[1].0, "b");
    }
}
