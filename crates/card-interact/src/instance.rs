//! Seam traits toward the rendered dashboard
//!
//! The router never touches rendering directly: components expose a
//! property-watch capability, the canvas resolves component ids to
//! clickable element handles, and navigation goes through a
//! [`Navigator`]. Hosts (and tests) supply the implementations.

use card_config::{ComponentId, JumpTarget};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with the triggering value (watched property value, or
/// the pointer event's datum)
pub type TriggerCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Pointer events a rendered element can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerEvent {
    /// Click on the element
    Click,
    /// Pointer entered the element
    Hover,
}

/// RAII handle for one bound listener or property watch
///
/// Dropping the guard detaches the listener. Guards are how unregistering
/// a component tears everything down at once.
pub struct BindingGuard {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl BindingGuard {
    /// Create a guard running `detach` when dropped
    #[must_use]
    pub fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A guard with nothing to detach
    #[must_use]
    pub fn noop() -> Self {
        Self { detach: None }
    }
}

impl fmt::Debug for BindingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingGuard")
            .field("armed", &self.detach.is_some())
            .finish()
    }
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// A live component instance exposing interactivity
pub trait ComponentInstance: Send + Sync {
    /// The component's canvas id
    fn component_id(&self) -> ComponentId;

    /// Watch a display-data property
    ///
    /// The callback fires when the property's value changes. The returned
    /// guard unsubscribes on drop.
    ///
    /// # Errors
    /// Returns [`BindError::PropertyNotWatchable`] when the instance cannot
    /// watch the property.
    fn watch_property(
        &self,
        property: &str,
        callback: TriggerCallback,
    ) -> Result<BindingGuard, BindError>;
}

/// A rendered element that accepts pointer listeners
pub trait InteractiveElement: Send + Sync {
    /// Attach a pointer listener; the guard detaches on drop
    ///
    /// # Errors
    /// Returns [`BindError`] when the element refuses the listener.
    fn add_listener(
        &self,
        event: PointerEvent,
        callback: TriggerCallback,
    ) -> Result<BindingGuard, BindError>;
}

/// Looks up rendered elements by the stable component-id attribute
pub trait ElementResolver: Send + Sync {
    /// The element for a component, if it is currently rendered
    fn resolve(&self, id: &ComponentId) -> Option<Arc<dyn InteractiveElement>>;
}

/// Executes jump responses
pub trait Navigator: Send + Sync {
    /// Navigate to `url` in the given tab target
    fn navigate(&self, url: &str, target: JumpTarget);
}

/// Binding failures
///
/// A failed binding skips that one listener (logged); sibling listeners
/// still bind.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// No rendered element carries the component id
    #[error("no rendered element for component {0}")]
    ElementNotFound(ComponentId),

    /// No live instance registered for the component
    #[error("no live instance for component {0}")]
    InstanceNotFound(ComponentId),

    /// The instance cannot watch the requested property
    #[error("component {component}: property '{property}' not watchable")]
    PropertyNotWatchable {
        /// Owning component
        component: ComponentId,
        /// Requested property
        property: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn guard_detaches_on_drop() {
        let detached = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&detached);
        let guard = BindingGuard::new(move || flag.store(true, Ordering::SeqCst));
        assert!(!detached.load(Ordering::SeqCst));
        drop(guard);
        assert!(detached.load(Ordering::SeqCst));
    }

    #[test]
    fn noop_guard_is_silent() {
        drop(BindingGuard::noop());
    }
}
