//! Shared fixtures for the card workspace tests
//!
//! Scripted implementations of the interaction seam traits, a recording
//! bus subscriber, and a scripted data-source executor.

#![warn(unreachable_pub)]

use card_bridge::{DataSourceExecutor, ExecutionError};
use card_config::{ComponentId, JumpTarget, WidgetConfiguration};
use card_events::{ConfigChangeEvent, ConfigEventBus};
use card_interact::{
    BindError, BindingGuard, ComponentInstance, ElementResolver, InteractiveElement, Navigator,
    PointerEvent, TriggerCallback,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Collects every event a bus subscription delivers
#[derive(Debug)]
pub struct RecordingSubscriber {
    receiver: mpsc::Receiver<ConfigChangeEvent>,
}

impl RecordingSubscriber {
    /// Subscribe to one component's events
    #[must_use]
    pub fn component(bus: &ConfigEventBus, id: &ComponentId) -> Self {
        let (_, receiver) = bus.subscribe(id);
        Self { receiver }
    }

    /// Subscribe to every component's events
    #[must_use]
    pub fn wildcard(bus: &ConfigEventBus) -> Self {
        let (_, receiver) = bus.subscribe_all();
        Self { receiver }
    }

    /// Drain everything delivered so far
    pub fn drain(&mut self) -> Vec<ConfigChangeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Await the next event
    pub async fn next(&mut self) -> Option<ConfigChangeEvent> {
        self.receiver.recv().await
    }
}

/// Component instance whose watched properties tests drive directly
pub struct ScriptedInstance {
    id: ComponentId,
    watchers: Arc<RwLock<HashMap<String, Vec<(u64, TriggerCallback)>>>>,
    next_token: AtomicU64,
}

impl ScriptedInstance {
    /// Create an instance for a component id
    #[must_use]
    pub fn new(id: impl Into<ComponentId>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            watchers: Arc::new(RwLock::new(HashMap::new())),
            next_token: AtomicU64::new(0),
        })
    }

    /// Push a new value to every watcher of `property`
    pub fn fire(&self, property: &str, value: Value) {
        let watchers = self.watchers.read();
        if let Some(list) = watchers.get(property) {
            for (_, callback) in list {
                callback(value.clone());
            }
        }
    }

    /// Number of live watchers on `property`
    #[must_use]
    pub fn watcher_count(&self, property: &str) -> usize {
        self.watchers.read().get(property).map_or(0, Vec::len)
    }
}

impl ComponentInstance for ScriptedInstance {
    fn component_id(&self) -> ComponentId {
        self.id.clone()
    }

    fn watch_property(
        &self,
        property: &str,
        callback: TriggerCallback,
    ) -> Result<BindingGuard, BindError> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.watchers
            .write()
            .entry(property.to_string())
            .or_default()
            .push((token, callback));

        let watchers = Arc::clone(&self.watchers);
        let property = property.to_string();
        Ok(BindingGuard::new(move || {
            if let Some(list) = watchers.write().get_mut(&property) {
                list.retain(|(t, _)| *t != token);
            }
        }))
    }
}

/// Rendered element whose pointer events tests drive directly
#[derive(Default)]
pub struct ScriptedElement {
    listeners: Arc<RwLock<Vec<(u64, PointerEvent, TriggerCallback)>>>,
    next_token: AtomicU64,
}

impl ScriptedElement {
    /// Fire a pointer event carrying `value` (e.g. the clicked datum)
    pub fn fire(&self, event: PointerEvent, value: Value) {
        for (_, kind, callback) in self.listeners.read().iter() {
            if *kind == event {
                callback(value.clone());
            }
        }
    }

    /// Number of attached listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl InteractiveElement for ScriptedElement {
    fn add_listener(
        &self,
        event: PointerEvent,
        callback: TriggerCallback,
    ) -> Result<BindingGuard, BindError> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.listeners.write().push((token, event, callback));
        let listeners = Arc::clone(&self.listeners);
        Ok(BindingGuard::new(move || {
            listeners.write().retain(|(t, _, _)| *t != token);
        }))
    }
}

/// Element resolver backed by a map tests populate
#[derive(Default)]
pub struct MapElementResolver {
    elements: RwLock<HashMap<ComponentId, Arc<ScriptedElement>>>,
}

impl MapElementResolver {
    /// Empty resolver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register an element for a component
    pub fn insert(&self, id: impl Into<ComponentId>) -> Arc<ScriptedElement> {
        let element = Arc::new(ScriptedElement::default());
        self.elements.write().insert(id.into(), Arc::clone(&element));
        element
    }

    /// Remove a component's element (simulates unmounting)
    pub fn remove(&self, id: &ComponentId) {
        self.elements.write().remove(id);
    }
}

impl ElementResolver for MapElementResolver {
    fn resolve(&self, id: &ComponentId) -> Option<Arc<dyn InteractiveElement>> {
        self.elements
            .read()
            .get(id)
            .map(|e| Arc::clone(e) as Arc<dyn InteractiveElement>)
    }
}

/// Navigator that records jumps instead of navigating
#[derive(Default)]
pub struct RecordingNavigator {
    jumps: RwLock<Vec<(String, JumpTarget)>>,
}

impl RecordingNavigator {
    /// Empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded jumps, oldest first
    #[must_use]
    pub fn jumps(&self) -> Vec<(String, JumpTarget)> {
        self.jumps.read().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str, target: JumpTarget) {
        self.jumps.write().push((url.to_string(), target));
    }
}

/// Executor that echoes the configuration it was asked to fetch for
#[derive(Default)]
pub struct EchoExecutor {
    calls: AtomicU64,
}

impl EchoExecutor {
    /// Fresh executor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions performed
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DataSourceExecutor for EchoExecutor {
    async fn execute(
        &self,
        id: &ComponentId,
        component_type: Option<&str>,
        config: &WidgetConfiguration,
    ) -> Result<Value, ExecutionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "componentId": id.as_str(),
            "componentType": component_type,
            "sourceType": config.data_source.type_name(),
            "call": call,
        }))
    }
}
