//! Interaction routing
//!
//! Maps `componentId → InteractionConfig[]` plus live listener
//! registrations bound to concrete component instances. Registration is
//! commutative: configs-then-instance and instance-then-configs converge
//! to the same bound state. Unregistering tears down every listener and
//! map entry and is safe to repeat.

use crate::batch;
use crate::condition;
use crate::instance::{
    BindingGuard, ComponentInstance, ElementResolver, Navigator, PointerEvent, TriggerCallback,
};
use card_bridge::ConfigIntegrationBridge;
use card_config::{
    ComponentId, ConfigSection, InteractionConfig, InteractionResponse, ModifyConfig,
    TriggerEvent,
};
use card_events::ConfigEventBus;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes declarative interaction rules to live component instances
pub struct InteractionRouter {
    bridge: Arc<ConfigIntegrationBridge>,
    elements: Arc<dyn ElementResolver>,
    navigator: Arc<dyn Navigator>,
    configs: DashMap<ComponentId, Arc<Vec<InteractionConfig>>>,
    instances: DashMap<ComponentId, Arc<dyn ComponentInstance>>,
    bindings: DashMap<ComponentId, Vec<BindingGuard>>,
    /// Modify responses gathered within one tick, flushed as one batch
    pending: Arc<DashMap<ComponentId, Vec<ModifyConfig>>>,
}

impl std::fmt::Debug for InteractionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionRouter")
            .field("registered", &self.configs.len())
            .field("bound", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

impl InteractionRouter {
    /// Create a router writing through `bridge`, looking up elements via
    /// `elements` and executing jumps via `navigator`
    #[must_use]
    pub fn new(
        bridge: Arc<ConfigIntegrationBridge>,
        elements: Arc<dyn ElementResolver>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            bridge,
            elements,
            navigator,
            configs: DashMap::new(),
            instances: DashMap::new(),
            bindings: DashMap::new(),
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Replace a component's interaction rules
    ///
    /// Existing listeners are always torn down first (safe to call
    /// repeatedly); binding happens immediately if a live instance is
    /// already cached, otherwise when the instance arrives.
    pub fn register_component_configs(
        &self,
        id: &ComponentId,
        configs: Vec<InteractionConfig>,
    ) {
        self.teardown(id);
        self.configs.insert(id.clone(), Arc::new(configs));
        self.try_bind(id);
    }

    /// Cache a live component instance and bind any stored rules
    pub fn register_component_instance(
        &self,
        id: &ComponentId,
        instance: Arc<dyn ComponentInstance>,
    ) {
        self.teardown(id);
        self.instances.insert(id.clone(), instance);
        self.try_bind(id);
    }

    /// Tear down listeners and forget the component entirely
    ///
    /// No-op on an already-unregistered id.
    pub fn unregister_component(&self, id: &ComponentId) {
        self.teardown(id);
        self.configs.remove(id);
        self.instances.remove(id);
        self.pending.remove(id);
        debug!(component = %id, "interaction routing unregistered");
    }

    /// Whether any listener is currently bound for the component
    #[must_use]
    pub fn is_bound(&self, id: &ComponentId) -> bool {
        self.bindings.get(id).map(|b| !b.is_empty()).unwrap_or(false)
    }

    /// The component's registered rules, if any
    #[must_use]
    pub fn registered_configs(&self, id: &ComponentId) -> Option<Arc<Vec<InteractionConfig>>> {
        self.configs.get(id).map(|c| Arc::clone(c.value()))
    }

    /// Spawn the bus listener that re-registers a component's rules
    /// whenever its `interaction` section changes
    pub fn spawn_bus_listener(self: Arc<Self>, bus: &ConfigEventBus) -> tokio::task::JoinHandle<()> {
        let (_, mut rx) = bus.subscribe_all();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if event.section != ConfigSection::Interaction {
                    continue;
                }
                match serde_json::from_value::<Vec<InteractionConfig>>(event.new_config.clone()) {
                    Ok(configs) => {
                        debug!(component = %event.component_id, rules = configs.len(), "re-registering interaction rules from change event");
                        self.register_component_configs(&event.component_id, configs);
                    }
                    Err(err) => {
                        warn!(component = %event.component_id, error = %err, "interaction section change did not parse; keeping existing rules");
                    }
                }
            }
        })
    }

    fn teardown(&self, id: &ComponentId) {
        if let Some((_, guards)) = self.bindings.remove(id) {
            debug!(component = %id, listeners = guards.len(), "tearing down interaction listeners");
            drop(guards);
        }
    }

    /// Bind whatever can be bound right now
    ///
    /// Click/hover need a resolvable element; dataChange needs the live
    /// instance. A missing collaborator skips only the affected entries —
    /// they bind on the next registration attempt.
    fn try_bind(&self, id: &ComponentId) {
        let Some(configs) = self.registered_configs(id) else {
            return;
        };

        let instance = self.instances.get(id).map(|i| Arc::clone(i.value()));
        let mut guards = Vec::new();

        for config in configs.iter() {
            if let Err(defect) = config.well_formed() {
                warn!(component = %id, error = %defect, "skipping defective interaction rule");
                continue;
            }

            match config.event {
                TriggerEvent::Click | TriggerEvent::Hover => {
                    let Some(element) = self.elements.resolve(id) else {
                        warn!(component = %id, rule = %config.id, "no rendered element; listener skipped");
                        continue;
                    };
                    let pointer = match config.event {
                        TriggerEvent::Click => PointerEvent::Click,
                        _ => PointerEvent::Hover,
                    };
                    match element.add_listener(pointer, self.trigger_callback(id, config)) {
                        Ok(guard) => guards.push(guard),
                        Err(err) => {
                            warn!(component = %id, rule = %config.id, error = %err, "listener binding failed");
                        }
                    }
                }
                TriggerEvent::DataChange => {
                    let Some(instance) = &instance else {
                        debug!(component = %id, rule = %config.id, "instance not yet registered; dataChange deferred");
                        continue;
                    };
                    let property = config
                        .watched_property
                        .clone()
                        .unwrap_or_default();
                    match instance.watch_property(
                        &property,
                        self.data_change_callback(id, config),
                    ) {
                        Ok(guard) => guards.push(guard),
                        Err(err) => {
                            warn!(component = %id, rule = %config.id, error = %err, "property watch binding failed");
                        }
                    }
                }
            }
        }

        if !guards.is_empty() {
            debug!(component = %id, listeners = guards.len(), "interaction listeners bound");
        }
        self.bindings.insert(id.clone(), guards);
    }

    /// Callback for click/hover listeners
    fn trigger_callback(&self, id: &ComponentId, config: &InteractionConfig) -> TriggerCallback {
        let runner = self.response_runner(id, config);
        Arc::new(move |value: Value| {
            runner(&value);
        })
    }

    /// Callback for property watches: fires only when the watched value
    /// actually changes
    fn data_change_callback(
        &self,
        id: &ComponentId,
        config: &InteractionConfig,
    ) -> TriggerCallback {
        let runner = self.response_runner(id, config);
        let previous: Mutex<Option<Value>> = Mutex::new(None);
        Arc::new(move |value: Value| {
            {
                let mut previous = previous.lock();
                if previous.as_ref() == Some(&value) {
                    return;
                }
                *previous = Some(value.clone());
            }
            runner(&value);
        })
    }

    /// Build the shared trigger pipeline for one rule: condition gate,
    /// immediate jumps, batched modifies
    fn response_runner(
        &self,
        id: &ComponentId,
        config: &InteractionConfig,
    ) -> Box<dyn Fn(&Value) + Send + Sync> {
        let component = id.clone();
        let rule = config.clone();
        let navigator = Arc::clone(&self.navigator);
        let bridge = Arc::clone(&self.bridge);
        let pending = Arc::clone(&self.pending);

        Box::new(move |value: &Value| {
            if !condition::evaluate(rule.condition.as_ref(), value) {
                return;
            }

            let mut modifies = Vec::new();
            for response in &rule.responses {
                match response {
                    InteractionResponse::Jump { jump_config } => {
                        // Jumps are synchronous and immediate, never batched.
                        navigator.navigate(&jump_config.url, jump_config.target);
                    }
                    InteractionResponse::Modify { modify_config } => {
                        modifies.push(modify_config.clone());
                    }
                }
            }
            if modifies.is_empty() {
                return;
            }

            let newly_scheduled = {
                let mut entry = pending.entry(component.clone()).or_default();
                let was_empty = entry.is_empty();
                entry.extend(modifies);
                was_empty
            };

            if newly_scheduled {
                // Flush on the next tick so sibling rules triggered by the
                // same event occurrence land in the same batch.
                let pending = Arc::clone(&pending);
                let bridge = Arc::clone(&bridge);
                let component = component.clone();
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    let Some((_, modifies)) = pending.remove(&component) else {
                        return;
                    };
                    let outcome = batch::flush_modifies(&bridge, modifies);
                    debug!(component = %component, writes = outcome.writes, failed = outcome.failed, "interaction batch flushed");
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_config::{
        ChangeSource, ComparisonOperator, Condition, JumpConfig, JumpTarget, ModifyConfig,
    };
    use card_store::ConfigStateManager;
    use parking_lot::RwLock;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::time::{advance, Duration};

    // ---- scripted seam implementations -------------------------------

    /// Instance whose watched properties tests drive directly
    struct ScriptedInstance {
        id: ComponentId,
        watchers: Arc<RwLock<HashMap<String, Vec<(u64, TriggerCallback)>>>>,
        next_token: std::sync::atomic::AtomicU64,
    }

    impl ScriptedInstance {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: ComponentId::from(id),
                watchers: Arc::new(RwLock::new(HashMap::new())),
                next_token: std::sync::atomic::AtomicU64::new(0),
            })
        }

        fn fire(&self, property: &str, value: Value) {
            let watchers = self.watchers.read();
            if let Some(list) = watchers.get(property) {
                for (_, callback) in list {
                    callback(value.clone());
                }
            }
        }

        fn watcher_count(&self, property: &str) -> usize {
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
        ) -> Result<BindingGuard, crate::instance::BindError> {
            let token = self
                .next_token
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
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

    /// Element whose pointer events tests drive directly
    #[derive(Default)]
    struct ScriptedElement {
        listeners: Arc<RwLock<Vec<(PointerEvent, TriggerCallback)>>>,
    }

    impl ScriptedElement {
        fn fire(&self, event: PointerEvent, value: Value) {
            for (kind, callback) in self.listeners.read().iter() {
                if *kind == event {
                    callback(value.clone());
                }
            }
        }

        fn listener_count(&self) -> usize {
            self.listeners.read().len()
        }
    }

    impl InteractiveElement for ScriptedElement {
        fn add_listener(
            &self,
            event: PointerEvent,
            callback: TriggerCallback,
        ) -> Result<BindingGuard, crate::instance::BindError> {
            self.listeners.write().push((event, callback));
            let listeners = Arc::clone(&self.listeners);
            let index = self.listeners.read().len() - 1;
            Ok(BindingGuard::new(move || {
                let mut listeners = listeners.write();
                if index < listeners.len() {
                    listeners.remove(index);
                }
            }))
        }
    }

    use crate::instance::InteractiveElement;

    #[derive(Default)]
    struct MapResolver {
        elements: RwLock<HashMap<ComponentId, Arc<ScriptedElement>>>,
    }

    impl MapResolver {
        fn insert(&self, id: &str) -> Arc<ScriptedElement> {
            let element = Arc::new(ScriptedElement::default());
            self.elements
                .write()
                .insert(ComponentId::from(id), Arc::clone(&element));
            element
        }
    }

    impl ElementResolver for MapResolver {
        fn resolve(&self, id: &ComponentId) -> Option<Arc<dyn InteractiveElement>> {
            self.elements
                .read()
                .get(id)
                .map(|e| Arc::clone(e) as Arc<dyn InteractiveElement>)
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        jumps: RwLock<Vec<(String, JumpTarget)>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, url: &str, target: JumpTarget) {
            self.jumps.write().push((url.to_string(), target));
        }
    }

    // ---- helpers ------------------------------------------------------

    struct Fixture {
        store: Arc<ConfigStateManager>,
        bridge: Arc<ConfigIntegrationBridge>,
        resolver: Arc<MapResolver>,
        navigator: Arc<RecordingNavigator>,
        router: Arc<InteractionRouter>,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(ConfigEventBus::new());
        let store = Arc::new(ConfigStateManager::new(bus));
        let bridge = Arc::new(ConfigIntegrationBridge::new(Arc::clone(&store)));
        let resolver = Arc::new(MapResolver::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let router = Arc::new(InteractionRouter::new(
            Arc::clone(&bridge),
            Arc::clone(&resolver) as Arc<dyn ElementResolver>,
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        ));
        Fixture {
            store,
            bridge,
            resolver,
            navigator,
            router,
        }
    }

    fn data_change_rule(id: &str, property: &str, responses: Vec<InteractionResponse>) -> InteractionConfig {
        InteractionConfig {
            id: id.to_string(),
            event: TriggerEvent::DataChange,
            condition: None,
            watched_property: Some(property.to_string()),
            responses,
        }
    }

    fn modify(target: &str, property: &str, value: Value) -> InteractionResponse {
        InteractionResponse::Modify {
            modify_config: ModifyConfig {
                target_component_id: target.to_string(),
                target_property: property.to_string(),
                update_value: value,
            },
        }
    }

    async fn settle(fixture: &Fixture) {
        // Batch flush happens on the next tick; then the store's notify
        // debounce settles the write.
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        advance(fixture.store.options().notify_delay + Duration::from_millis(60)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    // ---- tests --------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn binding_is_commutative_configs_first() {
        let fx = fixture();
        let id = ComponentId::from("w2");
        let instance = ScriptedInstance::new("w2");

        fx.router
            .register_component_configs(&id, vec![data_change_rule("r1", "temperature", vec![])]);
        assert!(!fx.router.is_bound(&id));

        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);
        assert!(fx.router.is_bound(&id));
        assert_eq!(instance.watcher_count("temperature"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn binding_is_commutative_instance_first() {
        let fx = fixture();
        let id = ComponentId::from("w2");
        let instance = ScriptedInstance::new("w2");

        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);
        fx.router
            .register_component_configs(&id, vec![data_change_rule("r1", "temperature", vec![])]);

        assert!(fx.router.is_bound(&id));
        assert_eq!(instance.watcher_count("temperature"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reregistration_replaces_listeners() {
        let fx = fixture();
        let id = ComponentId::from("w2");
        let instance = ScriptedInstance::new("w2");
        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);

        fx.router
            .register_component_configs(&id, vec![data_change_rule("r1", "temperature", vec![])]);
        fx.router
            .register_component_configs(&id, vec![data_change_rule("r2", "humidity", vec![])]);

        // Old watcher torn down, new one active.
        assert_eq!(instance.watcher_count("temperature"), 0);
        assert_eq!(instance.watcher_count("humidity"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unregister_is_idempotent_and_tears_down() {
        let fx = fixture();
        let id = ComponentId::from("w2");
        let instance = ScriptedInstance::new("w2");
        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);
        fx.router
            .register_component_configs(&id, vec![data_change_rule("r1", "temperature", vec![])]);

        fx.router.unregister_component(&id);
        assert_eq!(instance.watcher_count("temperature"), 0);
        assert!(!fx.router.is_bound(&id));

        // Second unregister is a no-op.
        fx.router.unregister_component(&id);
    }

    #[tokio::test(start_paused = true)]
    async fn same_tick_modifies_batch_into_one_write() {
        let fx = fixture();
        let id = ComponentId::from("w2");
        let target = ComponentId::from("w3");
        fx.store.initialize_configuration(&target);
        let instance = ScriptedInstance::new("w2");

        fx.router.register_component_configs(
            &id,
            vec![
                data_change_rule(
                    "r1",
                    "temperature",
                    vec![modify("w3", "component.color", json!("#early"))],
                ),
                data_change_rule(
                    "r2",
                    "temperature",
                    vec![modify("w3", "component.color", json!("#late"))],
                ),
            ],
        );
        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);

        instance.fire("temperature", json!(42));
        settle(&fx).await;

        let config = fx.store.get_configuration(&target).unwrap();
        // Last-listed response wins, with exactly one write to w3.
        assert_eq!(config.component.get("color"), Some(&json!("#late")));
        assert_eq!(fx.store.current_version(&target).unwrap().version, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn condition_gates_responses() {
        let fx = fixture();
        let id = ComponentId::from("w2");
        let target = ComponentId::from("w3");
        fx.store.initialize_configuration(&target);
        let instance = ScriptedInstance::new("w2");

        let mut rule = data_change_rule(
            "r1",
            "temperature",
            vec![modify("w3", "component.alarm", json!(true))],
        );
        rule.condition = Some(Condition::Comparison {
            operator: ComparisonOperator::GreaterThan,
            value: json!(30),
        });
        fx.router.register_component_configs(&id, vec![rule]);
        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);

        instance.fire("temperature", json!(20));
        settle(&fx).await;
        assert_eq!(fx.store.current_version(&target).unwrap().version, 1);

        instance.fire("temperature", json!(35));
        settle(&fx).await;
        let config = fx.store.get_configuration(&target).unwrap();
        assert_eq!(config.component.get("alarm"), Some(&json!(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn data_change_fires_only_on_change() {
        let fx = fixture();
        let id = ComponentId::from("w2");
        let target = ComponentId::from("w3");
        fx.store.initialize_configuration(&target);
        let instance = ScriptedInstance::new("w2");

        fx.router.register_component_configs(
            &id,
            vec![data_change_rule(
                "r1",
                "state",
                vec![modify("w3", "component.state", json!("mirrored"))],
            )],
        );
        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);

        instance.fire("state", json!("on"));
        settle(&fx).await;
        let v1 = fx.store.current_version(&target).unwrap().version;

        // Same value again: suppressed by the change guard.
        instance.fire("state", json!("on"));
        settle(&fx).await;
        assert_eq!(fx.store.current_version(&target).unwrap().version, v1);

        instance.fire("state", json!("off"));
        settle(&fx).await;
        assert!(fx.store.current_version(&target).unwrap().version > v1);
    }

    #[tokio::test(start_paused = true)]
    async fn click_executes_jump_immediately() {
        let fx = fixture();
        let id = ComponentId::from("w1");
        let element = fx.resolver.insert("w1");

        fx.router.register_component_configs(
            &id,
            vec![InteractionConfig {
                id: "jump".to_string(),
                event: TriggerEvent::Click,
                condition: None,
                watched_property: None,
                responses: vec![InteractionResponse::Jump {
                    jump_config: JumpConfig {
                        url: "/device/42".to_string(),
                        target: JumpTarget::NewTab,
                    },
                }],
            }],
        );
        assert_eq!(element.listener_count(), 1);

        element.fire(PointerEvent::Click, Value::Null);
        // Jump happened synchronously, no settling needed.
        let jumps = fx.navigator.jumps.read();
        assert_eq!(jumps.as_slice(), &[("/device/42".to_string(), JumpTarget::NewTab)]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_element_skips_only_affected_entries() {
        let fx = fixture();
        let id = ComponentId::from("w9");
        let instance = ScriptedInstance::new("w9");

        // No element registered for w9: the click rule is skipped but the
        // dataChange rule still binds.
        fx.router.register_component_configs(
            &id,
            vec![
                InteractionConfig {
                    id: "click".to_string(),
                    event: TriggerEvent::Click,
                    condition: None,
                    watched_property: None,
                    responses: vec![],
                },
                data_change_rule("dc", "temperature", vec![]),
            ],
        );
        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);

        assert!(fx.router.is_bound(&id));
        assert_eq!(instance.watcher_count("temperature"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn defective_rule_is_inert_but_siblings_bind() {
        let fx = fixture();
        let id = ComponentId::from("w2");
        let instance = ScriptedInstance::new("w2");

        fx.router.register_component_configs(
            &id,
            vec![
                InteractionConfig {
                    id: "broken".to_string(),
                    event: TriggerEvent::DataChange,
                    condition: None,
                    watched_property: None, // defect
                    responses: vec![],
                },
                data_change_rule("ok", "humidity", vec![]),
            ],
        );
        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);

        assert_eq!(instance.watcher_count("humidity"), 1);
        assert!(fx.router.is_bound(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn modify_self_and_other_group_separately() {
        let fx = fixture();
        let id = ComponentId::from("w2");
        let other = ComponentId::from("w3");
        fx.store.initialize_configuration(&id);
        fx.store.initialize_configuration(&other);
        let instance = ScriptedInstance::new("w2");

        fx.router.register_component_configs(
            &id,
            vec![data_change_rule(
                "r1",
                "level",
                vec![
                    modify("w2", "component.level", json!("high")),
                    modify("w3", "component.mirror", json!("high")),
                    modify("w3", "base.title", json!("Alert")),
                ],
            )],
        );
        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);

        instance.fire("level", json!(9));
        settle(&fx).await;

        assert_eq!(
            fx.store
                .get_configuration(&id)
                .unwrap()
                .component
                .get("level"),
            Some(&json!("high"))
        );
        let other_config = fx.store.get_configuration(&other).unwrap();
        assert_eq!(other_config.component.get("mirror"), Some(&json!("high")));
        assert_eq!(other_config.base.title.as_deref(), Some("Alert"));
        // Two layers on w3: exactly two writes (versions 1 → 3).
        assert_eq!(fx.store.current_version(&other).unwrap().version, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn bus_listener_reregisters_on_interaction_change() {
        let fx = fixture();
        let bus = Arc::clone(fx.store.bus());
        let listener = Arc::clone(&fx.router).spawn_bus_listener(&bus);
        let id = ComponentId::from("w2");
        let instance = ScriptedInstance::new("w2");
        fx.router
            .register_component_instance(&id, instance.clone() as Arc<dyn ComponentInstance>);

        let rules = vec![data_change_rule("r1", "pressure", vec![])];
        fx.bridge
            .update_configuration(
                &id,
                ConfigSection::Interaction,
                serde_json::to_value(&rules).unwrap(),
                ChangeSource::User,
            )
            .unwrap();

        // Coalescing window, store debounce, then the listener task.
        advance(Duration::from_millis(60)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        advance(Duration::from_millis(40)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(instance.watcher_count("pressure"), 1);
        listener.abort();
    }
}
