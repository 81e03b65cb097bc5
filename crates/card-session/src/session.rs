//! Editor session composition
//!
//! One [`EditorSession`] per open dashboard editor: it constructs and owns
//! the store, bus, bridge, gateway and router explicitly and passes them
//! to each other by handle. There are no process-wide singletons — two
//! sessions never share state.

use card_bridge::{
    BridgeError, BridgeOptions, ConfigIntegrationBridge, DataSourceExecutor, DataSourceGateway,
    ExecutionError, GatewayOptions,
};
use card_config::{
    ChangeSource, ComponentId, DocumentError, JumpTarget, WidgetConfiguration,
};
use card_events::ConfigEventBus;
use card_interact::{ElementResolver, InteractionRouter, InteractiveElement, Navigator};
use card_store::{ConfigStateManager, StoreError, StoreOptions};
use card_widgets::WidgetCatalog;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Session-wide tunables
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Store tunables (history cap, notify debounce, validation cache)
    pub store: StoreOptions,
    /// Bridge tunables (dedup window)
    pub bridge: BridgeOptions,
    /// Gateway tunables (execution debounce)
    pub gateway: GatewayOptions,
}

/// Errors surfaced by session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Widget type not present in the catalog
    #[error("unknown widget type: {0}")]
    UnknownWidgetType(String),

    /// Store rejection
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Bridge rejection
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Document shape mismatch
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Malformed JSON on import
    #[error("import parse error: {0}")]
    ImportParse(#[from] serde_json::Error),
}

/// Executor used when the host has not supplied one: every source resolves
/// to null data
struct InertExecutor;

#[async_trait::async_trait]
impl DataSourceExecutor for InertExecutor {
    async fn execute(
        &self,
        _id: &ComponentId,
        _component_type: Option<&str>,
        _config: &WidgetConfiguration,
    ) -> Result<Value, ExecutionError> {
        Ok(Value::Null)
    }
}

/// Resolver used when no canvas is attached: nothing is rendered
struct NoElements;

impl ElementResolver for NoElements {
    fn resolve(&self, _id: &ComponentId) -> Option<Arc<dyn InteractiveElement>> {
        None
    }
}

/// Navigator used when no shell is attached: jumps are logged only
struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, url: &str, target: JumpTarget) {
        info!(url, ?target, "jump requested (no navigator attached)");
    }
}

/// Builder wiring the session's collaborators
pub struct EditorSessionBuilder {
    config: SessionConfig,
    executor: Arc<dyn DataSourceExecutor>,
    elements: Arc<dyn ElementResolver>,
    navigator: Arc<dyn Navigator>,
    catalog: WidgetCatalog,
}

impl EditorSessionBuilder {
    fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            executor: Arc::new(InertExecutor),
            elements: Arc::new(NoElements),
            navigator: Arc::new(LogNavigator),
            catalog: WidgetCatalog::with_builtins(),
        }
    }

    /// Override the session tunables
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach the data-fetch collaborator
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn DataSourceExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Attach the canvas element resolver
    #[must_use]
    pub fn elements(mut self, elements: Arc<dyn ElementResolver>) -> Self {
        self.elements = elements;
        self
    }

    /// Attach the navigation shell
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Replace the widget catalog
    #[must_use]
    pub fn catalog(mut self, catalog: WidgetCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Construct the session and spawn its bus listeners
    #[must_use]
    pub fn build(self) -> EditorSession {
        let bus = Arc::new(ConfigEventBus::new());
        let store = Arc::new(ConfigStateManager::with_options(
            Arc::clone(&bus),
            self.config.store.clone(),
        ));
        let bridge = Arc::new(ConfigIntegrationBridge::with_options(
            Arc::clone(&store),
            self.config.bridge.clone(),
        ));
        let gateway = Arc::new(DataSourceGateway::with_options(
            Arc::clone(&store),
            self.executor,
            self.config.gateway.clone(),
        ));
        let router = Arc::new(InteractionRouter::new(
            Arc::clone(&bridge),
            self.elements,
            self.navigator,
        ));

        let catalog = Arc::new(self.catalog);
        catalog.install(&store, bridge.triggers());

        let listeners = vec![
            Arc::clone(&gateway).spawn_bus_listener(&bus),
            Arc::clone(&router).spawn_bus_listener(&bus),
        ];

        debug!(widget_types = catalog.len(), "editor session constructed");
        EditorSession {
            bus,
            store,
            bridge,
            gateway,
            router,
            catalog,
            listeners,
        }
    }
}

/// One editor session owning the whole configuration core
pub struct EditorSession {
    bus: Arc<ConfigEventBus>,
    store: Arc<ConfigStateManager>,
    bridge: Arc<ConfigIntegrationBridge>,
    gateway: Arc<DataSourceGateway>,
    router: Arc<InteractionRouter>,
    catalog: Arc<WidgetCatalog>,
    listeners: Vec<tokio::task::JoinHandle<()>>,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("widgets", &self.store.component_ids().len())
            .finish_non_exhaustive()
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}

impl EditorSession {
    /// Start building a session
    #[must_use]
    pub fn builder() -> EditorSessionBuilder {
        EditorSessionBuilder::new()
    }

    /// The session's change bus
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &Arc<ConfigEventBus> {
        &self.bus
    }

    /// The authoritative store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<ConfigStateManager> {
        &self.store
    }

    /// The single write path
    #[inline]
    #[must_use]
    pub fn bridge(&self) -> &Arc<ConfigIntegrationBridge> {
        &self.bridge
    }

    /// The data-source execution front
    #[inline]
    #[must_use]
    pub fn gateway(&self) -> &Arc<DataSourceGateway> {
        &self.gateway
    }

    /// The interaction router
    #[inline]
    #[must_use]
    pub fn router(&self) -> &Arc<InteractionRouter> {
        &self.router
    }

    /// The widget catalog
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Arc<WidgetCatalog> {
        &self.catalog
    }

    /// Place a widget: instantiate the type's template and register its
    /// interaction rules
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownWidgetType`] for unknown types and
    /// store/template failures otherwise.
    pub fn add_widget(
        &self,
        id: &ComponentId,
        type_id: &str,
        params: &Map<String, Value>,
    ) -> Result<(), SessionError> {
        let definition = self
            .catalog
            .get(type_id)
            .ok_or_else(|| SessionError::UnknownWidgetType(type_id.to_string()))?;

        self.store.apply_template(&definition.template.id, id, params)?;
        if let Some(config) = self.store.get_configuration(id) {
            self.router
                .register_component_configs(id, config.interaction);
        }
        info!(component = %id, type_id, "widget placed");
        Ok(())
    }

    /// Remove a widget and release everything it owned
    ///
    /// Configuration state, version history, snapshots, interaction
    /// listeners, pending updates and the data cache go together.
    pub fn remove_widget(&self, id: &ComponentId) -> bool {
        self.router.unregister_component(id);
        self.gateway.clear_cache(id);
        self.bridge.remove_component(id);
        let removed = self.store.remove_configuration(id);
        if removed {
            info!(component = %id, "widget removed");
        }
        removed
    }

    /// Export one widget's configuration as pretty JSON
    ///
    /// # Errors
    /// Returns [`StoreError::UnknownComponent`] (wrapped) when the widget
    /// does not exist.
    pub fn export_configuration(&self, id: &ComponentId) -> Result<String, SessionError> {
        let config = self
            .bridge
            .get_configuration(id)
            .ok_or_else(|| StoreError::UnknownComponent(id.clone()))?;
        Ok(serde_json::to_string_pretty(&config)?)
    }

    /// Import a configuration document for a widget
    ///
    /// The document passes through the legacy migration before it is
    /// trusted, then persists through the validated write path.
    ///
    /// # Errors
    /// Returns parse errors for malformed JSON and store errors for
    /// validation rejections.
    pub fn import_configuration(
        &self,
        id: &ComponentId,
        json: &str,
    ) -> Result<bool, SessionError> {
        let value: Value = serde_json::from_str(json)?;
        let mut config = WidgetConfiguration::from_value(value)?;
        card_bridge::migration::migrate_device_fields(&mut config);
        Ok(self
            .store
            .set_configuration(id, config, ChangeSource::Import, true)?)
    }

    /// Ids of every placed widget, sorted
    #[must_use]
    pub fn widget_ids(&self) -> Vec<ComponentId> {
        self.store.component_ids()
    }
}
