//! Data-source gateway
//!
//! Listens for change events flagged for execution, debounces and
//! coalesces them per component, and drives the external
//! [`DataSourceExecutor`] collaborator. Stale completions are detected by
//! sequence-number comparison and discarded silently — a newer result is
//! expected to supersede them.

use card_config::{ComponentId, ConfigHash, WidgetConfiguration};
use card_events::{ConfigEventBus, Debouncer};
use card_store::ConfigStateManager;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// External data-fetch collaborator
///
/// Implementations fetch device telemetry (or whatever the source type
/// demands) for one component; the gateway never needs to know fetch
/// internals.
#[async_trait::async_trait]
pub trait DataSourceExecutor: Send + Sync {
    /// Execute a fetch for the component's merged configuration
    ///
    /// # Errors
    /// Returns an [`ExecutionError`] when the fetch cannot complete; the
    /// gateway logs it and keeps the previous result.
    async fn execute(
        &self,
        id: &ComponentId,
        component_type: Option<&str>,
        config: &WidgetConfiguration,
    ) -> Result<Value, ExecutionError>;
}

/// Failures from the executor collaborator
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The fetch failed (network, device offline, bad query, …)
    #[error("data fetch failed: {0}")]
    Failed(String),

    /// The configuration's source type cannot be executed
    #[error("source not executable: {0}")]
    NotExecutable(String),
}

/// Gateway tunables
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Settle delay before an execution request fires
    pub execution_delay: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            execution_delay: Duration::from_millis(300),
        }
    }
}

/// Debounced, sequence-guarded execution front for the data-source layer
pub struct DataSourceGateway {
    store: Arc<ConfigStateManager>,
    executor: Arc<dyn DataSourceExecutor>,
    results: Arc<DashMap<ComponentId, Value>>,
    sequences: Arc<DashMap<ComponentId, Arc<AtomicU64>>>,
    executed_hashes: Arc<DashMap<ComponentId, ConfigHash>>,
    debouncer: Debouncer<ComponentId>,
    options: GatewayOptions,
}

impl std::fmt::Debug for DataSourceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceGateway")
            .field("cached_results", &self.results.len())
            .finish_non_exhaustive()
    }
}

impl DataSourceGateway {
    /// Create a gateway over a store and executor with default options
    #[must_use]
    pub fn new(store: Arc<ConfigStateManager>, executor: Arc<dyn DataSourceExecutor>) -> Self {
        Self::with_options(store, executor, GatewayOptions::default())
    }

    /// Create a gateway with explicit tunables
    #[must_use]
    pub fn with_options(
        store: Arc<ConfigStateManager>,
        executor: Arc<dyn DataSourceExecutor>,
        options: GatewayOptions,
    ) -> Self {
        Self {
            store,
            executor,
            results: Arc::new(DashMap::new()),
            sequences: Arc::new(DashMap::new()),
            executed_hashes: Arc::new(DashMap::new()),
            debouncer: Debouncer::new(options.execution_delay),
            options,
        }
    }

    /// Gateway tunables
    #[inline]
    #[must_use]
    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Spawn the bus listener task
    ///
    /// Consumes events from a wildcard subscription and requests execution
    /// for every event flagged `should_trigger_execution`.
    pub fn spawn_bus_listener(self: Arc<Self>, bus: &ConfigEventBus) -> tokio::task::JoinHandle<()> {
        let (_, mut rx) = bus.subscribe_all();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if event.context.should_trigger_execution {
                    self.request_execution(&event.component_id, event.component_type.clone());
                }
            }
        })
    }

    /// Request a (debounced) execution for a component
    ///
    /// Rapid-fire requests collapse into one; the configuration is read at
    /// fire time, and a configuration whose hash already executed is
    /// skipped.
    pub fn request_execution(&self, id: &ComponentId, component_type: Option<String>) {
        let store = Arc::clone(&self.store);
        let executor = Arc::clone(&self.executor);
        let results = Arc::clone(&self.results);
        let sequences = Arc::clone(&self.sequences);
        let executed_hashes = Arc::clone(&self.executed_hashes);
        let component = id.clone();

        self.debouncer.schedule(id.clone(), move || async move {
            let Some(config) = store.get_configuration(&component) else {
                debug!(component = %component, "execution requested for unknown component");
                return;
            };

            let hash = config.content_hash();
            if executed_hashes
                .get(&component)
                .is_some_and(|executed| *executed == hash)
            {
                debug!(component = %component, "configuration unchanged since last fetch; skipping");
                return;
            }

            let counter = sequences
                .entry(component.clone())
                .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                .clone();
            let sequence = counter.fetch_add(1, Ordering::SeqCst) + 1;

            match executor
                .execute(&component, component_type.as_deref(), &config)
                .await
            {
                Ok(result) => {
                    // A newer request may have started while this fetch was
                    // in flight; its result supersedes ours.
                    if counter.load(Ordering::SeqCst) == sequence {
                        results.insert(component.clone(), result);
                        executed_hashes.insert(component.clone(), hash);
                        debug!(component = %component, sequence, "data-source result applied");
                    } else {
                        debug!(component = %component, sequence, "stale data-source result discarded");
                    }
                }
                Err(err) => {
                    warn!(component = %component, sequence, error = %err, "data-source execution failed");
                }
            }
        });
    }

    /// Latest applied result for a component
    #[must_use]
    pub fn result(&self, id: &ComponentId) -> Option<Value> {
        self.results.get(id).map(|r| r.clone())
    }

    /// Drop everything cached for a component
    pub fn clear_cache(&self, id: &ComponentId) {
        self.debouncer.cancel(id);
        self.results.remove(id);
        self.executed_hashes.remove(id);
        self.sequences.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_config::{ChangeSource, ConfigSection};
    use card_store::UpdateOptions;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::time::{advance, sleep};

    /// Executor that records calls and sleeps a scripted duration per call
    struct ScriptedExecutor {
        delays: Mutex<Vec<Duration>>,
        calls: AtomicU64,
    }

    impl ScriptedExecutor {
        fn new(delays: Vec<Duration>) -> Self {
            Self {
                delays: Mutex::new(delays),
                calls: AtomicU64::new(0),
            }
        }

        fn immediate() -> Self {
            Self::new(Vec::new())
        }

        fn call_count(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl DataSourceExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            _id: &ComponentId,
            _component_type: Option<&str>,
            config: &WidgetConfiguration,
        ) -> Result<Value, ExecutionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = {
                let mut delays = self.delays.lock();
                if delays.is_empty() {
                    Duration::ZERO
                } else {
                    delays.remove(0)
                }
            };
            if delay > Duration::ZERO {
                sleep(delay).await;
            }
            Ok(json!({
                "call": call,
                "title": config.base.title.clone().unwrap_or_default(),
            }))
        }
    }

    fn gateway_with(
        executor: Arc<ScriptedExecutor>,
    ) -> (Arc<ConfigStateManager>, Arc<DataSourceGateway>) {
        let bus = Arc::new(ConfigEventBus::new());
        let store = Arc::new(ConfigStateManager::new(bus));
        let gateway = Arc::new(DataSourceGateway::new(
            Arc::clone(&store),
            executor as Arc<dyn DataSourceExecutor>,
        ));
        (store, gateway)
    }

    fn set_title(store: &ConfigStateManager, id: &ComponentId, title: &str) {
        store
            .update_section(
                id,
                ConfigSection::Base,
                json!({ "title": title }),
                ChangeSource::User,
                UpdateOptions {
                    skip_validation: true,
                    ..UpdateOptions::default()
                },
            )
            .unwrap();
    }

    async fn yield_a_few_times() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_requests_collapse_to_one_execution() {
        let executor = Arc::new(ScriptedExecutor::immediate());
        let (store, gateway) = gateway_with(Arc::clone(&executor));
        let id = ComponentId::from("w1");
        store.initialize_configuration(&id);

        for _ in 0..5 {
            gateway.request_execution(&id, None);
            advance(Duration::from_millis(10)).await;
        }
        advance(gateway.options().execution_delay + Duration::from_millis(10)).await;
        yield_a_few_times().await;

        assert_eq!(executor.call_count(), 1);
        assert!(gateway.result(&id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_hash_skips_refetch() {
        let executor = Arc::new(ScriptedExecutor::immediate());
        let (store, gateway) = gateway_with(Arc::clone(&executor));
        let id = ComponentId::from("w1");
        store.initialize_configuration(&id);

        gateway.request_execution(&id, None);
        advance(gateway.options().execution_delay + Duration::from_millis(10)).await;
        yield_a_few_times().await;
        assert_eq!(executor.call_count(), 1);

        // Same configuration again: coalesced by hash.
        gateway.request_execution(&id, None);
        advance(gateway.options().execution_delay + Duration::from_millis(10)).await;
        yield_a_few_times().await;
        assert_eq!(executor.call_count(), 1);

        // A real change re-executes.
        set_title(&store, &id, "changed");
        advance(store.options().notify_delay + Duration::from_millis(5)).await;
        gateway.request_execution(&id, None);
        advance(gateway.options().execution_delay + Duration::from_millis(10)).await;
        yield_a_few_times().await;
        assert_eq!(executor.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_result_is_discarded() {
        // First fetch is slow, second is immediate.
        let executor = Arc::new(ScriptedExecutor::new(vec![
            Duration::from_millis(500),
            Duration::ZERO,
        ]));
        let (store, gateway) = gateway_with(Arc::clone(&executor));
        let id = ComponentId::from("w1");
        store.initialize_configuration(&id);

        // Request 1 fires at t=300 and sleeps 500ms (completes t=800).
        gateway.request_execution(&id, None);
        advance(gateway.options().execution_delay + Duration::from_millis(10)).await;
        yield_a_few_times().await;

        // Change the config and request again; request 2 fires ~t=650 and
        // completes immediately, bumping the sequence past request 1.
        set_title(&store, &id, "newer");
        advance(store.options().notify_delay + Duration::from_millis(5)).await;
        gateway.request_execution(&id, None);
        advance(gateway.options().execution_delay + Duration::from_millis(10)).await;
        yield_a_few_times().await;

        // Let the slow first fetch complete.
        advance(Duration::from_millis(500)).await;
        yield_a_few_times().await;

        assert_eq!(executor.call_count(), 2);
        let result = gateway.result(&id).unwrap();
        // The newer (second) result won; the slow call 0 was discarded.
        assert_eq!(result["call"], json!(1));
        assert_eq!(result["title"], json!("newer"));
    }

    #[tokio::test(start_paused = true)]
    async fn bus_listener_drives_execution() {
        let executor = Arc::new(ScriptedExecutor::immediate());
        let bus = Arc::new(ConfigEventBus::new());
        let store = Arc::new(ConfigStateManager::new(Arc::clone(&bus)));
        let gateway = Arc::new(DataSourceGateway::new(
            Arc::clone(&store),
            Arc::clone(&executor) as Arc<dyn DataSourceExecutor>,
        ));
        let listener = Arc::clone(&gateway).spawn_bus_listener(&bus);

        let id = ComponentId::from("w1");
        store
            .update_section(
                &id,
                ConfigSection::DataSource,
                json!({"type": "api", "url": "https://api.example/t"}),
                ChangeSource::User,
                UpdateOptions {
                    context: card_events::EventContext {
                        should_trigger_execution: true,
                        changed_fields: Vec::new(),
                    },
                    ..UpdateOptions::default()
                },
            )
            .unwrap();

        advance(store.options().notify_delay + Duration::from_millis(5)).await;
        yield_a_few_times().await;
        advance(gateway.options().execution_delay + Duration::from_millis(10)).await;
        yield_a_few_times().await;

        assert_eq!(executor.call_count(), 1);
        assert!(gateway.result(&id).is_some());
        listener.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cache_forgets_component() {
        let executor = Arc::new(ScriptedExecutor::immediate());
        let (store, gateway) = gateway_with(Arc::clone(&executor));
        let id = ComponentId::from("w1");
        store.initialize_configuration(&id);

        gateway.request_execution(&id, None);
        advance(gateway.options().execution_delay + Duration::from_millis(10)).await;
        yield_a_few_times().await;
        assert!(gateway.result(&id).is_some());

        gateway.clear_cache(&id);
        assert!(gateway.result(&id).is_none());

        // Cache cleared: the same configuration fetches again.
        gateway.request_execution(&id, None);
        advance(gateway.options().execution_delay + Duration::from_millis(10)).await;
        yield_a_few_times().await;
        assert_eq!(executor.call_count(), 2);
    }
}
