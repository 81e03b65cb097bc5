//! Configuration integration bridge
//!
//! The single write path every caller (panels, interaction engine,
//! import/migration code) goes through. Owns the cross-cutting behaviors
//! the store does not know about: dedup-before-dispatch, burst coalescing
//! for non-base sections, the execution-trigger heuristic, the one-time
//! legacy migration, and forced cross-component updates.

use crate::migration;
use crate::triggers::TriggerRegistry;
use card_config::{ChangeSource, ComponentId, ConfigHash, ConfigSection, WidgetConfiguration};
use card_events::{Debouncer, EventContext};
use card_store::{ConfigStateManager, StoreError, UpdateOptions};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Bridge tunables
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Window within which identical updates are suppressed and non-base
    /// bursts coalesce
    pub dedup_window: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DedupEntry {
    hash: ConfigHash,
    at: Instant,
}

/// Errors surfaced by the bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The underlying store rejected the write
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The single configuration write path
pub struct ConfigIntegrationBridge {
    store: Arc<ConfigStateManager>,
    triggers: TriggerRegistry,
    dedup: DashMap<(ComponentId, ConfigSection), DedupEntry>,
    coalescer: Debouncer<(ComponentId, ConfigSection)>,
    options: BridgeOptions,
}

impl std::fmt::Debug for ConfigIntegrationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigIntegrationBridge")
            .field("dedup_entries", &self.dedup.len())
            .finish_non_exhaustive()
    }
}

impl ConfigIntegrationBridge {
    /// Create a bridge over a store with default options
    #[must_use]
    pub fn new(store: Arc<ConfigStateManager>) -> Self {
        Self::with_options(store, BridgeOptions::default())
    }

    /// Create a bridge with explicit tunables
    #[must_use]
    pub fn with_options(store: Arc<ConfigStateManager>, options: BridgeOptions) -> Self {
        Self {
            store,
            triggers: TriggerRegistry::with_defaults(),
            dedup: DashMap::new(),
            coalescer: Debouncer::new(options.dedup_window),
            options,
        }
    }

    /// The underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<ConfigStateManager> {
        &self.store
    }

    /// The execution-trigger registry (widget catalogs register their
    /// data-binding parameters here)
    #[inline]
    #[must_use]
    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    /// Whether a change to `section` carrying `value` must re-execute the
    /// data source
    #[must_use]
    pub fn should_trigger_data_execution(&self, section: ConfigSection, value: &Value) -> bool {
        self.triggers.should_trigger_for_value(section, value)
    }

    /// Migration-aware read
    ///
    /// A legacy-shaped document is migrated and written back once; if the
    /// write-back fails (e.g. validation), the un-migrated document is
    /// returned and the condition logged — a read never hard-fails on a
    /// legacy-shape quirk.
    #[must_use]
    pub fn get_configuration(&self, id: &ComponentId) -> Option<WidgetConfiguration> {
        let config = self.store.get_configuration(id)?;
        if !migration::needs_migration(&config) {
            return Some(config);
        }

        let mut migrated = config.clone();
        migration::migrate_device_fields(&mut migrated);
        match self
            .store
            .set_configuration(id, migrated.clone(), ChangeSource::System, true)
        {
            Ok(_) => Some(migrated),
            Err(err) => {
                warn!(component = %id, error = %err, "migration write-back failed; serving legacy shape");
                Some(config)
            }
        }
    }

    /// Section update through the dedup/coalescing front
    ///
    /// - identical content within the dedup window: suppressed outright
    ///   (never reaches the store), returns `Ok(false)`
    /// - different content, non-`base` section: coalesced — only the last
    ///   update of a burst proceeds, after the window settles
    /// - `base` section: dispatched immediately (device-binding edits must
    ///   not be lost)
    ///
    /// # Errors
    /// Immediate dispatches surface store errors; coalesced dispatch
    /// failures are logged (the caller has long since moved on).
    pub fn update_configuration(
        &self,
        id: &ComponentId,
        section: ConfigSection,
        value: Value,
        source: ChangeSource,
    ) -> Result<bool, BridgeError> {
        self.ensure_migrated(id);

        let content_hash = ConfigHash::of_value(&value);
        let key = (id.clone(), section);
        let now = Instant::now();

        if let Some(entry) = self.dedup.get(&key) {
            if entry.hash == content_hash && now.duration_since(entry.at) < self.options.dedup_window
            {
                debug!(component = %id, %section, "duplicate update suppressed in dedup window");
                return Ok(false);
            }
        }
        self.dedup.insert(
            key.clone(),
            DedupEntry {
                hash: content_hash,
                at: now,
            },
        );

        let context = EventContext {
            should_trigger_execution: self.triggers.should_trigger_for_value(section, &value),
            changed_fields: Vec::new(),
        };
        let opts = UpdateOptions {
            context,
            ..UpdateOptions::default()
        };

        if section == ConfigSection::Base {
            return Ok(self.store.update_section(id, section, value, source, opts)?);
        }

        // Non-base burst: defer; a newer update within the window replaces
        // this one, so only the last of the burst reaches the store.
        let store = Arc::clone(&self.store);
        let component = id.clone();
        self.coalescer.schedule(key, move || async move {
            match store.update_section(&component, section, value, source, opts) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(component = %component, %section, "coalesced update was a no-op");
                }
                Err(err) => {
                    warn!(component = %component, %section, error = %err, "coalesced update failed");
                }
            }
        });
        Ok(true)
    }

    /// Forced cross-component update from an interaction response
    ///
    /// Bypasses the dedup cache entirely and reaches the store with
    /// `force`, so the target observes the write even when the content
    /// hash collides with its previous value.
    ///
    /// # Errors
    /// Surfaces store errors (validation, shape mismatch).
    pub fn update_for_interaction(
        &self,
        target: &ComponentId,
        section: ConfigSection,
        value: Value,
    ) -> Result<bool, BridgeError> {
        self.ensure_migrated(target);

        let context = EventContext {
            should_trigger_execution: self.triggers.should_trigger_for_value(section, &value),
            changed_fields: Vec::new(),
        };
        let opts = UpdateOptions {
            force: true,
            context,
            ..UpdateOptions::default()
        };
        Ok(self
            .store
            .update_section(target, section, value, ChangeSource::Interaction, opts)?)
    }

    /// Release bridge state owned by a removed component
    pub fn remove_component(&self, id: &ComponentId) {
        self.dedup.retain(|(component, _), _| component != id);
        for section in ConfigSection::ALL {
            self.coalescer.cancel(&(id.clone(), section));
        }
    }

    /// Run the one-time migration if the stored document still carries the
    /// legacy shape
    fn ensure_migrated(&self, id: &ComponentId) {
        let Some(config) = self.store.get_configuration(id) else {
            return;
        };
        if !migration::needs_migration(&config) {
            return;
        }
        let mut migrated = config;
        migration::migrate_device_fields(&mut migrated);
        if let Err(err) = self
            .store
            .set_configuration(id, migrated, ChangeSource::System, true)
        {
            warn!(component = %id, error = %err, "legacy migration failed; leaving document as-is");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_events::ConfigEventBus;
    use serde_json::json;
    use tokio::time::advance;

    fn bridge() -> (Arc<ConfigEventBus>, Arc<ConfigStateManager>, ConfigIntegrationBridge) {
        let bus = Arc::new(ConfigEventBus::new());
        let store = Arc::new(ConfigStateManager::new(Arc::clone(&bus)));
        let bridge = ConfigIntegrationBridge::new(Arc::clone(&store));
        (bus, store, bridge)
    }

    /// Let the coalescing window and the store's notify debounce both fire
    async fn settle(bridge: &ConfigIntegrationBridge) {
        advance(bridge.options.dedup_window + Duration::from_millis(5)).await;
        tokio::task::yield_now().await;
        advance(bridge.store.options().notify_delay + Duration::from_millis(5)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn base_updates_dispatch_immediately() {
        let (_bus, store, bridge) = bridge();
        let id = ComponentId::from("w1");

        assert!(bridge
            .update_configuration(&id, ConfigSection::Base, json!({"title": "Temp"}), ChangeSource::User)
            .unwrap());
        // Version bumped before any window elapsed.
        assert_eq!(store.current_version(&id).unwrap().version, 2);
        settle(&bridge).await;
    }

    #[tokio::test(start_paused = true)]
    async fn identical_update_in_window_is_suppressed() {
        let (_bus, store, bridge) = bridge();
        let id = ComponentId::from("w1");

        assert!(bridge
            .update_configuration(&id, ConfigSection::Base, json!({"title": "Temp"}), ChangeSource::User)
            .unwrap());
        // Same payload, still inside the window: suppressed before the store.
        assert!(!bridge
            .update_configuration(&id, ConfigSection::Base, json!({"title": "Temp"}), ChangeSource::User)
            .unwrap());
        assert_eq!(store.current_version(&id).unwrap().version, 2);
        settle(&bridge).await;
    }

    #[tokio::test(start_paused = true)]
    async fn different_content_in_window_is_allowed_for_base() {
        let (_bus, store, bridge) = bridge();
        let id = ComponentId::from("w1");

        bridge
            .update_configuration(&id, ConfigSection::Base, json!({"title": "a"}), ChangeSource::User)
            .unwrap();
        settle(&bridge).await;
        // Different payload inside a fresh window: not suppressed. The
        // store applies it immediately (base is never coalesced).
        assert!(bridge
            .update_configuration(&id, ConfigSection::Base, json!({"title": "b"}), ChangeSource::User)
            .unwrap());
        settle(&bridge).await;
        assert_eq!(
            store.get_configuration(&id).unwrap().base.title.as_deref(),
            Some("b")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn component_burst_coalesces_to_last() {
        let (_bus, store, bridge) = bridge();
        let id = ComponentId::from("w1");
        store.initialize_configuration(&id);

        for color in ["#111", "#222", "#333"] {
            bridge
                .update_configuration(&id, ConfigSection::Component, json!({"color": color}), ChangeSource::User)
                .unwrap();
            advance(Duration::from_millis(5)).await;
        }
        settle(&bridge).await;

        let config = store.get_configuration(&id).unwrap();
        assert_eq!(config.component.get("color"), Some(&json!("#333")));
        // One write: initial version 1 plus a single burst write.
        assert_eq!(store.current_version(&id).unwrap().version, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_interaction_update_bypasses_dedup() {
        let (bus, _store, bridge) = bridge();
        let id = ComponentId::from("w3");
        let (_, mut rx) = bus.subscribe(&id);

        assert!(bridge
            .update_for_interaction(&id, ConfigSection::Component, json!({"color": "#f00"}))
            .unwrap());
        settle(&bridge).await;
        assert!(bridge
            .update_for_interaction(&id, ConfigSection::Component, json!({"color": "#f00"}))
            .unwrap());
        settle(&bridge).await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn data_source_change_flags_execution() {
        let (bus, _store, bridge) = bridge();
        let id = ComponentId::from("w1");
        let (_, mut rx) = bus.subscribe(&id);

        bridge
            .update_configuration(
                &id,
                ConfigSection::DataSource,
                json!({"type": "api", "url": "https://api.example/t"}),
                ChangeSource::User,
            )
            .unwrap();
        settle(&bridge).await;

        let event = rx.try_recv().unwrap();
        assert!(event.context.should_trigger_execution);
    }

    #[tokio::test(start_paused = true)]
    async fn base_title_change_does_not_flag_execution() {
        let (bus, _store, bridge) = bridge();
        let id = ComponentId::from("w1");
        let (_, mut rx) = bus.subscribe(&id);

        bridge
            .update_configuration(&id, ConfigSection::Base, json!({"title": "x"}), ChangeSource::User)
            .unwrap();
        settle(&bridge).await;

        assert!(!rx.try_recv().unwrap().context.should_trigger_execution);
    }

    #[tokio::test(start_paused = true)]
    async fn base_device_change_flags_execution() {
        let (bus, _store, bridge) = bridge();
        let id = ComponentId::from("w1");
        let (_, mut rx) = bus.subscribe(&id);

        bridge
            .update_configuration(&id, ConfigSection::Base, json!({"deviceId": "dev-1"}), ChangeSource::User)
            .unwrap();
        settle(&bridge).await;

        assert!(rx.try_recv().unwrap().context.should_trigger_execution);
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_document_migrates_on_read() {
        let (_bus, store, bridge) = bridge();
        let id = ComponentId::from("w1");

        let mut legacy = WidgetConfiguration::empty();
        legacy.component.set("deviceId", json!("dev-5"));
        store
            .set_configuration(&id, legacy, ChangeSource::Import, false)
            .unwrap();
        settle(&bridge).await;

        let config = bridge.get_configuration(&id).unwrap();
        assert_eq!(config.base.device_id.as_deref(), Some("dev-5"));
        assert!(config.component.get("deviceId").is_none());
        settle(&bridge).await;

        // The migrated form was written back exactly once.
        let stored = store.get_configuration(&id).unwrap();
        assert_eq!(stored.base.device_id.as_deref(), Some("dev-5"));
        let version_after = store.current_version(&id).unwrap().version;

        let _ = bridge.get_configuration(&id).unwrap();
        settle(&bridge).await;
        assert_eq!(store.current_version(&id).unwrap().version, version_after);
    }
}
