//! The authoritative configuration state manager
//!
//! Versioned store of `componentId → ConfigurationState` with:
//! - content-hash dedup (no-op writes never version or notify)
//! - composite `(component, section)` write locks; a contended write is
//!   rejected, not queued (latest-write-wins is deliberate — the next
//!   write carries the full latest state anyway)
//! - debounced change notification; the lock is released only after the
//!   debounced event fired
//! - bounded version history with in-memory snapshots for rollback
//! - a priority-ordered validation rule engine with a TTL result cache
//! - parameterized configuration templates

use crate::cache::ValidationCache;
use crate::state::{ConfigVersion, ConfigurationState, DEFAULT_HISTORY_CAP};
use crate::template::{ConfigTemplate, TemplateError, TemplateRegistry};
use crate::validation::{RuleSet, ValidationContext, ValidationReport, ValidationRule};
use card_config::{
    changed_paths, diff_values, ChangeSource, ComponentId, ConfigSection, DocumentError,
    FieldChange, WidgetConfiguration,
};
use card_events::{ConfigChangeEvent, ConfigEventBus, Debouncer, EventContext};
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Composite write-lock key: whole document (`section: None`) or one section
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteKey {
    /// Owning component
    pub component: ComponentId,
    /// Locked section, or `None` for a full-document write
    pub section: Option<ConfigSection>,
}

/// Store tunables
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Retained historic versions per component
    pub history_cap: usize,
    /// Settle delay before a change event fires
    pub notify_delay: Duration,
    /// Validation cache capacity
    pub validation_cache_capacity: u64,
    /// Validation cache TTL
    pub validation_cache_ttl: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            notify_delay: Duration::from_millis(30),
            validation_cache_capacity: 1_000,
            validation_cache_ttl: crate::cache::DEFAULT_VALIDATION_TTL,
        }
    }
}

/// Per-call options for section updates
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Bypass dedup: stamp the forced-update marker so the event always
    /// fires (used by cross-component interaction writes)
    pub force: bool,
    /// Skip the validation engine
    pub skip_validation: bool,
    /// Context attached to the emitted event; empty `changed_fields` are
    /// filled in from the structural diff
    pub context: EventContext,
    /// Widget type tag carried onto the event, when known
    pub component_type: Option<String>,
}

/// Errors surfaced by the state manager
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Error-severity validation findings blocked the write
    #[error("configuration rejected by validation: {report}")]
    ValidationRejected {
        /// The structured findings
        report: ValidationReport,
    },

    /// Component has no configuration state
    #[error("unknown component: {0}")]
    UnknownComponent(ComponentId),

    /// Version not retained (evicted from the history ring or never existed)
    #[error("version {version} not retained for component {component}")]
    UnknownVersion {
        /// Owning component
        component: ComponentId,
        /// Requested version
        version: u64,
    },

    /// Document (de)serialization failure
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Template failure
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}

/// The authoritative, versioned configuration store
pub struct ConfigStateManager {
    options: StoreOptions,
    states: DashMap<ComponentId, ConfigurationState>,
    locks: Arc<DashSet<WriteKey>>,
    bus: Arc<ConfigEventBus>,
    notifier: Debouncer<WriteKey>,
    rules: RuleSet,
    validation_cache: ValidationCache,
    templates: TemplateRegistry,
}

impl std::fmt::Debug for ConfigStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStateManager")
            .field("components", &self.states.len())
            .field("held_locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl ConfigStateManager {
    /// Create a store emitting onto `bus` with default options
    #[must_use]
    pub fn new(bus: Arc<ConfigEventBus>) -> Self {
        Self::with_options(bus, StoreOptions::default())
    }

    /// Create a store with explicit tunables
    #[must_use]
    pub fn with_options(bus: Arc<ConfigEventBus>, options: StoreOptions) -> Self {
        Self {
            notifier: Debouncer::new(options.notify_delay),
            validation_cache: ValidationCache::new(
                options.validation_cache_capacity,
                options.validation_cache_ttl,
            ),
            options,
            states: DashMap::new(),
            locks: Arc::new(DashSet::new()),
            bus,
            rules: RuleSet::with_defaults(),
            templates: TemplateRegistry::new(),
        }
    }

    /// The bus this store notifies on
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &Arc<ConfigEventBus> {
        &self.bus
    }

    /// Store tunables
    #[inline]
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Create empty default state for a component; no-op if it exists
    ///
    /// Returns whether state was created. The fresh document is version 1;
    /// no change event is emitted for initialization.
    pub fn initialize_configuration(&self, id: &ComponentId) -> bool {
        match self.states.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(ConfigurationState::new(
                    WidgetConfiguration::empty(),
                    ChangeSource::System,
                    self.options.history_cap,
                ));
                debug!(component = %id, "configuration initialized");
                true
            }
        }
    }

    /// Deep copy of a component's configuration
    ///
    /// The stored document is never handed out by reference.
    #[must_use]
    pub fn get_configuration(&self, id: &ComponentId) -> Option<WidgetConfiguration> {
        self.states.get(id).map(|s| s.configuration().clone())
    }

    /// The component's current version entry
    #[must_use]
    pub fn current_version(&self, id: &ComponentId) -> Option<ConfigVersion> {
        self.states.get(id).map(|s| s.current().clone())
    }

    /// Whether state exists for the component
    #[must_use]
    pub fn contains(&self, id: &ComponentId) -> bool {
        self.states.contains_key(id)
    }

    /// Ids of all live components, sorted
    #[must_use]
    pub fn component_ids(&self) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = self.states.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Full-document replace
    ///
    /// Dedups by content hash, rejects when the component's document lock
    /// is held, snapshots the prior version and schedules debounced
    /// per-section change events.
    ///
    /// Returns `Ok(true)` when a new version was recorded; `Ok(false)` on
    /// dedup or lock contention.
    ///
    /// # Errors
    /// Returns [`StoreError::ValidationRejected`] when `validate` is set
    /// and error-severity findings exist.
    pub fn set_configuration(
        &self,
        id: &ComponentId,
        config: WidgetConfiguration,
        source: ChangeSource,
        validate: bool,
    ) -> Result<bool, StoreError> {
        self.initialize_configuration(id);

        let key = WriteKey {
            component: id.clone(),
            section: None,
        };
        if !self.locks.insert(key.clone()) {
            debug!(component = %id, "full-document write rejected: lock held");
            return Ok(false);
        }

        let outcome = self.set_locked(id, &key, config, source, validate);
        if !matches!(outcome, Ok(true)) {
            self.locks.remove(&key);
        }
        outcome
    }

    fn set_locked(
        &self,
        id: &ComponentId,
        key: &WriteKey,
        mut config: WidgetConfiguration,
        source: ChangeSource,
        validate: bool,
    ) -> Result<bool, StoreError> {
        let mut state = self
            .states
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownComponent(id.clone()))?;

        if config.content_hash() == state.hash() {
            debug!(component = %id, "full-document write deduplicated");
            return Ok(false);
        }

        if validate {
            let report = self.validate(&config, &ValidationContext::default());
            if !report.is_valid() {
                warn!(component = %id, %report, "full-document write rejected by validation");
                return Err(StoreError::ValidationRejected { report });
            }
        }

        // Collect per-section deltas before the swap.
        let mut section_events = Vec::new();
        for section in ConfigSection::ALL {
            let old_value = state.configuration().section_value(section)?;
            let new_value = config.section_value(section)?;
            if old_value != new_value {
                let changed = changed_paths(&old_value, &new_value);
                section_events.push((section, old_value, new_value, changed));
            }
        }

        config.touch();
        let version = state.record(config, source, None).version;
        drop(state);
        debug!(component = %id, version, "configuration replaced");

        let bus = Arc::clone(&self.bus);
        let locks = Arc::clone(&self.locks);
        let task_key = key.clone();
        let component = id.clone();
        self.notifier.schedule(key.clone(), move || async move {
            for (section, old_value, new_value, changed) in section_events {
                let event = ConfigChangeEvent::new(
                    component.clone(),
                    section,
                    old_value,
                    new_value,
                    source,
                )
                .with_context(EventContext {
                    should_trigger_execution: section == ConfigSection::DataSource,
                    changed_fields: changed,
                });
                bus.emit(&event);
            }
            locks.remove(&task_key);
        });

        Ok(true)
    }

    /// Partial update of exactly one section
    ///
    /// The incoming value is shallow-merged over the section's current
    /// value (so a panel sending `{"title": …}` does not clobber the rest
    /// of the base layer). Dedups on the whole-document hash unless
    /// `opts.force`; forced writes stamp the forced-update marker so they
    /// are always observable. The `(component, section)` lock is released
    /// only after the debounced event fired.
    ///
    /// # Errors
    /// Returns [`StoreError::ValidationRejected`] on blocking findings and
    /// [`StoreError::Document`] if the merged value does not fit the
    /// section's shape.
    pub fn update_section(
        &self,
        id: &ComponentId,
        section: ConfigSection,
        value: Value,
        source: ChangeSource,
        opts: UpdateOptions,
    ) -> Result<bool, StoreError> {
        self.initialize_configuration(id);

        let key = WriteKey {
            component: id.clone(),
            section: Some(section),
        };
        if !self.locks.insert(key.clone()) {
            debug!(component = %id, %section, "section write rejected: lock held");
            return Ok(false);
        }

        let outcome = self.update_section_locked(id, &key, section, value, source, &opts);
        if !matches!(outcome, Ok(true)) {
            self.locks.remove(&key);
        }
        outcome
    }

    #[allow(clippy::too_many_lines)]
    fn update_section_locked(
        &self,
        id: &ComponentId,
        key: &WriteKey,
        section: ConfigSection,
        value: Value,
        source: ChangeSource,
        opts: &UpdateOptions,
    ) -> Result<bool, StoreError> {
        let mut state = self
            .states
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownComponent(id.clone()))?;

        let old_value = state.configuration().section_value(section)?;
        let merged_value = merge_section_value(old_value.clone(), value);

        let mut next = state.configuration().clone();
        next.replace_section(section, merged_value)?;
        if opts.force {
            next.stamp_forced_update();
        }

        if !opts.force && next.content_hash() == state.hash() {
            debug!(component = %id, %section, "section write deduplicated");
            return Ok(false);
        }

        if !opts.skip_validation {
            let context = ValidationContext {
                component_type: opts.component_type.clone(),
                ..ValidationContext::default()
            };
            let report = self.validate(&next, &context);
            if !report.is_valid() {
                warn!(component = %id, %section, %report, "section write rejected by validation");
                return Err(StoreError::ValidationRejected { report });
            }
        }

        next.touch();
        let version = state.record(next, source, Some(section)).version;
        let new_value = state.configuration().section_value(section)?;
        drop(state);
        debug!(component = %id, %section, version, "section updated");

        let mut context = opts.context.clone();
        if context.changed_fields.is_empty() {
            context.changed_fields = changed_paths(&old_value, &new_value);
        }

        let mut event =
            ConfigChangeEvent::new(id.clone(), section, old_value, new_value, source)
                .with_context(context);
        if let Some(component_type) = &opts.component_type {
            event = event.with_component_type(component_type.clone());
        }

        let bus = Arc::clone(&self.bus);
        let locks = Arc::clone(&self.locks);
        let task_key = key.clone();
        self.notifier.schedule(key.clone(), move || async move {
            bus.emit(&event);
            locks.remove(&task_key);
        });

        Ok(true)
    }

    /// Release everything owned by a component
    ///
    /// State, version history, snapshots, pending notifications, held
    /// locks and component-scoped bus subscriptions go together.
    pub fn remove_configuration(&self, id: &ComponentId) -> bool {
        self.notifier.cancel(&WriteKey {
            component: id.clone(),
            section: None,
        });
        for section in ConfigSection::ALL {
            self.notifier.cancel(&WriteKey {
                component: id.clone(),
                section: Some(section),
            });
        }
        self.locks.retain(|k| k.component != *id);
        self.bus.remove_component(id);
        let removed = self.states.remove(id).is_some();
        if removed {
            debug!(component = %id, "configuration removed");
        }
        removed
    }

    /// Version history, oldest first, ending with the current version
    #[must_use]
    pub fn version_history(&self, id: &ComponentId) -> Vec<ConfigVersion> {
        self.states.get(id).map(|s| s.versions()).unwrap_or_default()
    }

    /// Roll a component back to a retained historic version
    ///
    /// The restore is recorded as a NEW version tagged
    /// [`ChangeSource::Restore`] whose content hash equals the restored
    /// version's hash.
    ///
    /// # Errors
    /// Returns [`StoreError::UnknownComponent`] / [`StoreError::UnknownVersion`]
    /// when the component or snapshot is gone.
    pub fn restore_to_version(&self, id: &ComponentId, version: u64) -> Result<bool, StoreError> {
        let snapshot = {
            let state = self
                .states
                .get(id)
                .ok_or_else(|| StoreError::UnknownComponent(id.clone()))?;
            state
                .snapshot(version)
                .cloned()
                .ok_or(StoreError::UnknownVersion {
                    component: id.clone(),
                    version,
                })?
        };
        // Restored content was valid when recorded; skip re-validation.
        self.set_configuration(id, snapshot, ChangeSource::Restore, false)
    }

    /// Recursive field-level diff between two retained versions
    ///
    /// # Errors
    /// Returns [`StoreError::UnknownComponent`] / [`StoreError::UnknownVersion`]
    /// when either snapshot is unavailable.
    pub fn compare_versions(
        &self,
        id: &ComponentId,
        v1: u64,
        v2: u64,
    ) -> Result<Vec<FieldChange>, StoreError> {
        let state = self
            .states
            .get(id)
            .ok_or_else(|| StoreError::UnknownComponent(id.clone()))?;
        let lookup = |version: u64| {
            state
                .snapshot(version)
                .ok_or(StoreError::UnknownVersion {
                    component: id.clone(),
                    version,
                })
        };
        let old = lookup(v1)?.to_value()?;
        let new = lookup(v2)?.to_value()?;
        Ok(diff_values(&old, &new))
    }

    /// Validate a configuration, consulting the TTL result cache
    #[must_use]
    pub fn validate(
        &self,
        config: &WidgetConfiguration,
        context: &ValidationContext,
    ) -> ValidationReport {
        let config_hash = config.content_hash();
        let context_hash = ValidationCache::context_hash(context);
        if let Some(report) = self.validation_cache.get(config_hash, context_hash) {
            return report;
        }
        let report = self.rules.run(config, context);
        self.validation_cache
            .insert(config_hash, context_hash, report.clone());
        report
    }

    /// Register a validation rule (drops cached reports)
    pub fn register_validation_rule(&self, rule: Arc<dyn ValidationRule>) {
        self.rules.register(rule);
        self.validation_cache.invalidate_all();
    }

    /// Register a configuration template
    pub fn register_template(&self, template: ConfigTemplate) {
        self.templates.register(template);
    }

    /// The template registry
    #[inline]
    #[must_use]
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Instantiate a template and persist the result for `id`
    ///
    /// # Errors
    /// Returns [`StoreError::Template`] on unknown ids or parameter
    /// failures, and validation errors from the write path.
    pub fn apply_template(
        &self,
        template_id: &str,
        id: &ComponentId,
        params: &serde_json::Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| TemplateError::UnknownTemplate(template_id.to_string()))?;
        let config = template.instantiate(params)?;
        self.set_configuration(id, config, ChangeSource::System, true)
    }
}

/// Shallow-merge an incoming section value over the current one
///
/// Objects merge key-by-key at the top level (panel edits are partial);
/// arrays and scalars replace wholesale (the interaction list is ordered
/// and always sent complete).
fn merge_section_value(old: Value, new: Value) -> Value {
    match (old, new) {
        (Value::Object(mut old_map), Value::Object(new_map)) => {
            for (key, value) in new_map {
                old_map.insert(key, value);
            }
            Value::Object(old_map)
        }
        (_, new) => new,
    }
}
