//! Widget catalog
//!
//! Registry of the widget types a dashboard can place. A definition owns
//! the type's default configuration template and declares which of its
//! properties are data-binding parameters (fed into the bridge's trigger
//! registry). Rendering lives elsewhere; the catalog is configuration
//! only.

use card_bridge::TriggerRegistry;
use card_config::PropertyPath;
use card_store::{ConfigStateManager, ConfigTemplate};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Broad widget grouping shown in the editor's palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WidgetCategory {
    /// Time-series and categorical charts
    Chart,
    /// Switches, sliders, actuator controls
    Control,
    /// Text, numbers, status badges
    Information,
    /// Video and image panels
    Media,
}

/// One placeable widget type
#[derive(Debug, Clone)]
pub struct WidgetDefinition {
    /// Stable type tag (`line-chart`, `toggle-switch`, …)
    pub type_id: String,
    /// Display name
    pub name: String,
    /// Palette grouping
    pub category: WidgetCategory,
    /// Default configuration applied on placement
    pub template: ConfigTemplate,
    /// Property paths whose edits must re-execute the data source
    pub binding_params: Vec<PropertyPath>,
}

/// Registry of widget definitions by type id
#[derive(Default)]
pub struct WidgetCatalog {
    definitions: RwLock<BTreeMap<String, Arc<WidgetDefinition>>>,
}

impl fmt::Debug for WidgetCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetCatalog")
            .field("types", &self.type_ids())
            .finish()
    }
}

impl WidgetCatalog {
    /// Empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with the built-in widget set
    #[must_use]
    pub fn with_builtins() -> Self {
        let catalog = Self::new();
        for definition in crate::builtin::all() {
            catalog.register(definition);
        }
        catalog
    }

    /// Register (or replace) a widget definition
    pub fn register(&self, definition: WidgetDefinition) {
        debug!(type_id = %definition.type_id, "widget type registered");
        self.definitions
            .write()
            .insert(definition.type_id.clone(), Arc::new(definition));
    }

    /// Look up a definition by type id
    #[must_use]
    pub fn get(&self, type_id: &str) -> Option<Arc<WidgetDefinition>> {
        self.definitions.read().get(type_id).cloned()
    }

    /// All registered type ids, sorted
    #[must_use]
    pub fn type_ids(&self) -> Vec<String> {
        self.definitions.read().keys().cloned().collect()
    }

    /// Definitions in one category
    #[must_use]
    pub fn by_category(&self, category: WidgetCategory) -> Vec<Arc<WidgetDefinition>> {
        self.definitions
            .read()
            .values()
            .filter(|d| d.category == category)
            .cloned()
            .collect()
    }

    /// Number of registered definitions
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }

    /// Install every definition's template into the store and its binding
    /// parameters into the trigger registry
    pub fn install(&self, store: &ConfigStateManager, triggers: &TriggerRegistry) {
        for definition in self.definitions.read().values() {
            store.register_template(definition.template.clone());
            for path in &definition.binding_params {
                triggers.register(path.clone());
            }
        }
    }
}
