//! Widget configuration document model
//!
//! A [`WidgetConfiguration`] is the unit of persisted state per widget
//! instance: four independently-owned layers (`base`, `component`,
//! `dataSource`, `interaction`) plus bookkeeping `metadata`. All four
//! layers are always present (possibly empty) after initialization.
//!
//! Known fields are typed; each layer keeps a flattened `extra` escape
//! hatch for genuinely free-form widget properties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::hash::ConfigHash;
use crate::interaction::InteractionConfig;

/// Schema version stamped into newly created documents
pub const SCHEMA_VERSION: &str = "2.1.0";

/// One independently-owned slice of a widget's configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigSection {
    /// Display/style/layout and device-binding fields
    Base,
    /// Component-type-specific free-form properties
    Component,
    /// Data acquisition configuration
    DataSource,
    /// Declarative interaction rules
    Interaction,
}

impl ConfigSection {
    /// All sections, in canonical order
    pub const ALL: [ConfigSection; 4] = [
        ConfigSection::Base,
        ConfigSection::Component,
        ConfigSection::DataSource,
        ConfigSection::Interaction,
    ];

    /// The section's JSON field name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ConfigSection::Base => "base",
            ConfigSection::Component => "component",
            ConfigSection::DataSource => "dataSource",
            ConfigSection::Interaction => "interaction",
        }
    }
}

impl Display for ConfigSection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigSection {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(ConfigSection::Base),
            "component" => Ok(ConfigSection::Component),
            "dataSource" => Ok(ConfigSection::DataSource),
            "interaction" => Ok(ConfigSection::Interaction),
            other => Err(DocumentError::UnknownSection(other.to_string())),
        }
    }
}

/// Origin of a configuration change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeSource {
    /// Direct user edit in a configuration panel
    #[default]
    User,
    /// Internal write (migration, template application, defaults)
    System,
    /// Document import
    Import,
    /// Version-history rollback
    Restore,
    /// Cross-component interaction response
    Interaction,
}

/// Edge spacing in pixels (padding/margin)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Spacing {
    /// Top edge
    pub top: f64,
    /// Right edge
    pub right: f64,
    /// Bottom edge
    pub bottom: f64,
    /// Left edge
    pub left: f64,
}

/// Base layer: display, style, layout and device binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseConfig {
    /// Widget title shown in the header
    pub title: Option<String>,
    /// Whether the widget is rendered at all
    pub visible: bool,
    /// Opacity in `[0, 1]`
    pub opacity: f64,
    /// Background color (CSS color string)
    pub background_color: Option<String>,
    /// Border width in pixels
    pub border_width: Option<f64>,
    /// Border color (CSS color string)
    pub border_color: Option<String>,
    /// Border corner radius in pixels
    pub border_radius: Option<f64>,
    /// Inner spacing
    pub padding: Option<Spacing>,
    /// Outer spacing
    pub margin: Option<Spacing>,
    /// Bound device identifier
    pub device_id: Option<String>,
    /// Bound device metric keys
    pub metrics_list: Vec<String>,
    /// Free-form escape hatch for additional base properties
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            title: None,
            visible: true,
            opacity: 1.0,
            background_color: None,
            border_width: None,
            border_color: None,
            border_radius: None,
            padding: None,
            margin: None,
            device_id: None,
            metrics_list: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// Component layer: free-form per-widget-type properties
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// The component property map (opaque to the core)
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl ComponentConfig {
    /// Look up a property by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Set a property, returning the previous value
    #[inline]
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.properties.insert(name.into(), value)
    }

    /// Remove a property, returning its value
    #[inline]
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Check whether the layer carries no properties
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Aggregation applied to fetched telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    /// Most recent sample
    #[default]
    Latest,
    /// Arithmetic mean
    Avg,
    /// Minimum
    Min,
    /// Maximum
    Max,
    /// Sum
    Sum,
    /// Sample count
    Count,
}

/// Mapping of one fetched field onto a display field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Dotted path within the fetched payload
    pub source: String,
    /// Dotted path within the display data
    pub target: String,
}

/// Data-source layer, structurally polymorphic by `type` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DataSourceConfig {
    /// Inline static data, no fetching
    Static {
        /// The literal payload
        #[serde(default)]
        data: Value,
    },
    /// HTTP polling source
    #[serde(rename_all = "camelCase")]
    Api {
        /// Endpoint URL
        url: String,
        /// Device query parameters
        #[serde(default)]
        query: Map<String, Value>,
        /// Aggregation applied server- or client-side
        #[serde(default)]
        aggregate: Aggregation,
        /// Polling interval in milliseconds
        #[serde(default)]
        refresh_interval_ms: Option<u64>,
    },
    /// Push source over a websocket topic
    Websocket {
        /// Endpoint URL
        url: String,
        /// Optional topic filter
        #[serde(default)]
        topic: Option<String>,
    },
    /// Several sources merged into one payload
    MultiSource {
        /// Constituent sources, merged in order
        sources: Vec<DataSourceConfig>,
    },
    /// Field remapping over another payload shape
    DataMapping {
        /// Field mappings applied in order
        #[serde(default)]
        mappings: Vec<FieldMapping>,
    },
    /// Free-form bindings of component properties to source fields
    DataSourceBindings {
        /// Property-name → binding descriptor
        #[serde(default)]
        bindings: Map<String, Value>,
    },
}

impl DataSourceConfig {
    /// The `type` tag value
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            DataSourceConfig::Static { .. } => "static",
            DataSourceConfig::Api { .. } => "api",
            DataSourceConfig::Websocket { .. } => "websocket",
            DataSourceConfig::MultiSource { .. } => "multi-source",
            DataSourceConfig::DataMapping { .. } => "data-mapping",
            DataSourceConfig::DataSourceBindings { .. } => "data-source-bindings",
        }
    }

    /// Whether this source reaches out to an external collaborator
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        match self {
            DataSourceConfig::Api { .. } | DataSourceConfig::Websocket { .. } => true,
            DataSourceConfig::MultiSource { sources } => {
                sources.iter().any(DataSourceConfig::is_fetching)
            }
            _ => false,
        }
    }
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        DataSourceConfig::Static { data: Value::Null }
    }
}

/// Document bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigMetadata {
    /// Schema version string
    pub version: String,
    /// Creation timestamp (volatile: excluded from the content hash)
    pub created_at: Option<DateTime<Utc>>,
    /// Last-update timestamp (volatile: excluded from the content hash)
    pub updated_at: Option<DateTime<Utc>>,
    /// Marker written by the device-field migration
    pub migration_version: Option<String>,
    /// When the device-field migration ran
    pub migrated_at: Option<DateTime<Utc>>,
    /// Stamp written by forced updates to perturb the content hash
    pub forced_update_at: Option<DateTime<Utc>>,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            created_at: None,
            updated_at: None,
            migration_version: None,
            migrated_at: None,
            forced_update_at: None,
        }
    }
}

/// The persisted configuration of one widget instance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfiguration {
    /// Display/style/device-binding layer
    pub base: BaseConfig,
    /// Component-specific layer
    pub component: ComponentConfig,
    /// Data acquisition layer
    pub data_source: DataSourceConfig,
    /// Ordered interaction rules
    pub interaction: Vec<InteractionConfig>,
    /// Bookkeeping
    pub metadata: ConfigMetadata,
}

impl WidgetConfiguration {
    /// Create an empty default document stamped with the current time
    #[must_use]
    pub fn empty() -> Self {
        Self {
            metadata: ConfigMetadata {
                created_at: Some(Utc::now()),
                ..ConfigMetadata::default()
            },
            ..Self::default()
        }
    }

    /// Content hash of the canonical form
    #[must_use]
    pub fn content_hash(&self) -> ConfigHash {
        // A typed document always serializes; treat failure as unreachable
        // by hashing the error message, which still yields a stable digest.
        match ConfigHash::of_serializable(self) {
            Ok(hash) => hash,
            Err(err) => ConfigHash::compute(err.to_string().as_bytes()),
        }
    }

    /// Extract one section as a JSON value
    ///
    /// # Errors
    /// Returns error if the section fails to serialize
    pub fn section_value(&self, section: ConfigSection) -> Result<Value, DocumentError> {
        let value = match section {
            ConfigSection::Base => serde_json::to_value(&self.base)?,
            ConfigSection::Component => serde_json::to_value(&self.component)?,
            ConfigSection::DataSource => serde_json::to_value(&self.data_source)?,
            ConfigSection::Interaction => serde_json::to_value(&self.interaction)?,
        };
        Ok(value)
    }

    /// Replace one section from a JSON value, leaving the others untouched
    ///
    /// # Errors
    /// Returns error if the value does not match the section's shape
    pub fn replace_section(
        &mut self,
        section: ConfigSection,
        value: Value,
    ) -> Result<(), DocumentError> {
        match section {
            ConfigSection::Base => self.base = serde_json::from_value(value)?,
            ConfigSection::Component => self.component = serde_json::from_value(value)?,
            ConfigSection::DataSource => self.data_source = serde_json::from_value(value)?,
            ConfigSection::Interaction => self.interaction = serde_json::from_value(value)?,
        }
        Ok(())
    }

    /// Stamp the last-update timestamp
    #[inline]
    pub fn touch(&mut self) {
        self.metadata.updated_at = Some(Utc::now());
    }

    /// Stamp the forced-update marker so the content hash perturbs
    #[inline]
    pub fn stamp_forced_update(&mut self) {
        self.metadata.forced_update_at = Some(Utc::now());
    }

    /// Serialize the full document
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_value(&self) -> Result<Value, DocumentError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize a full document
    ///
    /// # Errors
    /// Returns error if the value does not match the document shape
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Errors related to configuration documents
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Serialization/deserialization failure
    #[error("document serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Unknown configuration section name
    #[error("unknown configuration section: {0}")]
    UnknownSection(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_has_all_sections() {
        let doc = WidgetConfiguration::empty();
        let value = doc.to_value().unwrap();
        for section in ConfigSection::ALL {
            assert!(
                value.get(section.as_str()).is_some(),
                "missing section {section}"
            );
        }
    }

    #[test]
    fn section_roundtrip() {
        let mut doc = WidgetConfiguration::empty();
        doc.replace_section(ConfigSection::Base, json!({"title": "Temp Sensor"}))
            .unwrap();
        assert_eq!(doc.base.title.as_deref(), Some("Temp Sensor"));
        // Untouched defaults survive a partial value.
        assert!(doc.base.visible);

        let value = doc.section_value(ConfigSection::Base).unwrap();
        assert_eq!(value["title"], json!("Temp Sensor"));
    }

    #[test]
    fn section_isolation_on_replace() {
        let mut doc = WidgetConfiguration::empty();
        doc.base.title = Some("before".to_string());
        doc.replace_section(ConfigSection::Component, json!({"color": "#f00"}))
            .unwrap();
        assert_eq!(doc.base.title.as_deref(), Some("before"));
        assert_eq!(doc.component.get("color"), Some(&json!("#f00")));
    }

    #[test]
    fn content_hash_stable_under_updated_at() {
        let mut doc = WidgetConfiguration::empty();
        let before = doc.content_hash();
        doc.touch();
        assert_eq!(before, doc.content_hash());
    }

    #[test]
    fn content_hash_perturbed_by_forced_stamp() {
        let mut doc = WidgetConfiguration::empty();
        let before = doc.content_hash();
        doc.stamp_forced_update();
        assert_ne!(before, doc.content_hash());
    }

    #[test]
    fn data_source_tag_names() {
        let api = DataSourceConfig::Api {
            url: "https://api.example/telemetry".to_string(),
            query: Map::new(),
            aggregate: Aggregation::Avg,
            refresh_interval_ms: Some(5_000),
        };
        let value = serde_json::to_value(&api).unwrap();
        assert_eq!(value["type"], json!("api"));
        assert_eq!(value["refreshIntervalMs"], json!(5_000));

        let multi = DataSourceConfig::MultiSource { sources: vec![api] };
        let value = serde_json::to_value(&multi).unwrap();
        assert_eq!(value["type"], json!("multi-source"));
    }

    #[test]
    fn data_source_default_is_static() {
        let ds = DataSourceConfig::default();
        assert_eq!(ds.type_name(), "static");
        assert!(!ds.is_fetching());
    }

    #[test]
    fn multi_source_is_fetching_if_any_member_is() {
        let ds = DataSourceConfig::MultiSource {
            sources: vec![
                DataSourceConfig::Static { data: json!(1) },
                DataSourceConfig::Websocket {
                    url: "wss://example".to_string(),
                    topic: None,
                },
            ],
        };
        assert!(ds.is_fetching());
    }

    #[test]
    fn base_extra_fields_roundtrip() {
        let value = json!({
            "title": "Gauge",
            "customUnit": "°C"
        });
        let base: BaseConfig = serde_json::from_value(value).unwrap();
        assert_eq!(base.extra.get("customUnit"), Some(&json!("°C")));

        let back = serde_json::to_value(&base).unwrap();
        assert_eq!(back["customUnit"], json!("°C"));
    }

    #[test]
    fn change_source_serializes_camel_case() {
        assert_eq!(
            serde_json::to_value(ChangeSource::Interaction).unwrap(),
            json!("interaction")
        );
    }

    #[test]
    fn section_from_str() {
        assert_eq!(
            "dataSource".parse::<ConfigSection>().unwrap(),
            ConfigSection::DataSource
        );
        assert!("styles".parse::<ConfigSection>().is_err());
    }
}
