//! Card Configuration Model
//!
//! Typed widget-configuration documents with content-addressed hashing.
//!
//! # Core Concepts
//!
//! - [`WidgetConfiguration`]: the four-layer document persisted per widget
//! - [`ConfigSection`]: one independently-owned layer (base / component /
//!   dataSource / interaction)
//! - [`ConfigHash`]: 32-byte Blake3 digest of the canonical form, used to
//!   detect no-op updates everywhere
//! - [`PropertyPath`]: dotted addressing within documents
//! - [`InteractionConfig`]: declarative interaction rules
//! - [`diff_values`]: recursive field-level diff
//!
//! # Example
//!
//! ```rust
//! use card_config::{ConfigSection, WidgetConfiguration};
//! use serde_json::json;
//!
//! let mut doc = WidgetConfiguration::empty();
//! doc.replace_section(ConfigSection::Base, json!({"title": "Temp Sensor"}))
//!     .unwrap();
//!
//! // Volatile timestamps never change the content hash.
//! let hash = doc.content_hash();
//! doc.touch();
//! assert_eq!(hash, doc.content_hash());
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod canonical;
mod diff;
mod document;
mod hash;
mod ids;
mod interaction;
mod path;

// Re-exports
pub use diff::{changed_paths, diff_values, FieldChange};
pub use ids::ComponentId;
pub use document::{
    Aggregation, BaseConfig, ChangeSource, ComponentConfig, ConfigMetadata, ConfigSection,
    DataSourceConfig, DocumentError, FieldMapping, Spacing, WidgetConfiguration, SCHEMA_VERSION,
};
pub use hash::{ConfigHash, HashError};
pub use interaction::{
    ComparisonOperator, Condition, InteractionConfig, InteractionDefect, InteractionResponse,
    JumpConfig, JumpTarget, ModifyConfig, TriggerEvent,
};
pub use path::{PathError, PropertyPath};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_import_export_hash_stable() {
        let mut doc = WidgetConfiguration::empty();
        doc.base.title = Some("Humidity".to_string());
        doc.component.set("color", json!("#00ff00"));

        let exported = serde_json::to_string(&doc).unwrap();
        let imported = WidgetConfiguration::from_value(
            serde_json::from_str(&exported).unwrap(),
        )
        .unwrap();

        assert_eq!(doc.content_hash(), imported.content_hash());
    }

    #[test]
    fn section_value_feeds_diff() {
        let mut old = WidgetConfiguration::empty();
        old.base.title = Some("A".to_string());
        let mut new = old.clone();
        new.base.title = Some("B".to_string());

        let changes = diff_values(
            &old.section_value(ConfigSection::Base).unwrap(),
            &new.section_value(ConfigSection::Base).unwrap(),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path(), "title");
    }
}
