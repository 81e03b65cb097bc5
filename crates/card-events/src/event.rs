//! Configuration change events
//!
//! The message delivered on the bus after a configuration write settles.
//! In-process only; never wire-serialized (the serde derives exist for
//! logging and test snapshots).

use card_config::{ChangeSource, ComponentId, ConfigSection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cross-cutting context attached to a change event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventContext {
    /// Whether the data-source layer must re-fetch because of this change
    pub should_trigger_execution: bool,
    /// Dotted paths (within the section) that changed
    pub changed_fields: Vec<String>,
}

/// One settled configuration change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChangeEvent {
    /// Owning widget
    pub component_id: ComponentId,
    /// Widget type tag, when known (catalog type id)
    pub component_type: Option<String>,
    /// The section that changed
    pub section: ConfigSection,
    /// Section value before the change
    pub old_config: Value,
    /// Section value after the change
    pub new_config: Value,
    /// When the change settled
    pub timestamp: DateTime<Utc>,
    /// Who initiated the write
    pub source: ChangeSource,
    /// Cross-cutting context
    pub context: EventContext,
}

impl ConfigChangeEvent {
    /// Create an event stamped with the current time
    #[must_use]
    pub fn new(
        component_id: ComponentId,
        section: ConfigSection,
        old_config: Value,
        new_config: Value,
        source: ChangeSource,
    ) -> Self {
        Self {
            component_id,
            component_type: None,
            section,
            old_config,
            new_config,
            timestamp: Utc::now(),
            source,
            context: EventContext::default(),
        }
    }

    /// Attach the widget type tag
    #[inline]
    #[must_use]
    pub fn with_component_type(mut self, component_type: impl Into<String>) -> Self {
        self.component_type = Some(component_type.into());
        self
    }

    /// Attach cross-cutting context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: EventContext) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_config::ConfigSection;
    use serde_json::json;

    #[test]
    fn event_builder() {
        let event = ConfigChangeEvent::new(
            ComponentId::from("w1"),
            ConfigSection::Base,
            json!({}),
            json!({"title": "Temp"}),
            ChangeSource::User,
        )
        .with_component_type("line-chart")
        .with_context(EventContext {
            should_trigger_execution: true,
            changed_fields: vec!["title".to_string()],
        });

        assert_eq!(event.component_type.as_deref(), Some("line-chart"));
        assert!(event.context.should_trigger_execution);
    }
}
