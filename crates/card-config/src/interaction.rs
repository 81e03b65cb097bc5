//! Declarative interaction rule types
//!
//! An [`InteractionConfig`] binds a trigger event (click / hover /
//! data-change) to one or more responses (navigate, or modify a property —
//! possibly on another widget). The types here are pure data; evaluation
//! and routing live in the interaction router crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Event that triggers an interaction rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerEvent {
    /// Pointer click on the widget's root element
    Click,
    /// Pointer hover over the widget's root element
    Hover,
    /// A watched display-data property changed value
    DataChange,
}

impl Display for TriggerEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerEvent::Click => "click",
            TriggerEvent::Hover => "hover",
            TriggerEvent::DataChange => "dataChange",
        };
        f.write_str(name)
    }
}

/// Comparison operator for `comparison` conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    /// String-coerced equality
    Equals,
    /// String-coerced inequality
    NotEquals,
    /// Numeric-coerced ordering
    GreaterThan,
    /// Numeric-coerced ordering
    LessThan,
    /// Substring membership on the string form
    Contains,
}

/// Optional gate evaluated before a rule's responses fire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Condition {
    /// Compare the triggering value against a constant
    Comparison {
        /// How to compare
        operator: ComparisonOperator,
        /// Right-hand constant
        value: Value,
    },
    /// Numeric membership in an inclusive `"min-max"` interval
    Range {
        /// Interval in `"min-max"` form
        range: String,
    },
    /// Small closed expression over `${value}` (comparison/arithmetic only)
    Expression {
        /// The expression source
        expression: String,
    },
}

/// Where a jump response opens its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JumpTarget {
    /// Navigate the current tab
    #[default]
    SameTab,
    /// Open a new tab
    NewTab,
}

/// Navigation target for a jump response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JumpConfig {
    /// Destination URL (absolute or dashboard-relative)
    pub url: String,
    /// Tab behavior
    #[serde(default)]
    pub target: JumpTarget,
}

/// Property mutation for a modify response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyConfig {
    /// Component whose configuration is written (may be the rule's owner)
    pub target_component_id: String,
    /// Dotted property path, optionally layer-prefixed (`component.color`)
    pub target_property: String,
    /// Value written at the path
    pub update_value: Value,
}

/// One action executed when a rule fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum InteractionResponse {
    /// Navigate
    #[serde(rename_all = "camelCase")]
    Jump {
        /// Navigation parameters
        jump_config: JumpConfig,
    },
    /// Write a property on a target component
    #[serde(rename_all = "camelCase")]
    Modify {
        /// Mutation parameters
        modify_config: ModifyConfig,
    },
}

/// One declarative interaction rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionConfig {
    /// Stable rule identifier
    pub id: String,
    /// Trigger event
    pub event: TriggerEvent,
    /// Optional gate on the triggering value
    #[serde(default)]
    pub condition: Option<Condition>,
    /// Watched display-data property (required when `event` is `dataChange`)
    #[serde(default)]
    pub watched_property: Option<String>,
    /// Ordered responses
    #[serde(default)]
    pub responses: Vec<InteractionResponse>,
}

impl InteractionConfig {
    /// Check the structural invariants of this rule
    ///
    /// A defective rule is inert at runtime (logged and skipped); the
    /// validation engine also reports these as errors before persistence.
    ///
    /// # Errors
    /// Returns the first defect found
    pub fn well_formed(&self) -> Result<(), InteractionDefect> {
        if self.event == TriggerEvent::DataChange
            && self
                .watched_property
                .as_deref()
                .map_or(true, |p| p.trim().is_empty())
        {
            return Err(InteractionDefect::MissingWatchedProperty {
                rule: self.id.clone(),
            });
        }

        for response in &self.responses {
            if let InteractionResponse::Modify { modify_config } = response {
                if modify_config.target_component_id.trim().is_empty() {
                    return Err(InteractionDefect::MissingModifyTarget {
                        rule: self.id.clone(),
                        field: "targetComponentId",
                    });
                }
                if modify_config.target_property.trim().is_empty() {
                    return Err(InteractionDefect::MissingModifyTarget {
                        rule: self.id.clone(),
                        field: "targetProperty",
                    });
                }
            }
        }

        Ok(())
    }
}

/// Structural defects in interaction rules
#[derive(Debug, thiserror::Error)]
pub enum InteractionDefect {
    /// `dataChange` rule without a watched property
    #[error("rule '{rule}': dataChange requires watchedProperty")]
    MissingWatchedProperty {
        /// Offending rule id
        rule: String,
    },

    /// `modify` response missing a required target field
    #[error("rule '{rule}': modify response missing {field}")]
    MissingModifyTarget {
        /// Offending rule id
        rule: String,
        /// Missing field name
        field: &'static str,
    },
}
