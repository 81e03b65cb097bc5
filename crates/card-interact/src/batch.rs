//! Interaction response batching
//!
//! Multiple rules triggered by one event occurrence may all write
//! properties. N independent partial writes would clobber each other, so
//! modify responses are gathered, grouped by target component, bucketed by
//! target configuration layer, and flushed as ONE forced tiered update per
//! `(target, layer)` — last-write-wins per property within the batch.

use card_bridge::ConfigIntegrationBridge;
use card_config::{ComponentId, ConfigSection, ModifyConfig, PropertyPath};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

/// Properties that live in the base layer even when written without a
/// layer prefix. Everything else unprefixed is a component property.
const BASE_FIELDS: [&str; 2] = ["deviceId", "metricsList"];

/// Where a modify response lands: layer plus path within the layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSlot {
    /// The configuration layer written
    pub section: ConfigSection,
    /// Dotted path within the layer
    pub path: String,
}

/// Classify a `targetProperty` into its layer and in-layer path
///
/// A dotted layer prefix (`component.color`) is explicit; unprefixed
/// properties fall back to the field classification table.
#[must_use]
pub fn classify_target(property: &str) -> TargetSlot {
    if let Some((head, rest)) = property.split_once('.') {
        if let Ok(section) = head.parse::<ConfigSection>() {
            if !rest.is_empty() {
                return TargetSlot {
                    section,
                    path: rest.to_string(),
                };
            }
        }
    }

    let section = if BASE_FIELDS.contains(&property) {
        ConfigSection::Base
    } else {
        ConfigSection::Component
    };
    TargetSlot {
        section,
        path: property.to_string(),
    }
}

/// Outcome of flushing one batch (for logs and tests)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Tiered updates issued (one per `(target, layer)` bucket)
    pub writes: usize,
    /// Modify responses that could not be applied
    pub failed: usize,
}

/// Flush gathered modify responses through the bridge
///
/// Responses are applied in listed order, so a later response to the same
/// property wins. Each `(target, layer)` bucket becomes exactly one forced
/// update carrying the layer's current value with the batched properties
/// assigned on top.
pub fn flush_modifies(
    bridge: &ConfigIntegrationBridge,
    modifies: Vec<ModifyConfig>,
) -> FlushOutcome {
    let mut outcome = FlushOutcome::default();

    // Bucket while preserving listed order within each bucket.
    let mut buckets: BTreeMap<(ComponentId, ConfigSection), Vec<(String, Value)>> =
        BTreeMap::new();
    for modify in modifies {
        let slot = classify_target(&modify.target_property);
        buckets
            .entry((ComponentId::from(modify.target_component_id.as_str()), slot.section))
            .or_default()
            .push((slot.path, modify.update_value));
    }

    for ((target, section), writes) in buckets {
        let mut layer_value = bridge
            .get_configuration(&target)
            .and_then(|config| config.section_value(section).ok())
            .unwrap_or(Value::Object(serde_json::Map::new()));

        let mut assigned = 0usize;
        for (path, value) in writes {
            match PropertyPath::from_str(&path) {
                Ok(path) => {
                    if let Err(err) = path.assign(&mut layer_value, value) {
                        warn!(component = %target, %section, error = %err, "cannot assign batched property");
                        outcome.failed += 1;
                        continue;
                    }
                    assigned += 1;
                }
                Err(err) => {
                    warn!(component = %target, %section, property = %path, error = %err, "bad target property path");
                    outcome.failed += 1;
                }
            }
        }

        if assigned == 0 {
            continue;
        }
        match bridge.update_for_interaction(&target, section, layer_value) {
            Ok(_) => outcome.writes += 1,
            Err(err) => {
                warn!(component = %target, %section, error = %err, "batched interaction write failed");
                outcome.failed += 1;
            }
        }
    }

    outcome
}
