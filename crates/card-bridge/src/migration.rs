//! One-time structural migration of legacy device-binding fields
//!
//! Older documents carried `deviceId`/`metricsList` in the component layer
//! (directly, or nested under a `customize` object). The current split
//! owns them in the base layer. Migration is idempotent: it checks
//! presence before acting, stamps `metadata.migrationVersion`, and a
//! migrated document is never touched again.

use card_config::WidgetConfiguration;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

/// Version marker stamped after a successful migration
pub const MIGRATION_VERSION: &str = "2.1.0";

const LEGACY_DEVICE_ID: &str = "deviceId";
const LEGACY_METRICS_LIST: &str = "metricsList";
const LEGACY_CUSTOMIZE: &str = "customize";

/// Whether a document still carries legacy device fields in its component
/// layer
#[must_use]
pub fn needs_migration(config: &WidgetConfiguration) -> bool {
    let properties = &config.component.properties;
    if properties.contains_key(LEGACY_DEVICE_ID) || properties.contains_key(LEGACY_METRICS_LIST) {
        return true;
    }
    properties
        .get(LEGACY_CUSTOMIZE)
        .and_then(Value::as_object)
        .is_some_and(|customize| {
            customize.contains_key(LEGACY_DEVICE_ID) || customize.contains_key(LEGACY_METRICS_LIST)
        })
}

/// Move legacy device fields from the component layer into the base layer
///
/// Returns whether the document changed. Already-migrated documents are
/// left untouched — including their migration stamps.
pub fn migrate_device_fields(config: &mut WidgetConfiguration) -> bool {
    if !needs_migration(config) {
        return false;
    }

    let (device_id, metrics_list) = extract_legacy_fields(config);

    if let Some(device_id) = device_id {
        // A base-level binding, if one exists, is newer than the legacy
        // component copy; only fill the gap.
        if config.base.device_id.is_none() {
            config.base.device_id = Some(device_id);
        }
    }
    if let Some(metrics) = metrics_list {
        if config.base.metrics_list.is_empty() {
            config.base.metrics_list = metrics;
        }
    }

    config.metadata.migration_version = Some(MIGRATION_VERSION.to_string());
    config.metadata.migrated_at = Some(Utc::now());
    debug!("migrated legacy device fields into base layer");
    true
}

/// Remove and collect the legacy fields from the component layer
fn extract_legacy_fields(
    config: &mut WidgetConfiguration,
) -> (Option<String>, Option<Vec<String>>) {
    let properties = &mut config.component.properties;

    let mut device_id = properties
        .remove(LEGACY_DEVICE_ID)
        .and_then(|v| v.as_str().map(ToString::to_string));
    let mut metrics_list = properties.remove(LEGACY_METRICS_LIST).map(string_list);

    if let Some(customize) = properties
        .get_mut(LEGACY_CUSTOMIZE)
        .and_then(Value::as_object_mut)
    {
        if let Some(value) = customize.remove(LEGACY_DEVICE_ID) {
            device_id = device_id.or_else(|| value.as_str().map(ToString::to_string));
        }
        if let Some(value) = customize.remove(LEGACY_METRICS_LIST) {
            metrics_list = metrics_list.or_else(|| Some(string_list(value)));
        }
    }
    // An emptied customize object carries no information.
    if properties
        .get(LEGACY_CUSTOMIZE)
        .and_then(Value::as_object)
        .is_some_and(serde_json::Map::is_empty)
    {
        properties.remove(LEGACY_CUSTOMIZE);
    }

    (device_id, metrics_list)
}

fn string_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(ToString::to_string))
            .collect(),
        Value::String(single) => vec![single],
        _ => Vec::new(),
    }
}
