//! Execution-trigger registry
//!
//! Decides whether a configuration change must cause the data-source layer
//! to re-fetch. Driven by a registry of property paths declared to affect
//! data acquisition — never a hardcoded field list. Any change inside the
//! `dataSource` section always triggers; `base`/`component` properties
//! trigger only when registered (widget catalogs register their binding
//! parameters, e.g. `base.deviceId`).

use card_config::{ConfigSection, PropertyPath};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Registry of data-binding property paths
pub struct TriggerRegistry {
    paths: RwLock<BTreeSet<PropertyPath>>,
}

impl fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerRegistry")
            .field("paths", &self.registered())
            .finish()
    }
}

impl TriggerRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            paths: RwLock::new(BTreeSet::new()),
        }
    }

    /// Registry pre-seeded with the device-binding parameters every widget
    /// carries in its base layer
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for path in ["base.deviceId", "base.metricsList"] {
            if let Ok(path) = PropertyPath::from_str(path) {
                registry.register(path);
            }
        }
        registry
    }

    /// Declare a property path as affecting data acquisition
    pub fn register(&self, path: PropertyPath) {
        self.paths.write().insert(path);
    }

    /// Remove a declared path; returns whether it was present
    pub fn deregister(&self, path: &PropertyPath) -> bool {
        self.paths.write().remove(path)
    }

    /// All registered paths, sorted
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        self.paths.read().iter().map(ToString::to_string).collect()
    }

    /// Whether a change to `section` touching `changed_fields` (dotted
    /// paths relative to the section) must re-execute the data source
    #[must_use]
    pub fn should_trigger(&self, section: ConfigSection, changed_fields: &[String]) -> bool {
        if section == ConfigSection::DataSource {
            return true;
        }

        let paths = self.paths.read();
        changed_fields.iter().any(|field| {
            let Ok(relative) = PropertyPath::from_str(field) else {
                return false;
            };
            let full = prefix_with_section(section, &relative);
            paths
                .iter()
                .any(|registered| registered.is_prefix_of(&full) || full.is_prefix_of(registered))
        })
    }

    /// Convenience: decide from a raw section payload instead of a diff
    ///
    /// Uses the payload's leaf paths as the candidate changed fields.
    #[must_use]
    pub fn should_trigger_for_value(&self, section: ConfigSection, value: &Value) -> bool {
        self.should_trigger(section, &leaf_paths(value))
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn prefix_with_section(section: ConfigSection, relative: &PropertyPath) -> PropertyPath {
    let mut segments = vec![section.as_str().to_string()];
    segments.extend(relative.iter().map(ToString::to_string));
    PropertyPath::new(segments)
}

/// Dotted paths of every leaf in a JSON value
///
/// An empty object/array contributes its own path; scalars at the root
/// contribute nothing (there is no addressable field).
#[must_use]
pub fn leaf_paths(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaves("", value, &mut out);
    out
}

fn collect_leaves(prefix: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, inner) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_leaves(&path, inner, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, inner) in items.iter().enumerate() {
                let path = if prefix.is_empty() {
                    i.to_string()
                } else {
                    format!("{prefix}.{i}")
                };
                collect_leaves(&path, inner, out);
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.push(prefix.to_string());
            }
        }
    }
}
