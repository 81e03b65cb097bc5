//! Recursive field-level diff of configuration values
//!
//! Used by `compare_versions` in the store and to populate the
//! `changed_fields` context on change events. Structural, not text-based:
//! each change names the dotted path it occurred at.

use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// One field-level difference between two documents
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    /// Field present only in the new document
    Added {
        /// Dotted path
        path: String,
        /// New value
        value: Value,
    },
    /// Field present only in the old document
    Removed {
        /// Dotted path
        path: String,
        /// Old value
        value: Value,
    },
    /// Field present in both with different values
    Changed {
        /// Dotted path
        path: String,
        /// Old value
        from: Value,
        /// New value
        to: Value,
    },
}

impl FieldChange {
    /// The dotted path this change occurred at
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            FieldChange::Added { path, .. }
            | FieldChange::Removed { path, .. }
            | FieldChange::Changed { path, .. } => path,
        }
    }
}

impl Display for FieldChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FieldChange::Added { path, value } => write!(f, "+ {path} = {value}"),
            FieldChange::Removed { path, value } => write!(f, "- {path} = {value}"),
            FieldChange::Changed { path, from, to } => write!(f, "~ {path}: {from} -> {to}"),
        }
    }
}

/// Compute the recursive field-level diff between two JSON values
///
/// Objects recurse per key (union of keys, sorted), arrays recurse per
/// index; scalars compare directly. An empty result means the values are
/// structurally identical.
#[must_use]
pub fn diff_values(old: &Value, new: &Value) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    diff_at("", old, new, &mut changes);
    changes
}

/// Just the dotted paths that differ between two values
#[must_use]
pub fn changed_paths(old: &Value, new: &Value) -> Vec<String> {
    diff_values(old, new)
        .into_iter()
        .map(|c| c.path().to_string())
        .collect()
}

fn diff_at(prefix: &str, old: &Value, new: &Value, out: &mut Vec<FieldChange>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let mut keys: Vec<&String> = old_map.keys().chain(new_map.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let path = join(prefix, key);
                match (old_map.get(key), new_map.get(key)) {
                    (Some(o), Some(n)) => diff_at(&path, o, n, out),
                    (Some(o), None) => out.push(FieldChange::Removed {
                        path,
                        value: o.clone(),
                    }),
                    (None, Some(n)) => out.push(FieldChange::Added {
                        path,
                        value: n.clone(),
                    }),
                    (None, None) => unreachable!("key came from one of the maps"),
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            let shared = old_items.len().min(new_items.len());
            for i in 0..shared {
                diff_at(&join(prefix, &i.to_string()), &old_items[i], &new_items[i], out);
            }
            for (i, item) in old_items.iter().enumerate().skip(shared) {
                out.push(FieldChange::Removed {
                    path: join(prefix, &i.to_string()),
                    value: item.clone(),
                });
            }
            for (i, item) in new_items.iter().enumerate().skip(shared) {
                out.push(FieldChange::Added {
                    path: join(prefix, &i.to_string()),
                    value: item.clone(),
                });
            }
        }
        (o, n) => {
            if o != n {
                out.push(FieldChange::Changed {
                    path: prefix.to_string(),
                    from: o.clone(),
                    to: n.clone(),
                });
            }
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
