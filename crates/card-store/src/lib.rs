//! Card Configuration Store
//!
//! The authoritative, versioned configuration state manager.
//!
//! # Core Concepts
//!
//! - [`ConfigStateManager`]: `componentId → state` store with content-hash
//!   dedup, composite section locks, debounced notification, bounded
//!   version history and rollback
//! - [`RuleSet`] / [`ValidationRule`]: priority-ordered validation with a
//!   TTL result cache
//! - [`ConfigTemplate`] / [`TemplateRegistry`]: parameterized default
//!   documents applied on widget creation
//!
//! Writes are rejected (never queued) while the target `(component,
//! section)` lock is held; callers are expected to be retry-tolerant —
//! the next write carries the latest full state anyway.

#![warn(unreachable_pub)]

mod cache;
mod manager;
mod state;
mod template;
mod validation;

pub use cache::{ValidationCache, DEFAULT_VALIDATION_TTL};
pub use manager::{ConfigStateManager, StoreError, StoreOptions, UpdateOptions, WriteKey};
pub use state::{ConfigVersion, ConfigurationState, DEFAULT_HISTORY_CAP};
pub use template::{ConfigTemplate, TemplateError, TemplateParameter, TemplateRegistry};
pub use validation::{
    RuleSet, Severity, ValidationContext, ValidationIssue, ValidationReport, ValidationRule,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
