//! Card Configuration Integration Bridge
//!
//! The adapter in front of the state manager that every writer goes
//! through.
//!
//! # Core Concepts
//!
//! - [`ConfigIntegrationBridge`]: dedup-before-dispatch, burst coalescing
//!   (non-base sections only), forced cross-component updates, one-time
//!   legacy migration
//! - [`TriggerRegistry`]: property-path registry behind the
//!   "does this change re-fetch data?" heuristic
//! - [`DataSourceGateway`] / [`DataSourceExecutor`]: debounced,
//!   sequence-guarded execution front for the external fetch collaborator
//! - [`migration`]: the legacy device-field reshaping itself

#![warn(unreachable_pub)]

mod bridge;
mod gateway;
pub mod migration;
mod triggers;

pub use bridge::{BridgeError, BridgeOptions, ConfigIntegrationBridge};
pub use gateway::{DataSourceExecutor, DataSourceGateway, ExecutionError, GatewayOptions};
pub use triggers::{leaf_paths, TriggerRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
