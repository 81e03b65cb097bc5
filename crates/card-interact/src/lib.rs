//! Card Interaction Routing
//!
//! Routes declarative interaction rules (click / hover / data-change →
//! jump / modify-property) to live component instances.
//!
//! # Core Concepts
//!
//! - [`InteractionRouter`]: per-component rule storage, commutative
//!   config/instance binding, teardown, bus-driven re-registration
//! - [`ComponentInstance`] / [`ElementResolver`] / [`Navigator`]: the seam
//!   traits hosts implement toward the rendered dashboard
//! - [`condition`]: comparison/range gates with string/number coercion
//! - [`expr`]: the closed expression grammar (never dynamic evaluation)
//! - Response batching: modify responses triggered in one tick flush as
//!   one forced tiered update per `(target, layer)`, last-write-wins

#![warn(unreachable_pub)]

mod batch;
pub mod condition;
pub mod expr;
mod instance;
mod router;

pub use batch::{classify_target, flush_modifies, FlushOutcome, TargetSlot};
pub use instance::{
    BindError, BindingGuard, ComponentInstance, ElementResolver, InteractiveElement, Navigator,
    PointerEvent, TriggerCallback,
};
pub use router::InteractionRouter;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
