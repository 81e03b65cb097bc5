//! Card Widget Catalog
//!
//! The palette of placeable widget types and their default configuration
//! templates. Rendering is out of scope — a definition owns configuration
//! defaults and declares its data-binding parameters, nothing more.

#![warn(unreachable_pub)]

mod builtin;
mod catalog;

pub use builtin::all as builtin_definitions;
pub use catalog::{WidgetCatalog, WidgetCategory, WidgetDefinition};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
