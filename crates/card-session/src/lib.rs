//! Card Editor Session
//!
//! Explicit, dependency-injected composition of the configuration core:
//! one [`EditorSession`] per open dashboard, owning its store, bus,
//! bridge, data-source gateway and interaction router. Consumers receive
//! handles; nothing is an ambient global.
//!
//! ```rust
//! use card_config::ComponentId;
//! use card_session::EditorSession;
//! use serde_json::Map;
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let session = EditorSession::builder().build();
//! session
//!     .add_widget(&ComponentId::from("w1"), "gauge", &Map::new())
//!     .unwrap();
//! assert_eq!(session.widget_ids().len(), 1);
//! # }
//! ```

#![warn(unreachable_pub)]

mod session;

pub use session::{EditorSession, EditorSessionBuilder, SessionConfig, SessionError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
