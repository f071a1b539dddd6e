//! Named in-process events.
//!
//! Callers look a channel up by event name, register listeners on it and
//! emit values to them synchronously:
//!
//! - [`Registry`] maps names to channels, creating them on first lookup
//! - [`use_event`] / [`all_events`] work on the process-wide registry
//! - [`Channel`], [`Listener`] and friends are re-exported from
//!   `eventhub-core`
//!
//! # Example
//!
//! ```
//! use eventhub::{all_events, use_event, Listener};
//!
//! let saved = use_event::<String>("doc-saved").unwrap();
//! let notify = Listener::new(|path: Option<&String>| {
//!     println!("saved {}", path.map(String::as_str).unwrap_or("?"));
//! });
//!
//! saved.once(&notify).unwrap();
//! saved.emit(&"notes.md".to_string()).unwrap();
//!
//! assert_eq!(saved.listener_count(), 0);
//! assert!(all_events().contains(&"doc-saved".to_string()));
//! ```

pub mod global;
pub mod registry;

pub use global::{all_events, configure_global, global, use_event};
pub use registry::Registry;

pub use eventhub_core::{
    Channel, ChannelConfig, EmitPolicy, EmitReport, EventError, ListenMode, Listener,
    ListenerError, ListenerId, ListenerResult, Result,
};
