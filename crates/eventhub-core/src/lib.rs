//! Named listener channels with synchronous dispatch.
//!
//! This crate provides the `Channel` type, the listener list for one named
//! event:
//! - Persistent (`on`) and once-only (`once`) registration, keyed by
//!   listener identity
//! - Snapshot emission on the caller's thread
//! - Configurable handling of failing listeners via `EmitPolicy`
//!
//! Channels are usually obtained by name from the `eventhub` registry crate;
//! this crate holds no global state.
//!
//! # Example
//!
//! ```
//! use eventhub_core::{Channel, Listener};
//!
//! let channel = Channel::<u32>::new("progress");
//! let listener = Listener::new(|pct: Option<&u32>| {
//!     println!("{}%", pct.copied().unwrap_or(0));
//! });
//!
//! channel.on(&listener).unwrap();
//! channel.emit(&50).unwrap();
//! channel.off(&listener).unwrap();
//! assert!(channel.is_empty());
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod listener;

pub use channel::{Channel, EmitReport};
pub use config::{ChannelConfig, EmitPolicy, DEFAULT_WARN_LISTENER_THRESHOLD};
pub use error::{EventError, ListenerError, Result};
pub use listener::{ListenMode, Listener, ListenerId, ListenerResult};
