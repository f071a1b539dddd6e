//! Process-wide registry.
//!
//! Initialised empty on first use and alive until the process exits.

use std::sync::{Arc, OnceLock};

use eventhub_core::{Channel, ChannelConfig, Result};
use tracing::debug;

use crate::registry::Registry;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Returns the process-wide registry.
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(Registry::new)
}

/// Sets the channel configuration of the process-wide registry.
///
/// Only effective before the registry is first used; returns `false` if it
/// was already initialised.
pub fn configure_global(config: ChannelConfig) -> bool {
    let applied = GLOBAL.set(Registry::with_config(config)).is_ok();
    debug!(applied, "global registry configuration");
    applied
}

/// Returns the process-wide channel for `name`, creating it if absent.
pub fn use_event<T: 'static>(name: &str) -> Result<Arc<Channel<T>>> {
    global().channel(name)
}

/// Returns every event name handed out by the process-wide registry.
pub fn all_events() -> Vec<String> {
    global().event_names()
}
