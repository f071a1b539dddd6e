//! Registry - name to channel directory.
//!
//! Channels are created lazily on first lookup and never evicted, so the
//! registry can always enumerate every event name it has handed out.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use eventhub_core::{Channel, ChannelConfig, EventError, Result};
use tracing::debug;

struct Slot {
    /// Payload type the channel was created with.
    type_name: &'static str,
    channel: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<String, Slot>,
    /// Names in creation order.
    names: Vec<String>,
}

/// Directory of named channels.
///
/// Each name is bound to one payload type for the lifetime of the registry.
///
/// # Example
///
/// ```
/// use eventhub::{Listener, Registry};
///
/// let registry = Registry::new();
/// let saved = registry.channel::<String>("file-saved").unwrap();
/// saved.on(&Listener::new(|path: Option<&String>| println!("{path:?}"))).unwrap();
///
/// let again = registry.channel::<String>("file-saved").unwrap();
/// assert_eq!(again.listener_count(), 1);
/// assert_eq!(registry.event_names(), vec!["file-saved".to_string()]);
/// ```
pub struct Registry {
    /// Configuration given to every channel this registry creates.
    config: ChannelConfig,
    state: RwLock<RegistryState>,
}

impl Registry {
    /// Creates an empty registry with the default channel configuration.
    pub fn new() -> Self {
        Self::with_config(ChannelConfig::default())
    }

    /// Creates an empty registry whose channels use `config`.
    pub fn with_config(config: ChannelConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Returns the channel configuration applied on creation.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Returns the channel for `name`, creating it if absent.
    ///
    /// Repeated lookups return the same channel. Fails with
    /// [`EventError::TypeMismatch`] if `name` was created with another
    /// payload type.
    pub fn channel<T>(&self, name: &str) -> Result<Arc<Channel<T>>>
    where
        T: 'static,
    {
        {
            let state = self.read()?;
            if let Some(slot) = state.slots.get(name) {
                return downcast(name, slot);
            }
        }

        let mut state = self.write()?;
        // Another thread may have created it between the two locks.
        if let Some(slot) = state.slots.get(name) {
            return downcast(name, slot);
        }

        let channel = Arc::new(Channel::<T>::with_config(name, self.config.clone()));
        state.slots.insert(
            name.to_string(),
            Slot {
                type_name: type_name::<T>(),
                channel: channel.clone(),
            },
        );
        state.names.push(name.to_string());

        debug!(channel = name, payload = type_name::<T>(), "channel created");
        Ok(channel)
    }

    /// Returns every name ever looked up, in creation order.
    pub fn event_names(&self) -> Vec<String> {
        self.state
            .read()
            .map(|s| s.names.clone())
            .unwrap_or_default()
    }

    /// Returns true if a channel exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.state
            .read()
            .map(|s| s.slots.contains_key(name))
            .unwrap_or(false)
    }

    /// Returns the number of channels created.
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.names.len()).unwrap_or(0)
    }

    /// Returns true if no channel has been created.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>> {
        self.state
            .read()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("channels", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

fn downcast<T: 'static>(name: &str, slot: &Slot) -> Result<Arc<Channel<T>>> {
    Arc::clone(&slot.channel)
        .downcast::<Channel<T>>()
        .map_err(|_| EventError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
            found: slot.type_name,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventhub_core::{EmitPolicy, Listener};
    use std::thread;

    #[test]
    fn test_same_name_same_channel() {
        let registry = Registry::new();
        let a = registry.channel::<u32>("tick").unwrap();
        let b = registry.channel::<u32>("tick").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_listeners_visible_through_any_handle() {
        let registry = Registry::new();
        let listener = Listener::<u32>::new(|_| {});

        registry.channel::<u32>("tick").unwrap().on(&listener).unwrap();
        let again = registry.channel::<u32>("tick").unwrap();

        assert!(again.contains(&listener));
        assert_eq!(again.name(), "tick");
    }

    #[test]
    fn test_names_in_creation_order() {
        let registry = Registry::new();
        registry.channel::<()>("b").unwrap();
        registry.channel::<()>("a").unwrap();
        registry.channel::<()>("b").unwrap();
        registry.channel::<String>("c").unwrap();

        assert_eq!(registry.event_names(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_emptied_channel_still_listed() {
        let registry = Registry::new();
        let channel = registry.channel::<()>("cleared").unwrap();
        channel.on(&Listener::new(|_| {})).unwrap();
        channel.remove_all_listeners().unwrap();

        assert!(registry.contains("cleared"));
        assert!(registry.event_names().contains(&"cleared".to_string()));
    }

    #[test]
    fn test_type_mismatch() {
        let registry = Registry::new();
        registry.channel::<u32>("tick").unwrap();

        let err = registry.channel::<String>("tick").unwrap_err();
        match err {
            EventError::TypeMismatch {
                name,
                expected,
                found,
            } => {
                assert_eq!(name, "tick");
                assert_eq!(expected, type_name::<String>());
                assert_eq!(found, "u32");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_config_applied_to_channels() {
        let config = ChannelConfig::new().with_emit_policy(EmitPolicy::Propagate);
        let registry = Registry::with_config(config.clone());

        let channel = registry.channel::<()>("strict").unwrap();
        assert_eq!(channel.config(), &config);
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::default();
        assert!(registry.is_empty());
        assert!(registry.event_names().is_empty());
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_concurrent_lookup_creates_once() {
        let registry = Arc::new(Registry::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let r = registry.clone();
            handles.push(thread::spawn(move || {
                let channel = r.channel::<u64>("shared").unwrap();
                channel.on(&Listener::new(|_| {})).unwrap();
                channel
            }));
        }

        let channels: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        assert!(channels.iter().all(|c| Arc::ptr_eq(c, &channels[0])));
        assert_eq!(channels[0].listener_count(), 8);
    }
}
