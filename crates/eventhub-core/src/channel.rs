//! Channel - the listener list and dispatcher for one named event.
//!
//! Concurrency model:
//! - `RwLock` around the entry list; registration takes the write lock,
//!   introspection the read lock.
//! - `emit` copies the entry list under the read lock and releases it
//!   before any callback runs, so callbacks may re-enter the channel.
//! - Once-only entries are claimed atomically right before their call, so
//!   overlapping emissions (re-entrant or from other threads) call each
//!   once-only registration at most once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::{ChannelConfig, EmitPolicy};
use crate::error::{EventError, Result};
use crate::listener::{ListenMode, Listener, ListenerEntry, ListenerId};

/// Summary of one emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmitReport {
    /// Listeners invoked from the snapshot.
    pub invoked: usize,
    /// Invocations that returned an error.
    pub failed: usize,
    /// Once-only entries removed after the pass.
    pub once_removed: usize,
}

/// Identity-keyed, insertion-ordered listener map.
struct ChannelState<T> {
    /// Entries by slot; slots grow monotonically, so map order is
    /// registration order.
    entries: BTreeMap<u64, ListenerEntry<T>>,
    /// Slot of each registered listener.
    index: HashMap<ListenerId, u64>,
    next_generation: u64,
    over_threshold: bool,
}

impl<T> ChannelState<T> {
    fn get(&self, id: ListenerId) -> Option<&ListenerEntry<T>> {
        self.index.get(&id).and_then(|slot| self.entries.get(slot))
    }

    fn remove(&mut self, id: ListenerId) -> Option<ListenerEntry<T>> {
        let slot = self.index.remove(&id)?;
        self.entries.remove(&slot)
    }

    fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.index.clear();
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

/// Listener registry and dispatcher for a single event name.
///
/// Entries are kept in registration order, which is also emission order.
/// A listener appears at most once; registering it again replaces its
/// mode in place.
///
/// # Example
///
/// ```
/// use eventhub_core::{Channel, Listener};
///
/// let channel = Channel::<String>::new("greeting");
/// let listener = Listener::new(|msg: Option<&String>| {
///     assert_eq!(msg.map(String::as_str), Some("hi"));
/// });
///
/// channel.once(&listener).unwrap();
/// let report = channel.emit(&"hi".to_string()).unwrap();
/// assert_eq!(report.invoked, 1);
/// assert_eq!(channel.listener_count(), 0);
/// ```
pub struct Channel<T> {
    name: String,
    config: ChannelConfig,
    state: RwLock<ChannelState<T>>,
}

impl<T> Channel<T> {
    /// Creates an empty channel with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ChannelConfig::default())
    }

    /// Creates an empty channel with the given configuration.
    pub fn with_config(name: impl Into<String>, config: ChannelConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(ChannelState {
                entries: BTreeMap::new(),
                index: HashMap::new(),
                next_generation: 0,
                over_threshold: false,
            }),
        }
    }

    /// Returns the event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration this channel was created with.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Registers a persistent listener, or turns an existing registration
    /// persistent without moving it.
    pub fn on(&self, listener: &Listener<T>) -> Result<()> {
        self.register(listener, ListenMode::Persistent)
    }

    /// Registers a once-only listener, or turns an existing registration
    /// once-only without moving it.
    pub fn once(&self, listener: &Listener<T>) -> Result<()> {
        self.register(listener, ListenMode::OnceOnly)
    }

    fn register(&self, listener: &Listener<T>, mode: ListenMode) -> Result<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let generation = state.bump_generation();

        let existing = state.index.get(&listener.id()).copied();
        match existing.and_then(|slot| state.entries.get_mut(&slot)) {
            Some(entry) => {
                let previous = entry.mode;
                entry.rearm(mode, generation);
                debug!(
                    channel = %self.name,
                    listener = %listener.id(),
                    ?previous,
                    ?mode,
                    "listener re-registered"
                );
            }
            None => {
                // The generation doubles as the slot: unique and increasing.
                state
                    .entries
                    .insert(generation, ListenerEntry::new(listener.clone(), mode, generation));
                state.index.insert(listener.id(), generation);
                debug!(
                    channel = %self.name,
                    listener = %listener.id(),
                    ?mode,
                    "listener registered"
                );
            }
        }

        self.check_threshold(state);
        Ok(())
    }

    /// Removes a listener.
    ///
    /// Returns `false` when the listener was not registered.
    pub fn off(&self, listener: &Listener<T>) -> Result<bool> {
        let mut state = self.write()?;

        let removed = state.remove(listener.id()).is_some();
        if removed {
            debug!(channel = %self.name, listener = %listener.id(), "listener removed");
        }

        self.check_threshold(&mut state);
        Ok(removed)
    }

    /// Removes every listener and returns how many there were.
    pub fn remove_all_listeners(&self) -> Result<usize> {
        let mut state = self.write()?;
        let removed = state.clear();
        state.over_threshold = false;

        debug!(channel = %self.name, removed, "listeners cleared");
        Ok(removed)
    }

    /// Emits `arg` to every listener registered when the call starts.
    pub fn emit(&self, arg: &T) -> Result<EmitReport> {
        self.dispatch(Some(arg))
    }

    /// Emits without an argument; listeners receive `None`.
    pub fn emit_none(&self) -> Result<EmitReport> {
        self.dispatch(None)
    }

    /// Runs one emission pass.
    ///
    /// # Semantics
    ///
    /// 1. Copies the entry list; later registrations or removals do not
    ///    change who is called in this pass.
    /// 2. Calls each listener in order on the caller's thread. A once-only
    ///    entry already claimed by an overlapping emission is skipped.
    /// 3. Removes the once-only entries this pass called, unless they were
    ///    registered again meanwhile. This also happens when the pass ends
    ///    early through an error or a panic.
    fn dispatch(&self, arg: Option<&T>) -> Result<EmitReport> {
        let snapshot: Vec<ListenerEntry<T>> = self.read()?.entries.values().cloned().collect();
        trace!(channel = %self.name, listeners = snapshot.len(), "emitting");

        let mut report = EmitReport::default();
        let mut cleanup = OnceCleanup {
            channel: self,
            due: HashSet::new(),
        };

        for entry in &snapshot {
            if !entry.claim() {
                continue;
            }
            if entry.mode == ListenMode::OnceOnly {
                cleanup.due.insert((entry.listener.id(), entry.generation));
            }

            report.invoked += 1;
            if let Err(source) = entry.listener.call(arg) {
                report.failed += 1;
                match self.config.emit_policy {
                    EmitPolicy::Isolate => {
                        warn!(
                            channel = %self.name,
                            listener = %entry.listener.id(),
                            error = %source,
                            "listener failed"
                        );
                    }
                    EmitPolicy::Propagate => {
                        return Err(EventError::ListenerFailed {
                            channel: self.name.clone(),
                            listener: entry.listener.id(),
                            source,
                        });
                    }
                }
            }
        }

        report.once_removed = cleanup.finish();
        trace!(
            channel = %self.name,
            invoked = report.invoked,
            failed = report.failed,
            once_removed = report.once_removed,
            "emit complete"
        );
        Ok(report)
    }

    /// Returns the number of registered listeners, either mode.
    pub fn listener_count(&self) -> usize {
        self.state.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listener_count() == 0
    }

    /// Returns the registered listeners in emission order.
    pub fn listeners(&self) -> Vec<Listener<T>> {
        self.state
            .read()
            .map(|s| s.entries.values().map(|e| e.listener.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns true if the listener is registered.
    pub fn contains(&self, listener: &Listener<T>) -> bool {
        self.mode_of(listener).is_some()
    }

    /// Returns the mode the listener is registered with.
    pub fn mode_of(&self, listener: &Listener<T>) -> Option<ListenMode> {
        let state = self.state.read().ok()?;
        state.get(listener.id()).map(|e| e.mode)
    }

    fn check_threshold(&self, state: &mut ChannelState<T>) {
        let Some(threshold) = self.config.warn_listener_threshold else {
            return;
        };

        let count = state.len();
        if count > threshold {
            if !state.over_threshold {
                state.over_threshold = true;
                warn!(
                    channel = %self.name,
                    count,
                    threshold,
                    "listener count above threshold, possible leak"
                );
            }
        } else {
            state.over_threshold = false;
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ChannelState<T>>> {
        self.state
            .read()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ChannelState<T>>> {
        self.state
            .write()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Removes the once-only entries invoked by a pass, on every exit path.
struct OnceCleanup<'a, T> {
    channel: &'a Channel<T>,
    due: HashSet<(ListenerId, u64)>,
}

impl<T> OnceCleanup<'_, T> {
    fn finish(mut self) -> usize {
        self.run()
    }

    fn run(&mut self) -> usize {
        if self.due.is_empty() {
            return 0;
        }
        let due = std::mem::take(&mut self.due);

        // Runs during unwinding too, so a poisoned lock is recovered.
        let mut state = self
            .channel
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for (id, generation) in due {
            if state.get(id).is_some_and(|e| e.generation == generation) {
                state.remove(id);
                removed += 1;
            }
        }
        self.channel.check_threshold(&mut state);

        if removed > 0 {
            debug!(channel = %self.channel.name, removed, "once listeners removed");
        }
        removed
    }
}

impl<T> Drop for OnceCleanup<'_, T> {
    fn drop(&mut self) {
        self.run();
    }
}
