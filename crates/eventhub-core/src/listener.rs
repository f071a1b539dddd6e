//! Listener handles and their registration modes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ListenerError;

/// Outcome of a single listener invocation.
pub type ListenerResult = std::result::Result<(), ListenerError>;

type Callback<T> = dyn Fn(Option<&T>) -> ListenerResult + Send + Sync;

/// Opaque identity of a listener handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Creates a fresh, unique identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How long a registration lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListenMode {
    /// Stays registered until removed.
    #[default]
    Persistent,
    /// Removed after the first emission that invokes it.
    OnceOnly,
}

/// A callback that can be registered on a channel.
///
/// Identity is carried by the handle, not by the closure: clones of one
/// `Listener` are the same listener, while two listeners built from
/// identical closures are distinct.
///
/// # Example
///
/// ```
/// use eventhub_core::Listener;
///
/// let greet = Listener::new(|name: Option<&String>| {
///     println!("hello {}", name.map(String::as_str).unwrap_or("nobody"));
/// });
/// let same = greet.clone();
/// assert_eq!(greet, same);
/// ```
pub struct Listener<T> {
    id: ListenerId,
    callback: Arc<Callback<T>>,
}

impl<T> Listener<T> {
    /// Wraps an infallible callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&T>) + Send + Sync + 'static,
    {
        Self::fallible(move |arg| {
            f(arg);
            Ok(())
        })
    }

    /// Wraps a callback that may report failure.
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(Option<&T>) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::new(),
            callback: Arc::new(f),
        }
    }

    /// Returns the identity shared by all clones of this handle.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invokes the callback directly.
    pub fn call(&self, arg: Option<&T>) -> ListenerResult {
        (self.callback)(arg)
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> PartialEq for Listener<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Listener<T> {}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

/// A registered listener together with its mode.
#[derive(Debug)]
pub(crate) struct ListenerEntry<T> {
    pub(crate) listener: Listener<T>,
    pub(crate) mode: ListenMode,
    /// Bumped on every (re-)registration; lets emission cleanup tell an
    /// entry it invoked apart from one registered again mid-emission.
    pub(crate) generation: u64,
    /// Shared by every snapshot of this registration. A once-only entry is
    /// only called by the emission that flips it.
    fired: Arc<AtomicBool>,
}

impl<T> ListenerEntry<T> {
    pub(crate) fn new(listener: Listener<T>, mode: ListenMode, generation: u64) -> Self {
        Self {
            listener,
            mode,
            generation,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replaces the mode as a fresh registration.
    pub(crate) fn rearm(&mut self, mode: ListenMode, generation: u64) {
        self.mode = mode;
        self.generation = generation;
        self.fired = Arc::new(AtomicBool::new(false));
    }

    /// Claims a once-only entry for the calling emission.
    ///
    /// Persistent entries can always be called. A once-only entry is
    /// claimed at most once across all snapshots of its registration.
    pub(crate) fn claim(&self) -> bool {
        match self.mode {
            ListenMode::Persistent => true,
            ListenMode::OnceOnly => !self.fired.swap(true, Ordering::AcqRel),
        }
    }
}

impl<T> Clone for ListenerEntry<T> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            mode: self.mode,
            generation: self.generation,
            fired: Arc::clone(&self.fired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_clone_shares_identity() {
        let listener = Listener::<u32>::new(|_| {});
        let copy = listener.clone();
        assert_eq!(listener.id(), copy.id());
        assert_eq!(listener, copy);
    }

    #[test]
    fn test_identical_closures_are_distinct() {
        let a = Listener::<u32>::new(|_| {});
        let b = Listener::<u32>::new(|_| {});
        assert_ne!(a, b);
    }

    #[test]
    fn test_call_passes_argument() {
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let listener = Listener::new(move |v: Option<&usize>| {
            s.store(*v.unwrap_or(&0), Ordering::SeqCst);
        });

        listener.call(Some(&7)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_fallible_reports_error() {
        let listener = Listener::<()>::fallible(|_| Err("boom".into()));
        let err = listener.call(None).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_once_entry_claimed_once_across_clones() {
        let entry = ListenerEntry::new(Listener::<()>::new(|_| {}), ListenMode::OnceOnly, 1);
        let snapshot = entry.clone();

        assert!(snapshot.claim());
        assert!(!entry.claim());
        assert!(!snapshot.claim());
    }

    #[test]
    fn test_rearm_allows_new_claim() {
        let mut entry = ListenerEntry::new(Listener::<()>::new(|_| {}), ListenMode::OnceOnly, 1);
        let old_snapshot = entry.clone();
        assert!(entry.claim());

        entry.rearm(ListenMode::OnceOnly, 2);
        assert!(entry.claim());
        assert!(!old_snapshot.claim());
    }

    #[test]
    fn test_persistent_entry_always_claimed() {
        let entry = ListenerEntry::new(Listener::<()>::new(|_| {}), ListenMode::Persistent, 1);
        assert!(entry.claim());
        assert!(entry.claim());
    }

    #[test]
    fn test_mode_serialization() {
        let json = serde_json::to_string(&ListenMode::OnceOnly).unwrap();
        assert_eq!(json, "\"once_only\"");
        assert_eq!(ListenMode::default(), ListenMode::Persistent);
    }
}
