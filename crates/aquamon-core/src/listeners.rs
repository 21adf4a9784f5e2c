// ── Listener registry ──
//
// Ordered callbacks per event kind. Registration order is dispatch order,
// duplicates are allowed, and removal matches by `Arc` identity. Each
// callback runs inside its own panic boundary so one faulty listener cannot
// starve the ones registered after it.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::{EventKind, RealtimeEvent};

/// A registered callback. Clone the `Arc` to keep a handle for [`ListenerRegistry::off`].
pub type Listener = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&RealtimeEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Default)]
pub struct ListenerRegistry {
    entries: Mutex<HashMap<EventKind, Vec<Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Listener>>> {
        // Callbacks never run under this lock, so poisoning cannot leave
        // the map half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `callback` to the list for `kind`.
    pub fn on(&self, kind: EventKind, callback: Listener) {
        self.lock().entry(kind).or_default().push(callback);
    }

    /// Remove the first registration of exactly this `callback`.
    ///
    /// Returns `false` if it was not registered for `kind`.
    pub fn off(&self, kind: EventKind, callback: &Listener) -> bool {
        let mut entries = self.lock();
        let Some(list) = entries.get_mut(&kind) else {
            return false;
        };
        let Some(pos) = list.iter().position(|l| Arc::ptr_eq(l, callback)) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            entries.remove(&kind);
        }
        true
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every listener for the event's kind, in registration order.
    ///
    /// Dispatch works on a snapshot, so listeners may register or remove
    /// listeners (including themselves) without affecting this round.
    /// Returns the number of listeners that panicked.
    pub fn emit(&self, event: &RealtimeEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<Listener> = match self.lock().get(&kind) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut failures = 0;
        for (index, callback) in snapshot.iter().enumerate() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                failures += 1;
                tracing::error!(
                    event = %kind,
                    listener = index,
                    panic = panic_message(panic.as_ref()),
                    "listener panicked"
                );
            }
        }
        failures
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<EventKind, usize> =
            self.lock().iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("ListenerRegistry").field("listeners", &counts).finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

// ── Tests ────────────────────────────────────────────────────────────
