use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::state::CaptureState;

type Listener = Box<dyn FnMut(CaptureState) + Send>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Fan-out of committed state changes to registered handlers
///
/// Handlers run synchronously on the publishing call. They must not
/// subscribe or unsubscribe from inside the callback.
#[derive(Clone, Default)]
pub struct StateNotifier {
    inner: Arc<Mutex<Listeners>>,
}

impl StateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it is called once right away with `current`
    pub fn subscribe<F>(&self, current: CaptureState, mut handler: F) -> Subscription
    where
        F: FnMut(CaptureState) + Send + 'static,
    {
        handler(current);

        let mut listeners = self.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Box::new(handler)));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, state: CaptureState) {
        let mut listeners = self.lock();
        for (_, handler) in listeners.entries.iter_mut() {
            handler(state);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        // A panicking handler must not take notifications down with it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle returned by `on_state_change`
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Stop receiving notifications
    pub fn unsubscribe(self) {
        if let Some(inner) = self.listeners.upgrade() {
            let mut listeners = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            listeners.entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
