//! Single-slot update callback
//!
//! Registration and dispatch share one lock, so a handler is never observed
//! half-replaced and no two invocations overlap. A handler must not register
//! or clear callbacks on the same dispatcher from inside its own invocation.

use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};

/// Handler invoked with each update payload
pub type UpdateHandler = Box<dyn FnMut(&str) + Send + 'static>;

#[derive(Default)]
pub struct CallbackDispatcher {
    handler: Mutex<Option<UpdateHandler>>,
}

impl CallbackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registered handler. Waits for an in-flight dispatch to
    /// finish; every dispatch after this returns sees `handler`.
    pub fn set_callback<F>(&self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        let previous = self.handler.lock().replace(Box::new(handler));
        // Dropped outside the lock
        drop(previous);
    }

    /// Remove the registered handler. Returns whether one was present.
    pub fn clear_callback(&self) -> bool {
        let previous = self.handler.lock().take();
        previous.is_some()
    }

    pub fn has_callback(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Deliver an update to the registered handler.
    ///
    /// Returns false if no handler was registered and the update was dropped.
    /// A panicking handler is logged and stays registered.
    pub fn dispatch(&self, update: &str) -> bool {
        let mut guard = self.handler.lock();
        let Some(handler) = guard.as_mut() else {
            return false;
        };

        if panic::catch_unwind(AssertUnwindSafe(|| handler(update))).is_err() {
            log::warn!("Update callback panicked; update dropped");
        }
        true
    }
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("registered", &self.has_callback())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn dispatch_without_handler_drops_update() {
        let dispatcher = CallbackDispatcher::new();
        assert!(!dispatcher.dispatch("updateNewMessage"));
    }

    #[test]
    fn replacing_handler_routes_to_new_one() {
        let dispatcher = CallbackDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        dispatcher.set_callback(move |u| first.lock().push(format!("a:{}", u)));
        dispatcher.dispatch("1");

        let second = Arc::clone(&seen);
        dispatcher.set_callback(move |u| second.lock().push(format!("b:{}", u)));
        dispatcher.dispatch("2");

        assert_eq!(*seen.lock(), vec!["a:1".to_string(), "b:2".to_string()]);
    }

    struct LockCheck {
        dispatcher: Arc<CallbackDispatcher>,
        unlocked: Arc<AtomicBool>,
    }

    impl Drop for LockCheck {
        fn drop(&mut self) {
            let free = self.dispatcher.handler.try_lock().is_some();
            self.unlocked.store(free, Ordering::SeqCst);
        }
    }

    #[test]
    fn replaced_handler_is_dropped_outside_the_lock() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let unlocked = Arc::new(AtomicBool::new(false));
        let check = LockCheck {
            dispatcher: Arc::clone(&dispatcher),
            unlocked: Arc::clone(&unlocked),
        };
        dispatcher.set_callback(move |_| {
            let _ = &check;
        });

        dispatcher.set_callback(|_| {});
        assert!(unlocked.load(Ordering::SeqCst));
    }

    #[test]
    fn cleared_handler_is_dropped_outside_the_lock() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let unlocked = Arc::new(AtomicBool::new(false));
        let check = LockCheck {
            dispatcher: Arc::clone(&dispatcher),
            unlocked: Arc::clone(&unlocked),
        };
        dispatcher.set_callback(move |_| {
            let _ = &check;
        });

        assert!(dispatcher.clear_callback());
        assert!(unlocked.load(Ordering::SeqCst));
    }

    #[test]
    fn clear_removes_handler() {
        let dispatcher = CallbackDispatcher::new();
        dispatcher.set_callback(|_| {});
        assert!(dispatcher.clear_callback());
        assert!(!dispatcher.clear_callback());
        assert!(!dispatcher.dispatch("x"));
    }

    #[test]
    fn panicking_handler_is_contained() {
        let dispatcher = CallbackDispatcher::new();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        dispatcher.set_callback(move |u| {
            *counter.lock() += 1;
            if u == "bad" {
                panic!("handler failure");
            }
        });

        assert!(dispatcher.dispatch("bad"));
        assert!(dispatcher.dispatch("good"));
        assert_eq!(*calls.lock(), 2);
    }
}
