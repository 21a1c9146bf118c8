//! Bridge between a poll-based messaging engine and push-style consumers
//!
//! The engine only hands out updates when polled. This module provides:
//! - A dedicated receiver thread that polls the engine and pushes updates
//!   to the registered callback
//! - A thread-safe request gateway (`send` / `execute`)
//! - Synchronized one-time construction and idempotent shutdown

use crate::authorization::{AuthorizationState, AuthorizationTracker};
use crate::config::BridgeConfig;
use crate::dispatcher::CallbackDispatcher;
use crate::engine::{ClientId, MessagingEngine, PollResult};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tokio::sync::mpsc;

// =============================================================================
// Types
// =============================================================================

/// Errors surfaced by the bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The engine handle is gone (the bridge was shut down)
    #[error("messaging engine is not available")]
    EngineUnavailable,

    #[error("failed to spawn receiver thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("invalid bridge configuration: {0}")]
    InvalidConfig(String),
}

/// Counters kept by the receiver thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub updates: u64,
    pub idle_polls: u64,
    pub poll_errors: u64,
}

/// State shared between the bridge and its receiver thread
#[derive(Debug, Default)]
struct Shared {
    running: AtomicBool,
    dispatcher: CallbackDispatcher,
    tracker: AuthorizationTracker,
    updates: AtomicU64,
    idle_polls: AtomicU64,
    poll_errors: AtomicU64,
}

// =============================================================================
// Bridge
// =============================================================================

/// A client session over a messaging engine, with its receiver thread
pub struct Bridge {
    /// Engine handle; taken on shutdown
    engine: RwLock<Option<Arc<dyn MessagingEngine>>>,
    /// Client id assigned at construction
    client_id: ClientId,
    shared: Arc<Shared>,
    /// Handle to the receiver thread; held across join and engine teardown
    receiver: Mutex<Option<JoinHandle<()>>>,
    receiver_thread: ThreadId,
    config: BridgeConfig,
}

impl Bridge {
    /// Create a client session on `engine` and start the receiver thread
    pub fn start(
        engine: Arc<dyn MessagingEngine>,
        config: BridgeConfig,
    ) -> Result<Arc<Self>, BridgeError> {
        config.validate().map_err(BridgeError::InvalidConfig)?;

        let client_id = engine.create_client_id();
        let shared = Arc::new(Shared::default());
        shared.running.store(true, Ordering::SeqCst);

        let thread_engine = Arc::clone(&engine);
        let thread_shared = Arc::clone(&shared);
        let poll_timeout = config.poll_timeout();
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || receiver_loop(thread_engine, thread_shared, poll_timeout))
            .map_err(|e| {
                log::error!("Failed to spawn receiver thread: {}", e);
                shared.running.store(false, Ordering::SeqCst);
                BridgeError::Spawn(e)
            })?;

        log::info!("Bridge started for client {}", client_id);

        Ok(Arc::new(Self {
            engine: RwLock::new(Some(engine)),
            client_id,
            shared,
            receiver_thread: handle.thread().id(),
            receiver: Mutex::new(Some(handle)),
            config,
        }))
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Whether the receiver thread has not been told to stop
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    fn engine(&self) -> Option<Arc<dyn MessagingEngine>> {
        self.engine.read().clone()
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// Queue a request for this bridge's client. Responses and updates come
    /// back through the callback.
    pub fn send(&self, query: &str) -> Result<ClientId, BridgeError> {
        let engine = self.engine().ok_or(BridgeError::EngineUnavailable)?;
        log::debug!("send: client={}, query={}", self.client_id, query);
        engine.send(self.client_id, query);
        Ok(self.client_id)
    }

    /// Run a request synchronously. Only for requests the engine allows
    /// without an active session.
    pub fn execute(&self, query: &str) -> Option<String> {
        let Some(engine) = self.engine() else {
            log::debug!("execute after shutdown ignored: {}", query);
            return None;
        };
        log::debug!("execute: {}", query);
        engine.execute(query)
    }

    // -------------------------------------------------------------------------
    // Updates
    // -------------------------------------------------------------------------

    /// Register the update handler, replacing any previous one.
    ///
    /// The handler runs on the receiver thread. It must not call
    /// `set_callback`, `clear_callback` or `subscribe` on this bridge.
    pub fn set_callback<F>(&self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.shared.dispatcher.set_callback(handler);
    }

    /// Drop the update handler. Later updates are discarded.
    pub fn clear_callback(&self) -> bool {
        self.shared.dispatcher.clear_callback()
    }

    /// Route updates into a channel for async consumers. Replaces the
    /// current callback; updates sent after the receiver is dropped are
    /// discarded.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.set_callback(move |update| {
            let _ = tx.send(update.to_string());
        });
        rx
    }

    // -------------------------------------------------------------------------
    // Authorization
    // -------------------------------------------------------------------------

    pub fn is_authorized(&self) -> bool {
        self.shared.tracker.is_authorized()
    }

    pub fn authorization_state(&self) -> AuthorizationState {
        self.shared.tracker.state()
    }

    /// Verbatim payload of the latest authorization update, "" if none yet
    pub fn current_authorization_state(&self) -> String {
        self.shared.tracker.state_text()
    }

    pub fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            updates: self.shared.updates.load(Ordering::Relaxed),
            idle_polls: self.shared.idle_polls.load(Ordering::Relaxed),
            poll_errors: self.shared.poll_errors.load(Ordering::Relaxed),
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Stop the receiver thread and release the engine.
    ///
    /// Blocks for at most one poll timeout. A call made while another is
    /// still stopping the thread waits for it to finish; later calls return
    /// immediately.
    pub fn shutdown(&self) {
        let first = self.shared.running.swap(false, Ordering::SeqCst);
        if first {
            log::info!("Bridge shutting down for client {}", self.client_id);
        }

        if thread::current().id() == self.receiver_thread {
            // Called from a callback; the loop exits after this dispatch
            if first {
                log::warn!("shutdown called from the receiver thread; not waiting for it");
            }
            self.engine.write().take();
            return;
        }

        let mut receiver = self.receiver.lock();
        if let Some(handle) = receiver.take() {
            if handle.join().is_err() {
                log::error!("Receiver thread panicked");
            }
            log::info!("Bridge stopped for client {}", self.client_id);
        }
        self.engine.write().take();
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("client_id", &self.client_id)
            .field("running", &self.is_running())
            .field("authorized", &self.is_authorized())
            .finish()
    }
}

// =============================================================================
// Receiver Thread
// =============================================================================

/// Main function of the receiver thread
fn receiver_loop(engine: Arc<dyn MessagingEngine>, shared: Arc<Shared>, poll_timeout: Duration) {
    log::info!("Receiver thread starting (poll timeout {:?})", poll_timeout);

    while shared.running.load(Ordering::SeqCst) {
        match engine.receive(poll_timeout) {
            PollResult::Update(response) => {
                shared.tracker.observe(&response.payload);
                shared.dispatcher.dispatch(&response.payload);
                shared.updates.fetch_add(1, Ordering::Relaxed);
            }
            PollResult::Idle => {
                shared.idle_polls.fetch_add(1, Ordering::Relaxed);
            }
            PollResult::Error(e) => {
                shared.poll_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("Error in receiver loop: {}", e);
            }
        }
    }

    log::info!("Receiver thread stopped");
}

// =============================================================================
// Process-wide instance
// =============================================================================

/// A lazily constructed bridge. The first `acquire_with` builds it; every
/// caller, on any thread, gets the same instance.
#[derive(Debug, Default)]
pub struct BridgeSlot {
    cell: OnceCell<Arc<Bridge>>,
}

impl BridgeSlot {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Return the bridge, building it from `factory` on first use.
    /// Concurrent first callers block until construction finishes; the
    /// factory runs at most once per successful construction.
    pub fn acquire_with<F>(&self, config: BridgeConfig, factory: F) -> Result<Arc<Bridge>, BridgeError>
    where
        F: FnOnce() -> Arc<dyn MessagingEngine>,
    {
        self.cell
            .get_or_try_init(|| Bridge::start(factory(), config))
            .map(Arc::clone)
    }

    /// The bridge, if it has been built
    pub fn get(&self) -> Option<Arc<Bridge>> {
        self.cell.get().cloned()
    }

    /// `Bridge::send` on the built bridge
    pub fn send(&self, query: &str) -> Result<ClientId, BridgeError> {
        self.cell
            .get()
            .ok_or(BridgeError::EngineUnavailable)?
            .send(query)
    }

    /// `Bridge::execute` on the built bridge; `None` before construction
    pub fn execute(&self, query: &str) -> Option<String> {
        self.cell.get()?.execute(query)
    }

    /// Shut the built bridge down, if any
    pub fn shutdown(&self) {
        if let Some(bridge) = self.cell.get() {
            bridge.shutdown();
        }
    }
}

static GLOBAL: BridgeSlot = BridgeSlot::new();

/// The process-wide slot
pub fn global() -> &'static BridgeSlot {
    &GLOBAL
}

/// Get the process-wide bridge, building it on `factory`'s engine on first use
pub fn acquire_with<F>(config: BridgeConfig, factory: F) -> Result<Arc<Bridge>, BridgeError>
where
    F: FnOnce() -> Arc<dyn MessagingEngine>,
{
    GLOBAL.acquire_with(config, factory)
}

/// Get the process-wide bridge over libtdjson, configured from the environment
#[cfg(feature = "tdjson")]
pub fn acquire() -> Result<Arc<Bridge>, BridgeError> {
    GLOBAL.acquire_with(BridgeConfig::from_env(), || {
        Arc::new(crate::engine::tdjson::TdJsonEngine::new())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::ScriptedEngine;
    use crate::engine::EngineError;
    use std::time::Instant;

    fn fast_config() -> BridgeConfig {
        BridgeConfig::default().with_poll_timeout(Duration::from_millis(10))
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let engine = Arc::new(ScriptedEngine::new(1));
        let config = BridgeConfig::default().with_poll_timeout(Duration::ZERO);
        let result = Bridge::start(engine.clone(), config);

        assert!(matches!(result, Err(BridgeError::InvalidConfig(_))));
        assert_eq!(engine.clients_created(), 0);
    }

    #[test]
    fn poll_errors_are_counted_and_survived() {
        let engine = Arc::new(ScriptedEngine::new(1));
        engine.push_error(EngineError::Failed("transient".into()));
        engine.push_update("updateOption");
        let bridge = Bridge::start(engine.clone(), fast_config()).unwrap();

        assert!(wait_until(|| bridge.stats().updates == 1));
        let stats = bridge.stats();
        assert_eq!(stats.poll_errors, 1);
        assert!(bridge.is_running());
        bridge.shutdown();
    }

    #[test]
    fn drop_stops_receiver() {
        let engine = Arc::new(ScriptedEngine::new(1));
        let bridge = Bridge::start(engine.clone(), fast_config()).unwrap();
        drop(bridge);

        // Only the test's handle remains once the thread has released its clone
        assert_eq!(Arc::strong_count(&engine), 1);
    }

    #[test]
    fn shutdown_from_callback_does_not_deadlock() {
        let engine = Arc::new(ScriptedEngine::new(1));
        let bridge = Bridge::start(engine.clone(), fast_config()).unwrap();

        let weak = Arc::downgrade(&bridge);
        bridge.set_callback(move |_| {
            if let Some(b) = weak.upgrade() {
                b.shutdown();
            }
        });
        engine.push_update("updateOption");

        assert!(wait_until(|| !bridge.is_running()));
        assert!(matches!(bridge.send("x"), Err(BridgeError::EngineUnavailable)));
    }
}
