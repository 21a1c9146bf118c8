use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ClientId, EngineError, EngineResponse, MessagingEngine, PollResult};

/// A scripted engine for tests. Serves queued poll results in order and
/// records every request it is given.
pub struct ScriptedEngine {
    client_id: ClientId,
    clients_created: AtomicUsize,
    queue: Mutex<VecDeque<PollResult>>,
    queued: Condvar,
    sent: Mutex<Vec<(ClientId, String)>>,
    executed: Mutex<Vec<String>>,
    execute_reply: Mutex<Option<String>>,
}

impl ScriptedEngine {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            clients_created: AtomicUsize::new(0),
            queue: Mutex::new(VecDeque::new()),
            queued: Condvar::new(),
            sent: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            execute_reply: Mutex::new(None),
        }
    }

    /// Queue an update for the client this engine hands out
    pub fn push_update(&self, payload: impl Into<String>) {
        self.push(PollResult::Update(EngineResponse::new(
            self.client_id,
            payload,
        )));
    }

    /// Queue a failed poll
    pub fn push_error(&self, error: EngineError) {
        self.push(PollResult::Error(error));
    }

    pub fn push(&self, result: PollResult) {
        self.queue.lock().push_back(result);
        self.queued.notify_one();
    }

    /// Number of poll results not yet consumed by `receive`
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Set the response returned by `execute`
    pub fn set_execute_reply(&self, reply: Option<String>) {
        *self.execute_reply.lock() = reply;
    }

    pub fn clients_created(&self) -> usize {
        self.clients_created.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(ClientId, String)> {
        self.sent.lock().clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

impl MessagingEngine for ScriptedEngine {
    fn create_client_id(&self) -> ClientId {
        self.clients_created.fetch_add(1, Ordering::SeqCst);
        self.client_id
    }

    fn send(&self, client_id: ClientId, request: &str) {
        self.sent.lock().push((client_id, request.to_string()));
    }

    fn receive(&self, timeout: Duration) -> PollResult {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            self.queued.wait_for(&mut queue, timeout);
        }
        queue.pop_front().unwrap_or(PollResult::Idle)
    }

    fn execute(&self, request: &str) -> Option<String> {
        self.executed.lock().push(request.to_string());
        self.execute_reply.lock().clone()
    }
}
