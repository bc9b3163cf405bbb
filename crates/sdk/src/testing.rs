//! An in-memory [`Transport`] for tests and offline demos.
//!
//! [`ScriptedTransport`] answers each request from a per-path queue of
//! scripted replies and records every request it receives. When a path's
//! queue is down to its last reply, that reply is repeated for every later
//! request, which makes "pending forever" and "always fails" easy to script.
//!
//! A request is recorded when its reply is produced, after any configured
//! delay, so [`ScriptedTransport::calls`] is in completion order.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use protocol::{BReactError, Transport, TransportRequest};
use serde_json::Value;

#[derive(Debug, Clone)]
enum Reply {
    Json(Value),
    Fail(String),
}

/// A scripted, recording [`Transport`].
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<TransportRequest>>,
    closes: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a JSON reply for requests to `path`.
    pub fn reply(&self, path: &str, body: Value) -> &Self {
        self.push(path, Reply::Json(body))
    }

    /// Queues a transport failure for requests to `path`.
    pub fn fail(&self, path: &str, message: &str) -> &Self {
        self.push(path, Reply::Fail(message.to_string()))
    }

    /// Delays every reply for `path` by `delay`.
    pub fn delay(&self, path: &str, delay: Duration) -> &Self {
        self.delays.lock().insert(path.to_string(), delay);
        self
    }

    /// Every request answered so far, in completion order.
    pub fn calls(&self) -> Vec<TransportRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests answered for `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.path == path).count()
    }

    /// Number of times [`Transport::close`] was called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn push(&self, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    fn next_reply(&self, path: &str) -> Option<Reply> {
        let mut routes = self.routes.lock();
        let queue = routes.get_mut(path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: TransportRequest) -> Result<Value, BReactError> {
        let path = request.path.to_string();
        let delay = self.delays.lock().get(&path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().push(request);
        match self.next_reply(&path) {
            Some(Reply::Json(body)) => Ok(body),
            Some(Reply::Fail(message)) => Err(BReactError::client(message)),
            None => Err(BReactError::client(format!("HTTP request failed: no route for {path}"))),
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
