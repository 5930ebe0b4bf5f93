//! Test doubles for running the webhook pipeline without spawning processes.
//!
//! Enabled with the `test-support` feature:
//!
//! ```toml
//! [dev-dependencies]
//! trigger-hook = { path = "...", features = ["test-support"] }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::dispatch::{DispatchError, TriggerLauncher};

// ── RecordingLauncher ─────────────────────────────────────────────────────────

/// Records every endpoint launched. Launches succeed unless told otherwise.
#[derive(Clone, Default)]
pub struct RecordingLauncher {
    calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    panicking: Arc<Mutex<HashSet<String>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make launches of `endpoint` return [`DispatchError::Failed`].
    pub fn fail_for(&self, endpoint: &str) {
        self.failing.lock().unwrap().insert(endpoint.to_string());
    }

    /// Make launches of `endpoint` panic.
    pub fn panic_for(&self, endpoint: &str) {
        self.panicking.lock().unwrap().insert(endpoint.to_string());
    }

    /// Hold launches of `endpoint` for `delay` before completing.
    pub fn delay_for(&self, endpoint: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), delay);
    }

    /// Endpoints in the order their launches started.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Poll until at least `count` launches were recorded or `timeout` elapses.
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.call_count() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl TriggerLauncher for RecordingLauncher {
    async fn launch(&self, endpoint: &str) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push(endpoint.to_string());

        let delay = self.delays.lock().unwrap().get(endpoint).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.panicking.lock().unwrap().contains(endpoint) {
            panic!("trigger launch for {endpoint} blew up: boom");
        }

        if self.failing.lock().unwrap().contains(endpoint) {
            return Err(DispatchError::Failed {
                endpoint: endpoint.to_string(),
                reason: "configured to fail".to_string(),
            });
        }

        Ok(())
    }
}
