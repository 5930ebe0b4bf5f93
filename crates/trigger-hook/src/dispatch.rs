//! Launching the external trigger executable.
//!
//! One push can activate several trigger endpoints. Each endpoint gets its
//! own task so a slow or failing trigger never holds up another one, and
//! outcomes are only ever reported through logs: the HTTP response has been
//! sent long before most triggers finish.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt as _;
use thiserror::Error;
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument as _;
use trigger_types::ActivatedTriggerSet;

/// How long a timed-out trigger gets between SIGTERM and SIGKILL.
const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn trigger for {endpoint}: {source}")]
    Spawn {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting on trigger for {endpoint}: {source}")]
    Wait {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("trigger for {endpoint} exited with {status}")]
    Exit { endpoint: String, status: ExitStatus },

    #[error("trigger for {endpoint} timed out after {timeout:?}")]
    TimedOut { endpoint: String, timeout: Duration },

    #[error("trigger for {endpoint} failed: {reason}")]
    Failed { endpoint: String, reason: String },

    #[error("trigger task for {endpoint} panicked: {reason}")]
    Panicked { endpoint: String, reason: String },
}

/// Launch the trigger mechanism for one endpoint and wait for it to finish.
///
/// One trait, one operation. Tests replace process spawning by implementing it.
pub trait TriggerLauncher: Send + Sync + Clone + 'static {
    fn launch(&self, endpoint: &str) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Runs `<bin> <endpoint>` as a child process.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    bin: PathBuf,
    timeout: Duration,
}

impl CommandLauncher {
    pub fn new(bin: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }
}

impl TriggerLauncher for CommandLauncher {
    async fn launch(&self, endpoint: &str) -> Result<(), DispatchError> {
        let bin = self.bin.display().to_string();

        let mut child = tokio::process::Command::new(&self.bin)
            .arg(endpoint)
            .stdin(Stdio::null())
            // The child dies with us if the server is torn down mid-run.
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DispatchError::Spawn {
                endpoint: endpoint.to_string(),
                source,
            })?;

        tracing::debug!(bin = %bin, endpoint, pid = ?child.id(), "Spawned trigger");

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(DispatchError::Exit {
                endpoint: endpoint.to_string(),
                status,
            }),
            Ok(Err(source)) => Err(DispatchError::Wait {
                endpoint: endpoint.to_string(),
                source,
            }),
            Err(_) => {
                kill_gracefully(&mut child, &bin, self.timeout).await;
                Err(DispatchError::TimedOut {
                    endpoint: endpoint.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// Send SIGTERM and wait out the grace period; escalate to SIGKILL if needed.
///
/// On non-Unix platforms SIGTERM is not available, so we go straight to SIGKILL.
async fn kill_gracefully(child: &mut tokio::process::Child, bin: &str, timeout: Duration) {
    tracing::warn!(bin, ?timeout, "Trigger timed out, sending SIGTERM");

    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        match tokio::time::timeout(KILL_GRACE_PERIOD, child.wait()).await {
            Ok(_) => return,
            Err(_) => tracing::warn!(bin, "SIGTERM ignored, escalating to SIGKILL"),
        }
    }

    let _ = child.start_kill();
    match tokio::time::timeout(KILL_GRACE_PERIOD, child.wait()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::error!(bin, error = %e, "Error waiting for killed trigger"),
        Err(_) => tracing::error!(bin, "Trigger still alive after SIGKILL"),
    }
}

/// Result of one endpoint's trigger run.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub endpoint: String,
    pub result: Result<(), DispatchError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fires every endpoint of an [`ActivatedTriggerSet`] exactly once, concurrently.
///
/// Clones share the count of detached dispatches still running.
#[derive(Debug, Clone)]
pub struct Dispatcher<L> {
    launcher: L,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight count when a detached dispatch ends, however it ends.
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<L: TriggerLauncher> Dispatcher<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Detached dispatches started by [`spawn_detached`](Self::spawn_detached)
    /// that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Launch all endpoints and wait for every one of them.
    ///
    /// Outcomes arrive in completion order, not set order.
    pub async fn dispatch(&self, endpoints: &ActivatedTriggerSet) -> Vec<DispatchOutcome> {
        let mut tasks = JoinSet::new();

        for endpoint in endpoints.iter() {
            let launcher = self.launcher.clone();
            let endpoint = endpoint.to_string();
            tasks.spawn(
                async move {
                    let result = match AssertUnwindSafe(launcher.launch(&endpoint))
                        .catch_unwind()
                        .await
                    {
                        Ok(result) => result,
                        Err(panic) => Err(DispatchError::Panicked {
                            endpoint: endpoint.clone(),
                            reason: panic_message(panic.as_ref()),
                        }),
                    };
                    log_outcome(&endpoint, &result);
                    DispatchOutcome { endpoint, result }
                }
                .in_current_span(),
            );
        }

        let mut outcomes = Vec::with_capacity(endpoints.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!(error = %e, "Trigger task did not complete"),
            }
        }
        outcomes
    }

    /// Run [`dispatch`](Self::dispatch) in the background.
    ///
    /// Nothing is reported back to the caller except through the returned
    /// handle; request handlers drop it.
    pub fn spawn_detached(&self, endpoints: ActivatedTriggerSet) -> JoinHandle<Vec<DispatchOutcome>> {
        let dispatcher = self.clone();
        let guard = InFlightGuard::enter(&self.in_flight);
        tokio::spawn(
            async move {
                let _guard = guard;
                let outcomes = dispatcher.dispatch(&endpoints).await;
                let failed = outcomes.iter().filter(|o| !o.is_success()).count();
                tracing::info!(
                    triggered = outcomes.len(),
                    failed,
                    "Trigger dispatch finished"
                );
                outcomes
            }
            .in_current_span(),
        )
    }
}

fn log_outcome(endpoint: &str, result: &Result<(), DispatchError>) {
    match result {
        Ok(()) => tracing::info!(endpoint, "Trigger completed"),
        Err(e @ DispatchError::Exit { .. }) => {
            tracing::warn!(endpoint, error = %e, "Trigger exited with non-zero status")
        }
        Err(e) => tracing::error!(endpoint, error = %e, "Trigger failed"),
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
