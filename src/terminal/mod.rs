// Terminal backends: each bridges a remote byte stream (SSH session,
// tunneled ssh subprocess, or in-container exec) to one client session.

mod exec;
mod ssh;
mod tunnel;

pub use exec::open_exec;
pub use ssh::{SshTarget, open_ssh};
pub use tunnel::{TunnelTarget, open_tunnel};

use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// How long a backend task gets to exit cleanly after its input closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub(crate) const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    DirectSsh,
    TunnelSsh,
    ContainerExec,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BackendKind::DirectSsh => "directSsh",
            BackendKind::TunnelSsh => "tunnelSsh",
            BackendKind::ContainerExec => "containerExec",
        })
    }
}

/// Events flowing from a backend task to the owning client session.
#[derive(Debug)]
pub enum TerminalEvent {
    Data(Bytes),
    Exit(Option<i64>),
    Error(String),
}

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("connection timed out")]
    ConnectTimeout,
    #[error("authentication failed")]
    AuthFailed,
    #[error("ssh error: {0}")]
    Ssh(#[from] russh::Error),
    #[error("failed to spawn subprocess: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("exec session did not attach")]
    NotAttached,
}

/// RAII claim against the per-instance ceiling on open terminals.
pub struct TerminalSlot(Arc<AtomicUsize>);

impl TerminalSlot {
    /// Claims a slot, or None when the ceiling is reached.
    pub fn claim(counter: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()
            .map(|_| Self(counter.clone()))
    }
}

impl Drop for TerminalSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// A live terminal backend plus its writable endpoint. At most one exists
/// per client session at any time.
pub struct TerminalBridge {
    kind: BackendKind,
    input_tx: mpsc::Sender<Bytes>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TerminalBridge {
    fn new(kind: BackendKind, input_tx: mpsc::Sender<Bytes>, task: tokio::task::JoinHandle<()>) -> Self {
        Self {
            kind,
            input_tx,
            task: Some(task),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Routes client input to the backend; dropped silently if it is gone.
    pub async fn write(&self, data: Bytes) {
        let _ = self.input_tx.send(data).await;
    }

    /// Closes the input channel, which tells the backend task to tear down
    /// its process/stream, then waits briefly before aborting it outright.
    pub async fn shutdown(mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        drop(self);
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            task.abort();
        }
    }
}

impl Drop for TerminalBridge {
    fn drop(&mut self) {
        // a bridge dropped without shutdown() must still release its backend
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Test backend: echoes input to a probe channel, exits when input closes.
#[cfg(test)]
pub(crate) fn stub(events: mpsc::Sender<TerminalEvent>) -> (TerminalBridge, mpsc::Receiver<Bytes>) {
    let (input_tx, mut input_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (probe_tx, probe_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        while let Some(data) = input_rx.recv().await {
            if probe_tx.send(data).await.is_err() {
                break;
            }
        }
        let _ = events.send(TerminalEvent::Exit(Some(0))).await;
    });
    (
        TerminalBridge::new(BackendKind::ContainerExec, input_tx, task),
        probe_rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slot_claim_enforces_ceiling() {
        let counter = Arc::new(AtomicUsize::new(0));
        let a = TerminalSlot::claim(&counter, 2);
        let b = TerminalSlot::claim(&counter, 2);
        assert!(a.is_some() && b.is_some());
        assert!(TerminalSlot::claim(&counter, 2).is_none());
        drop(a);
        assert!(TerminalSlot::claim(&counter, 2).is_some());
    }

    #[tokio::test]
    async fn shutdown_closes_backend_input() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (bridge, mut probe) = stub(events_tx);
        bridge.write(Bytes::from_static(b"ls\n")).await;
        assert_eq!(&probe.recv().await.unwrap()[..], b"ls\n");
        bridge.shutdown().await;
        // input endpoint closed: the stub reports exit and drops its probe
        assert!(matches!(events_rx.recv().await, Some(TerminalEvent::Exit(Some(0)))));
        assert!(probe.recv().await.is_none());
    }
}
