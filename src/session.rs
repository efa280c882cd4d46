// Per-client session state: at most one sampling timer and one terminal
// bridge, owned exclusively by the client's WebSocket handler task.

use crate::terminal::{TerminalBridge, TerminalEvent, TerminalSlot};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::debug;

pub struct ClientSession {
    pub id: String,
    pub monitor: Option<Interval>,
    pub terminal: Option<ActiveTerminal>,
    interval_ms: u64,
}

/// A terminal bridge paired with its event stream and slot claim.
pub struct ActiveTerminal {
    bridge: TerminalBridge,
    events: mpsc::Receiver<TerminalEvent>,
    _slot: TerminalSlot,
}

impl ActiveTerminal {
    pub fn new(
        bridge: TerminalBridge,
        events: mpsc::Receiver<TerminalEvent>,
        slot: TerminalSlot,
    ) -> Self {
        Self {
            bridge,
            events,
            _slot: slot,
        }
    }
}

impl ClientSession {
    pub fn new(id: String, default_interval_ms: u64) -> Self {
        Self {
            id,
            monitor: None,
            terminal: None,
            interval_ms: default_interval_ms,
        }
    }

    /// (Re)arms the sampling timer; replaces any existing one rather than
    /// stacking. The first tick fires immediately.
    pub fn start_monitoring(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
        let mut tick = interval(Duration::from_millis(interval_ms.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.monitor = Some(tick);
    }

    /// Cancels the sampling timer; a no-op when none is armed.
    pub fn stop_monitoring(&mut self) {
        self.monitor = None;
    }

    pub fn monitoring_active(&self) -> bool {
        self.monitor.is_some()
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Installs a new terminal, fully tearing down any prior one first.
    pub async fn install_terminal(&mut self, terminal: ActiveTerminal) {
        self.close_terminal().await;
        self.terminal = Some(terminal);
    }

    /// Routes terminal input to the active backend; ignored when none.
    pub async fn terminal_write(&mut self, data: Bytes) {
        if let Some(term) = &self.terminal {
            term.bridge.write(data).await;
        }
    }

    /// Tears down the active terminal; a no-op when none is open.
    pub async fn close_terminal(&mut self) {
        if let Some(term) = self.terminal.take() {
            debug!(session_id = %self.id, backend = %term.bridge.kind(), "closing terminal backend");
            term.bridge.shutdown().await;
        }
    }

    /// Releases all session resources; called once on disconnect.
    pub async fn shutdown(&mut self) {
        self.stop_monitoring();
        self.close_terminal().await;
    }
}

/// Resolves on the next sampling tick; pends forever when monitoring is off.
pub async fn next_tick(monitor: &mut Option<Interval>) {
    match monitor {
        Some(tick) => {
            tick.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Next event from the active terminal; pends forever when none is open.
/// `None` means the backend task is gone and the terminal should be dropped.
pub async fn next_terminal_event(terminal: &mut Option<ActiveTerminal>) -> Option<TerminalEvent> {
    match terminal {
        Some(term) => term.events.recv().await,
        None => std::future::pending().await,
    }
}
