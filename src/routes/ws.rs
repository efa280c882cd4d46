// WebSocket gateway: one dispatch loop per connected client, multiplexing
// control messages, the sampling timer, terminal output and the shared
// runtime-event broadcast.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

use super::AppState;
use super::messages::{ClientMessage, ServerMessage};
use crate::alerts;
use crate::models::{MonitoringSnapshot, now_millis};
use crate::session::{self, ActiveTerminal, ClientSession};
use crate::terminal::{self, TerminalError, TerminalEvent, TerminalSlot};

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

type WsSender = SplitSink<WebSocket, Message>;

pub(super) async fn ws_gateway(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let seq = state.conn_seq.fetch_add(1, Ordering::Relaxed);
        let session_id = format!("session-{seq}");
        if let Err(e) = handle_client(socket, state, session_id.clone()).await {
            info!(session_id = %session_id, error = %e, "client stream error");
        }
    })
}

async fn handle_client(
    socket: WebSocket,
    state: AppState,
    session_id: String,
) -> anyhow::Result<()> {
    info!(session_id = %session_id, "client connected");
    let (mut sender, mut receiver) = socket.split();
    let mut session = ClientSession::new(
        session_id.clone(),
        state.config.monitoring.default_interval_ms,
    );
    // subscribe before the ack so no broadcast can slip past a new client
    let mut events_rx = state.events_tx.subscribe();

    send(
        &mut sender,
        &ServerMessage::Connected {
            session_id,
            timestamp: now_millis(),
        },
    )
    .await?;

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            incoming = next_message(&mut receiver, &session.id) => {
                match incoming {
                    Some(msg) => {
                        if handle_message(&mut sender, &state, &mut session, msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = session::next_tick(&mut session.monitor) => {
                if push_snapshot(&mut sender, &state, &session.id).await.is_err() {
                    break;
                }
            }
            event = session::next_terminal_event(&mut session.terminal) => {
                if handle_terminal_event(&mut sender, &mut session, event).await.is_err() {
                    break;
                }
            }
            result = events_rx.recv() => {
                match result {
                    Ok(event) => {
                        if send(&mut sender, &ServerMessage::RuntimeEvent { event }).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(session_id = %session.id, skipped = n, "client lagged behind runtime events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }

    session.shutdown().await;
    info!(session_id = %session.id, "client disconnected");
    Ok(())
}

/// Next parseable control message; None when the connection is gone.
/// Malformed frames are rejected per-message and the connection stays up.
async fn next_message(
    receiver: &mut SplitStream<WebSocket>,
    session_id: &str,
) -> Option<ClientMessage> {
    loop {
        match receiver.next().await? {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => return Some(msg),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "malformed control message");
                }
            },
            Ok(Message::Close(_)) => return None,
            Ok(_) => {} // binary/ping/pong frames are ignored
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "socket receive error");
                return None;
            }
        }
    }
}

async fn handle_message(
    sender: &mut WsSender,
    state: &AppState,
    session: &mut ClientSession,
    msg: ClientMessage,
) -> anyhow::Result<()> {
    match msg {
        ClientMessage::StartMonitoring { interval } => {
            let interval = interval.unwrap_or(state.config.monitoring.default_interval_ms);
            debug!(session_id = %session.id, interval_ms = interval, "start monitoring");
            session.start_monitoring(interval);
        }
        ClientMessage::StopMonitoring => {
            debug!(session_id = %session.id, "stop monitoring");
            session.stop_monitoring();
        }
        ClientMessage::UpdateMonitoringInterval { interval } => {
            debug!(session_id = %session.id, interval_ms = interval, "update monitoring interval");
            session.stop_monitoring();
            session.start_monitoring(interval);
        }
        ClientMessage::TerminalOpenSsh {
            host,
            port,
            username,
            password,
            use_tunnel,
        } => {
            let Some(slot) = claim_slot(sender, state, session).await? else {
                return Ok(());
            };
            let (events_tx, events_rx) = mpsc::channel(terminal::CHANNEL_CAPACITY);
            let result = if use_tunnel {
                terminal::open_tunnel(
                    terminal::TunnelTarget {
                        host,
                        port,
                        username,
                        password,
                    },
                    &state.config.terminal,
                    events_tx,
                )
                .await
            } else {
                terminal::open_ssh(
                    terminal::SshTarget {
                        host,
                        port,
                        username,
                        password,
                    },
                    &state.config.terminal,
                    events_tx,
                )
                .await
            };
            finish_open(sender, session, result, events_rx, slot).await?;
        }
        ClientMessage::TerminalOpenExec {
            container_id,
            shell,
        } => {
            let Some(slot) = claim_slot(sender, state, session).await? else {
                return Ok(());
            };
            let (events_tx, events_rx) = mpsc::channel(terminal::CHANNEL_CAPACITY);
            let result = terminal::open_exec(
                state.docker_repo.client(),
                &container_id,
                &shell,
                events_tx,
            )
            .await;
            finish_open(sender, session, result, events_rx, slot).await?;
        }
        ClientMessage::TerminalInput { data } => {
            session.terminal_write(Bytes::from(data.into_bytes())).await;
        }
        ClientMessage::TerminalClose => {
            // safe to call with no terminal open
            session.close_terminal().await;
        }
    }
    Ok(())
}

/// Claims a terminal slot; closing the session's current terminal first so
/// a replacement open never counts twice.
async fn claim_slot(
    sender: &mut WsSender,
    state: &AppState,
    session: &mut ClientSession,
) -> anyhow::Result<Option<TerminalSlot>> {
    session.close_terminal().await;
    match TerminalSlot::claim(&state.open_terminals, state.config.terminal.max_concurrent) {
        Some(slot) => Ok(Some(slot)),
        None => {
            warn!(session_id = %session.id, "terminal concurrency ceiling reached");
            send(
                sender,
                &ServerMessage::TerminalError {
                    message: "too many open terminals on this instance".into(),
                },
            )
            .await?;
            Ok(None)
        }
    }
}

async fn finish_open(
    sender: &mut WsSender,
    session: &mut ClientSession,
    result: Result<terminal::TerminalBridge, TerminalError>,
    events_rx: mpsc::Receiver<TerminalEvent>,
    slot: TerminalSlot,
) -> anyhow::Result<()> {
    match result {
        Ok(bridge) => {
            info!(session_id = %session.id, backend = %bridge.kind(), "terminal opened");
            session
                .install_terminal(ActiveTerminal::new(bridge, events_rx, slot))
                .await;
            send(sender, &ServerMessage::TerminalConnected).await
        }
        Err(e) => {
            warn!(session_id = %session.id, error = %e, "terminal open failed");
            send(
                sender,
                &ServerMessage::TerminalError {
                    message: e.to_string(),
                },
            )
            .await
        }
    }
}

async fn handle_terminal_event(
    sender: &mut WsSender,
    session: &mut ClientSession,
    event: Option<TerminalEvent>,
) -> anyhow::Result<()> {
    match event {
        Some(TerminalEvent::Data(data)) => {
            send(
                sender,
                &ServerMessage::TerminalData {
                    data: String::from_utf8_lossy(&data).into_owned(),
                },
            )
            .await
        }
        Some(TerminalEvent::Exit(code)) => {
            debug!(session_id = %session.id, code = ?code, "terminal exited");
            session.close_terminal().await;
            send(sender, &ServerMessage::TerminalExit { code }).await
        }
        Some(TerminalEvent::Error(message)) => {
            warn!(session_id = %session.id, error = %message, "terminal backend error");
            session.close_terminal().await;
            send(sender, &ServerMessage::TerminalError { message }).await
        }
        // backend task gone without an exit event
        None => {
            session.close_terminal().await;
            send(sender, &ServerMessage::TerminalExit { code: None }).await
        }
    }
}

/// One sampling cycle: push a snapshot, then each alert as its own message.
/// A sampling failure is reported to the client; the timer keeps running.
async fn push_snapshot(
    sender: &mut WsSender,
    state: &AppState,
    session_id: &str,
) -> anyhow::Result<()> {
    let snapshot = match collect_snapshot(state).await {
        Ok(s) => s,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, operation = "collect_snapshot", "sampling failed");
            return send(
                sender,
                &ServerMessage::MonitoringError {
                    message: e.to_string(),
                },
            )
            .await;
        }
    };
    let alerts = snapshot.alerts.clone();
    send(sender, &ServerMessage::MonitoringSnapshot { snapshot }).await?;
    for alert in alerts {
        send(sender, &ServerMessage::Alert { alert }).await?;
    }
    Ok(())
}

async fn collect_snapshot(state: &AppState) -> anyhow::Result<MonitoringSnapshot> {
    let stats = state.docker_repo.sample_containers().await;
    let system_info = state.docker_repo.system_info(&state.host_repo).await?;
    let alerts = alerts::evaluate(&state.thresholds, &stats);
    Ok(MonitoringSnapshot {
        stats,
        system_info,
        alerts,
        timestamp: now_millis(),
    })
}

async fn send(sender: &mut WsSender, message: &ServerMessage) -> anyhow::Result<()> {
    let json = serde_json::to_string(message)?;
    timeout(WS_SEND_TIMEOUT, sender.send(Message::Text(json.into())))
        .await
        .map_err(|_| anyhow::anyhow!("websocket send timed out"))??;
    Ok(())
}
