// Container lifecycle event watcher: one supervised task shared by all
// sessions, publishing classified events to a broadcast channel.

use crate::models::{AlertCategory, AlertLevel, RuntimeEvent, now_millis, short_id};
use bollard::Docker;
use bollard::models::{EventMessage, EventMessageTypeEnum};
use bollard::system::EventsOptions;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub struct EventWatcher {
    task: tokio::task::JoinHandle<()>,
}

impl EventWatcher {
    /// Spawns the global watcher. When the runtime's event stream ends or
    /// errors it resubscribes after `backoff`, indefinitely, until stopped.
    pub fn spawn(docker: Docker, tx: broadcast::Sender<RuntimeEvent>, backoff: Duration) -> Self {
        let task = tokio::spawn(async move {
            loop {
                let mut filters = HashMap::new();
                filters.insert("type".to_string(), vec!["container".to_string()]);
                let options = EventsOptions::<String> {
                    filters,
                    ..Default::default()
                };
                let mut stream = docker.events(Some(options));
                info!(operation = "events_subscribe", "subscribed to container event stream");
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(message) => {
                            if let Some(event) = classify(&message) {
                                debug!(
                                    action = %event.action,
                                    container = %event.container_name,
                                    "runtime event"
                                );
                                // no receivers is fine; clients come and go
                                let _ = tx.send(event);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, operation = "events_stream", "event stream error");
                            break;
                        }
                    }
                }
                warn!(
                    backoff_secs = backoff.as_secs(),
                    "event stream ended; resubscribing after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        });
        Self { task }
    }

    /// Terminates the watcher task and its event subscription.
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Classifies one raw event. Returns None for actions that are not
/// broadcast-worthy and for malformed events.
pub(crate) fn classify(message: &EventMessage) -> Option<RuntimeEvent> {
    if message.typ != Some(EventMessageTypeEnum::CONTAINER) {
        return None;
    }
    let action = message.action.as_deref()?;
    let level = classify_action(action)?;

    let attributes = message.actor.as_ref().and_then(|a| a.attributes.as_ref());
    let container_id = message
        .actor
        .as_ref()
        .and_then(|a| a.id.as_deref())
        .map(short_id)
        .unwrap_or_default();
    let container_name = attributes
        .and_then(|a| a.get("name"))
        .cloned()
        .unwrap_or_default();
    let image = attributes
        .and_then(|a| a.get("image"))
        .cloned()
        .unwrap_or_default();
    let timestamp = message
        .time
        .and_then(|t| u64::try_from(t).ok())
        .map(|t| t * 1000)
        .unwrap_or_else(now_millis);

    Some(RuntimeEvent {
        level,
        category: AlertCategory::Container,
        action: action.to_string(),
        message: format!("Container {container_name} {action}"),
        recommendation: recommendation(action).map(str::to_string),
        container_id,
        container_name,
        image,
        timestamp,
    })
}

pub(crate) fn classify_action(action: &str) -> Option<AlertLevel> {
    match action {
        "die" | "kill" | "oom" | "stop" => Some(AlertLevel::Critical),
        "pause" | "restart" | "start" | "unpause" => Some(AlertLevel::Info),
        _ => None,
    }
}

/// Fixed recommendation per action; unmapped actions carry none.
pub(crate) fn recommendation(action: &str) -> Option<&'static str> {
    match action {
        "die" => Some("Check container logs immediately and restart if required."),
        "oom" => Some("Increase memory limits or optimize the application."),
        "kill" => Some("Verify the kill was intentional; check for OOM activity on the host."),
        "stop" => Some("Restart the container if it is expected to be running."),
        _ => None,
    }
}
