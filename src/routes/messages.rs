// Wire protocol for the real-time channel. JSON text frames, tagged by
// "type" in camelCase.

use crate::models::{Alert, MonitoringSnapshot, RuntimeEvent};
use serde::{Deserialize, Serialize};

/// Client → service control messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    StartMonitoring {
        interval: Option<u64>,
    },
    StopMonitoring,
    UpdateMonitoringInterval {
        interval: u64,
    },
    #[serde(rename_all = "camelCase")]
    TerminalOpenSsh {
        host: String,
        #[serde(default = "default_ssh_port")]
        port: u16,
        username: String,
        password: String,
        #[serde(default)]
        use_tunnel: bool,
    },
    #[serde(rename_all = "camelCase")]
    TerminalOpenExec {
        container_id: String,
        #[serde(default = "default_shell")]
        shell: String,
    },
    TerminalInput {
        data: String,
    },
    TerminalClose,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

/// Service → client messages. Payload-carrying models keep their own
/// "type" field, so they are nested rather than flattened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Connected {
        session_id: String,
        timestamp: u64,
    },
    MonitoringSnapshot {
        snapshot: MonitoringSnapshot,
    },
    Alert {
        alert: Alert,
    },
    RuntimeEvent {
        event: RuntimeEvent,
    },
    TerminalConnected,
    TerminalData {
        data: String,
    },
    TerminalExit {
        code: Option<i64>,
    },
    TerminalError {
        message: String,
    },
    MonitoringError {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertCategory, AlertLevel};

    #[test]
    fn start_monitoring_parses_with_and_without_interval() {
        let m: ClientMessage =
            serde_json::from_str(r#"{"type":"startMonitoring","interval":1000}"#).unwrap();
        assert!(matches!(m, ClientMessage::StartMonitoring { interval: Some(1000) }));
        let m: ClientMessage = serde_json::from_str(r#"{"type":"startMonitoring"}"#).unwrap();
        assert!(matches!(m, ClientMessage::StartMonitoring { interval: None }));
    }

    #[test]
    fn terminal_open_ssh_applies_defaults() {
        let m: ClientMessage = serde_json::from_str(
            r#"{"type":"terminalOpenSsh","host":"10.0.0.5","username":"root","password":"pw"}"#,
        )
        .unwrap();
        match m {
            ClientMessage::TerminalOpenSsh {
                host,
                port,
                use_tunnel,
                ..
            } => {
                assert_eq!(host, "10.0.0.5");
                assert_eq!(port, 22);
                assert!(!use_tunnel);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn terminal_open_exec_defaults_shell() {
        let m: ClientMessage =
            serde_json::from_str(r#"{"type":"terminalOpenExec","containerId":"abc123"}"#).unwrap();
        match m {
            ClientMessage::TerminalOpenExec { container_id, shell } => {
                assert_eq!(container_id, "abc123");
                assert_eq!(shell, "/bin/sh");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn malformed_messages_are_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"launchMissiles"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
        assert!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"terminalOpenSsh","host":"h"}"#)
                .is_err()
        );
    }

    #[test]
    fn server_messages_carry_expected_tags() {
        let v = serde_json::to_value(ServerMessage::Connected {
            session_id: "session-1".into(),
            timestamp: 7,
        })
        .unwrap();
        assert_eq!(v["type"], "connected");
        assert_eq!(v["sessionId"], "session-1");

        let v = serde_json::to_value(ServerMessage::TerminalExit { code: Some(0) }).unwrap();
        assert_eq!(v["type"], "terminalExit");
        assert_eq!(v["code"], 0);

        let v = serde_json::to_value(ServerMessage::TerminalConnected).unwrap();
        assert_eq!(v["type"], "terminalConnected");
    }

    #[test]
    fn runtime_event_nests_its_payload_under_event() {
        let event = RuntimeEvent {
            level: AlertLevel::Critical,
            category: AlertCategory::Container,
            action: "die".into(),
            message: "Container web die".into(),
            recommendation: None,
            container_id: "abcdef123456".into(),
            container_name: "web".into(),
            image: "nginx:latest".into(),
            timestamp: 1,
        };
        let v = serde_json::to_value(ServerMessage::RuntimeEvent { event }).unwrap();
        assert_eq!(v["type"], "runtimeEvent");
        assert_eq!(v["event"]["type"], "critical");
        assert_eq!(v["event"]["action"], "die");
    }
}
