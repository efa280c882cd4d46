// Direct SSH backend via russh: password auth, interactive pty + shell.

use super::{BackendKind, CHANNEL_CAPACITY, TerminalBridge, TerminalError, TerminalEvent};
use crate::config::TerminalConfig;
use async_trait::async_trait;
use bytes::Bytes;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

struct AcceptAllKeys;

// the Handler trait is declared with async_trait, so the impl must be too
#[async_trait]
impl client::Handler for AcceptAllKeys {
    type Error = russh::Error;

    // host identity is vouched for by the external access gate
    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Opens a direct SSH session and wires its output to the session's event
/// channel. Connect and auth are each bounded by the configured timeout.
pub async fn open_ssh(
    target: SshTarget,
    config: &TerminalConfig,
    events: mpsc::Sender<TerminalEvent>,
) -> Result<TerminalBridge, TerminalError> {
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
    let ssh_config = Arc::new(client::Config::default());

    let mut handle = tokio::time::timeout(
        connect_timeout,
        client::connect(
            ssh_config,
            (target.host.as_str(), target.port),
            AcceptAllKeys,
        ),
    )
    .await
    .map_err(|_| TerminalError::ConnectTimeout)??;

    let authenticated = tokio::time::timeout(
        connect_timeout,
        handle.authenticate_password(target.username.as_str(), target.password.as_str()),
    )
    .await
    .map_err(|_| TerminalError::ConnectTimeout)??;
    if !authenticated {
        return Err(TerminalError::AuthFailed);
    }

    let mut channel = handle.channel_open_session().await?;
    channel
        .request_pty(false, "xterm-256color", 80, 24, 0, 0, &[])
        .await?;
    channel.request_shell(false).await?;
    debug!(host = %target.host, backend = "directSsh", "ssh shell established");

    let (input_tx, mut input_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        let mut exit_code: Option<i64> = None;
        loop {
            tokio::select! {
                input = input_rx.recv() => match input {
                    Some(data) => {
                        if let Err(e) = channel.data(&data[..]).await {
                            warn!(error = %e, backend = "directSsh", "ssh write failed");
                            let _ = events
                                .send(TerminalEvent::Error(format!("ssh write failed: {e}")))
                                .await;
                            break;
                        }
                    }
                    // close requested by the owning session
                    None => {
                        let _ = channel.eof().await;
                        break;
                    }
                },
                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        if events
                            .send(TerminalEvent::Data(Bytes::copy_from_slice(&data)))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(ChannelMsg::ExtendedData { data, .. }) => {
                        if events
                            .send(TerminalEvent::Data(Bytes::copy_from_slice(&data)))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        exit_code = Some(i64::from(exit_status));
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                        let _ = events.send(TerminalEvent::Exit(exit_code)).await;
                        break;
                    }
                    Some(_) => {}
                },
            }
        }
        let _ = handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await;
        debug!(backend = "directSsh", "ssh session closed");
    });

    Ok(TerminalBridge::new(BackendKind::DirectSsh, input_tx, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::client::Handler;

    #[tokio::test]
    async fn any_host_key_is_accepted() {
        let key = russh_keys::key::KeyPair::generate_ed25519()
            .expect("ed25519 keygen")
            .clone_public_key()
            .expect("public half");
        let mut handler = AcceptAllKeys;
        assert!(handler.check_server_key(&key).await.unwrap());
    }
}
