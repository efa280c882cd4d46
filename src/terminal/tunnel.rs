// SSH through an access-proxy tunnel: a local ssh subprocess with a
// ProxyCommand hop. The tunneled hop cannot take a password as a connection
// parameter, so this backend scrapes the subprocess output for a password
// prompt. Known limitation: the prompt match is a heuristic; it is attempted
// exactly once and bounded by prompt_timeout_secs.

use super::{BackendKind, CHANNEL_CAPACITY, TerminalBridge, TerminalError, TerminalEvent};
use crate::config::TerminalConfig;
use bytes::Bytes;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct TunnelTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Spawns the tunneled ssh subprocess and bridges its stdio.
pub async fn open_tunnel(
    target: TunnelTarget,
    config: &TerminalConfig,
    events: mpsc::Sender<TerminalEvent>,
) -> Result<TerminalBridge, TerminalError> {
    let proxy_command = config.tunnel_proxy_command.replace("%h", &target.host);
    let mut child = Command::new("ssh")
        .arg("-tt")
        .arg("-p")
        .arg(target.port.to_string())
        .arg("-o")
        .arg("StrictHostKeyChecking=no")
        .arg("-o")
        .arg("UserKnownHostsFile=/dev/null")
        .arg("-o")
        .arg(format!("ProxyCommand={proxy_command}"))
        .arg(format!("{}@{}", target.username, target.host))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(TerminalError::Spawn)?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| TerminalError::Spawn(std::io::Error::other("stdin not captured")))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| TerminalError::Spawn(std::io::Error::other("stdout not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| TerminalError::Spawn(std::io::Error::other("stderr not captured")))?;
    debug!(host = %target.host, backend = "tunnelSsh", "tunnel subprocess spawned");

    // stderr is pumped separately so its EOF cannot stall the main loop
    let stderr_events = events.clone();
    tokio::spawn(async move {
        let mut stderr = stderr;
        let mut buf = [0u8; 4096];
        loop {
            match stderr.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if stderr_events
                        .send(TerminalEvent::Data(Bytes::copy_from_slice(&buf[..n])))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    });

    let password = target.password;
    let prompt_timeout = Duration::from_secs(config.prompt_timeout_secs);
    let (input_tx, mut input_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        let prompt_deadline = tokio::time::Instant::now() + prompt_timeout;
        let mut password_sent = false;
        let mut window = String::new();
        let mut buf = [0u8; 4096];
        loop {
            tokio::select! {
                input = input_rx.recv() => match input {
                    Some(data) => {
                        if stdin.write_all(&data).await.is_err() {
                            break;
                        }
                    }
                    // close requested by the owning session
                    None => break,
                },
                read = stdout.read(&mut buf) => match read {
                    Ok(0) | Err(_) => {
                        let code = child.wait().await.ok().and_then(|s| s.code()).map(i64::from);
                        let _ = events.send(TerminalEvent::Exit(code)).await;
                        return;
                    }
                    Ok(n) => {
                        let chunk = &buf[..n];
                        if !password_sent && scan_for_prompt(&mut window, chunk) {
                            password_sent = true;
                            debug!(backend = "tunnelSsh", "password prompt detected");
                            if stdin.write_all(password.as_bytes()).await.is_err()
                                || stdin.write_all(b"\n").await.is_err()
                            {
                                let _ = events
                                    .send(TerminalEvent::Error("failed to submit password".into()))
                                    .await;
                                break;
                            }
                        }
                        if events
                            .send(TerminalEvent::Data(Bytes::copy_from_slice(chunk)))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                },
                _ = tokio::time::sleep_until(prompt_deadline), if !password_sent => {
                    warn!(backend = "tunnelSsh", "no password prompt within timeout");
                    let _ = events
                        .send(TerminalEvent::Error(
                            "no password prompt from tunnel within timeout".into(),
                        ))
                        .await;
                    break;
                }
            }
        }
        if let Err(e) = child.kill().await {
            debug!(error = %e, backend = "tunnelSsh", "kill after close");
        }
    });

    Ok(TerminalBridge::new(BackendKind::TunnelSsh, input_tx, task))
}

/// Accumulates a lowercased tail of the output and reports whether the
/// password prompt has appeared, tolerating prompts split across reads.
fn scan_for_prompt(window: &mut String, chunk: &[u8]) -> bool {
    window.push_str(&String::from_utf8_lossy(chunk).to_lowercase());
    if window.len() > 1024 {
        let excess = window.len() - 256;
        if let Some(cut) = (excess..window.len()).find(|&i| window.is_char_boundary(i)) {
            window.drain(..cut);
        }
    }
    window.contains("password:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_detected_case_insensitively() {
        let mut window = String::new();
        assert!(scan_for_prompt(&mut window, b"user@host's Password: "));
    }

    #[test]
    fn prompt_detected_across_split_reads() {
        let mut window = String::new();
        assert!(!scan_for_prompt(&mut window, b"passw"));
        assert!(scan_for_prompt(&mut window, b"ord: "));
    }

    #[test]
    fn unrelated_output_does_not_match() {
        let mut window = String::new();
        assert!(!scan_for_prompt(&mut window, b"login: "));
        assert!(!scan_for_prompt(&mut window, b"Warning: Permanently added host"));
    }

    #[test]
    fn window_stays_bounded_without_losing_the_tail() {
        let mut window = String::new();
        for _ in 0..100 {
            assert!(!scan_for_prompt(&mut window, &[b'x'; 100]));
        }
        assert!(window.len() <= 1024 + 100);
        assert!(scan_for_prompt(&mut window, b"Password:"));
    }
}
