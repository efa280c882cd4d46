// In-container command execution via the runtime's exec API.

use super::{BackendKind, CHANNEL_CAPACITY, TerminalBridge, TerminalError, TerminalEvent};
use bollard::Docker;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bytes::Bytes;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Delay before nudging the shell with a newline so it prints a prompt.
const PROMPT_NUDGE_DELAY: Duration = Duration::from_millis(100);

/// Starts an interactive exec session in the target container and bridges
/// its tty stream.
pub async fn open_exec(
    docker: Docker,
    container_id: &str,
    shell: &str,
    events: mpsc::Sender<TerminalEvent>,
) -> Result<TerminalBridge, TerminalError> {
    let exec = docker
        .create_exec(
            container_id,
            CreateExecOptions {
                attach_stdin: Some(true),
                attach_stdout: Some(true),
                attach_stderr: Some(true),
                tty: Some(true),
                cmd: Some(vec![shell.to_string()]),
                ..Default::default()
            },
        )
        .await?;

    let StartExecResults::Attached {
        mut output,
        mut input,
    } = docker.start_exec(&exec.id, None).await?
    else {
        return Err(TerminalError::NotAttached);
    };
    debug!(container = %container_id, shell = %shell, backend = "containerExec", "exec session started");

    let exec_id = exec.id;
    let (input_tx, mut input_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        // the shell may not print a prompt until it receives input
        let nudge = tokio::time::sleep(PROMPT_NUDGE_DELAY);
        tokio::pin!(nudge);
        let mut nudged = false;
        loop {
            tokio::select! {
                _ = &mut nudge, if !nudged => {
                    nudged = true;
                    if input.write_all(b"\n").await.is_err() {
                        warn!(backend = "containerExec", "prompt nudge write failed");
                    }
                }
                msg = input_rx.recv() => match msg {
                    Some(data) => {
                        if input.write_all(&data).await.is_err() {
                            break;
                        }
                    }
                    // close requested; dropping the attached stream ends the exec
                    None => break,
                },
                item = output.next() => match item {
                    Some(Ok(log)) => {
                        if events.send(TerminalEvent::Data(log.into_bytes())).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, backend = "containerExec", "exec output error");
                        let _ = events
                            .send(TerminalEvent::Error(format!("exec stream error: {e}")))
                            .await;
                        break;
                    }
                    None => {
                        let code = docker
                            .inspect_exec(&exec_id)
                            .await
                            .ok()
                            .and_then(|i| i.exit_code);
                        let _ = events.send(TerminalEvent::Exit(code)).await;
                        break;
                    }
                },
            }
        }
        debug!(backend = "containerExec", "exec session closed");
    });

    Ok(TerminalBridge::new(
        BackendKind::ContainerExec,
        input_tx,
        task,
    ))
}
