//! External process execution

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::pipeline::stage::StageCommand;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// How a stage process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    /// Process exit code; `-1` when terminated by a signal
    Code(i32),

    /// The process could not be started or awaited
    SpawnFailed(String),
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        matches!(self, ProcessExit::Code(0))
    }
}

/// Messages emitted by a launched process, ending with exactly one `Exited`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessMessage {
    /// A raw chunk of stdout or stderr
    Output(String),

    Exited(ProcessExit),
}

/// Starts stage processes
pub trait ProcessLauncher: Send + Sync {
    /// Start `command` without waiting for it
    ///
    /// Output chunks and the final exit arrive on the returned channel.
    fn launch(&self, command: &StageCommand) -> mpsc::UnboundedReceiver<ProcessMessage>;
}

/// Launches real processes with tokio
#[derive(Debug, Clone, Default)]
pub struct CommandLauncher;

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, command: &StageCommand) -> mpsc::UnboundedReceiver<ProcessMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let command = command.clone();

        tokio::spawn(async move {
            let exit = run_process(&command, &tx).await;
            debug!("Process `{}` exited: {:?}", command, exit);
            let _ = tx.send(ProcessMessage::Exited(exit));
        });

        rx
    }
}

async fn run_process(
    command: &StageCommand,
    tx: &mpsc::UnboundedSender<ProcessMessage>,
) -> ProcessExit {
    let mut child = match Command::new(&command.program)
        .args(&command.args)
        .current_dir(&command.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return ProcessExit::SpawnFailed(e.to_string()),
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // The exit is reported only after both pipes are drained
    let (_, _, status) = tokio::join!(
        forward_output(stdout, tx.clone()),
        forward_output(stderr, tx.clone()),
        child.wait(),
    );

    match status {
        Ok(status) => ProcessExit::Code(status.code().unwrap_or(-1)),
        Err(e) => ProcessExit::SpawnFailed(e.to_string()),
    }
}

async fn forward_output<R>(reader: Option<R>, tx: mpsc::UnboundedSender<ProcessMessage>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut pending = Vec::new();

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = decode_chunk(&mut pending, &buf[..n]);
                if !chunk.is_empty() {
                    let _ = tx.send(ProcessMessage::Output(chunk));
                }
            }
            Err(e) => {
                warn!("Failed to read process output: {}", e);
                break;
            }
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(ProcessMessage::Output(
            String::from_utf8_lossy(&pending).into_owned(),
        ));
    }
}

/// Decode `bytes` appended to `pending`, holding back a trailing incomplete
/// UTF-8 sequence for the next chunk
///
/// Invalid bytes become U+FFFD one sequence at a time, so a valid character
/// following them is never lost.
fn decode_chunk(pending: &mut Vec<u8>, bytes: &[u8]) -> String {
    pending.extend_from_slice(bytes);

    let mut text = String::with_capacity(pending.len());
    let mut rest: &[u8] = pending.as_slice();
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                text.push_str(valid);
                rest = &[];
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                text.push_str(&String::from_utf8_lossy(valid));
                match e.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    }
                    None => {
                        rest = after;
                        break;
                    }
                }
            }
        }
    }

    let tail = rest.to_vec();
    *pending = tail;
    text
}
