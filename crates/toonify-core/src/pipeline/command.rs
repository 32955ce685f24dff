//! Run a local command that reads an image on stdin and writes one to stdout.
//!
//! Both the container decoder and the segmenter talk to their external
//! collaborator this way.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Failure modes of a piped command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{program}` I/O error: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },

    #[error("`{program}` timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u64 },

    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`{program}` produced no output")]
    EmptyOutput { program: String },
}

/// Pipe `input` through `program args...` and return its stdout.
///
/// The child is killed if the timeout elapses or the returned future is
/// dropped.
pub async fn run_piped(
    program: &str,
    args: &[String],
    input: &[u8],
    limit: Duration,
) -> Result<Vec<u8>, CommandError> {
    tracing::debug!("Running {} {:?} ({} bytes in)", program, args, input.len());

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // Feed stdin concurrently with reading stdout so large images can't
    // deadlock on a full pipe.
    let stdin = child.stdin.take();
    let payload = input.to_vec();
    let writer = tokio::spawn(async move {
        if let Some(mut stdin) = stdin {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            writer.abort();
            return Err(CommandError::Io {
                program: program.to_string(),
                source,
            });
        }
        Err(_) => {
            writer.abort();
            return Err(CommandError::Timeout {
                program: program.to_string(),
                timeout_ms: limit.as_millis() as u64,
            });
        }
    };

    // A child that exits early closes its stdin; that broken pipe is
    // reported through the exit status below instead.
    if let Ok(Err(e)) = writer.await {
        tracing::debug!("{} closed stdin early: {}", program, e);
    }

    if !output.status.success() {
        return Err(CommandError::Failed {
            program: program.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    if output.stdout.is_empty() {
        return Err(CommandError::EmptyOutput {
            program: program.to_string(),
        });
    }

    Ok(output.stdout)
}
