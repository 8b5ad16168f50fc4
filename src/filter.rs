//! External filter subprocess execution.
//!
//! A member's content is piped through a user-supplied shell command:
//! the bytes go to the child's stdin and the replacement bytes come back
//! from its stdout. Both pipes have bounded OS buffers, so a sequential
//! write-then-read would deadlock as soon as the child produces output
//! before draining its input (or the other way around). The transfer is
//! therefore driven as two futures joined on the same task: one writing
//! and closing stdin, one reading stdout to end-of-stream.
//!
//! The child is always reaped before returning, and `kill_on_drop`
//! covers the early-error paths.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Result of one filter invocation.
#[derive(Debug)]
pub enum FilterOutcome {
    /// The command exited successfully; its stdout (possibly empty)
    /// replaces the member content.
    Replaced(Vec<u8>),
    /// The command could not be started, exited non-zero, or was killed.
    /// The caller must leave the original content untouched.
    Failed(String),
}

/// Run `command` through the platform shell, feeding it `content` on
/// stdin and collecting its stdout.
///
/// The command string is handed to the shell verbatim, so it may contain
/// pipelines, redirections and quoting of its own. A non-zero exit, a
/// terminating signal and a spawn error are all reported uniformly as
/// [`FilterOutcome::Failed`]; only a plain I/O breakdown on our side of
/// the pipes (not the child closing them early) surfaces there as well.
pub async fn run_filter(content: &[u8], command: &str) -> FilterOutcome {
    match try_run(content, command).await {
        Ok(outcome) => outcome,
        Err(e) => FilterOutcome::Failed(format!("{e:#}")),
    }
}

async fn try_run(content: &[u8], command: &str) -> Result<FilterOutcome> {
    let mut child = shell_command(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to start filter command `{command}`"))?;

    let mut stdin = child.stdin.take().context("filter stdin not captured")?;
    let mut stdout = child.stdout.take().context("filter stdout not captured")?;

    // Drive both halves of the exchange at once. Dropping stdin after the
    // write closes the pipe so the child sees end-of-input; an empty
    // `content` still delivers that close.
    let write_input = async move {
        let result = stdin.write_all(content).await;
        drop(stdin);
        match result {
            // The filter may exit without draining its input (`exit 1`,
            // `head -c1`, ...). The exit status decides the outcome.
            Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
            _ => Ok(()),
        }
    };
    let read_output = async {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).await?;
        Ok::<_, std::io::Error>(buf)
    };

    let (write_result, read_result) = tokio::join!(write_input, read_output);
    write_result.context("writing member content to filter stdin")?;
    let output = read_result.context("reading filter stdout")?;

    let status = child.wait().await.context("waiting for filter command")?;
    if status.success() {
        Ok(FilterOutcome::Replaced(output))
    } else {
        Ok(FilterOutcome::Failed(format!(
            "filter command `{command}` failed: {status}"
        )))
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
