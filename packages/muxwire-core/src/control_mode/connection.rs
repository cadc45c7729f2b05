//! Connection manager for tmux control mode
//!
//! Frames the control mode byte stream into lines, feeds them to a [`Parser`]
//! and hands the results to the caller over a channel. Line framing happens
//! here, the decoder only ever sees one complete line.

use super::diagnostics::Diagnostic;
use super::parser::{ControlModeEvent, ParseError, Parser};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the channel between the reader task and the consumer
pub const CHANNEL_CAPACITY: usize = 1000;

/// Errors talking to the tmux process
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("session '{0}' does not exist")]
    NoSuchSession(String),

    #[error("failed to run tmux: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to get {0} handle")]
    MissingPipe(&'static str),

    #[error("failed to send command: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to kill tmux control mode: {0}")]
    Kill(#[source] std::io::Error),
}

/// Outcome of one framed line
#[derive(Debug)]
pub enum ParsedLine {
    Event(ControlModeEvent),
    /// The line was dropped
    Error(ParseError),
    /// Recoverable issue found while decoding the line
    Diagnostic(Diagnostic),
}

/// Spawn the task that reads raw lines from `reader` and feeds parsed
/// results into the channel.
///
/// Uses `read_until(b'\n')` instead of `lines()` so pane output that is not
/// valid UTF-8 survives. The task ends at EOF, on a read error, or when the
/// receiver is dropped.
pub fn spawn_reader_task<R>(
    reader: R,
    mut parser: Parser,
    tx: mpsc::Sender<ParsedLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(4096);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!("control mode stream closed");
                    break;
                }
                Ok(_) => {
                    // Strip trailing \n and \r
                    while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
                        buf.pop();
                    }

                    let mut outcomes: Vec<ParsedLine> = match parser.parse_line(&buf) {
                        Ok(Some(event)) => vec![ParsedLine::Event(event)],
                        Ok(None) => Vec::new(),
                        Err(error) => {
                            warn!(%error, "dropping control mode line");
                            vec![ParsedLine::Error(error)]
                        }
                    };
                    outcomes.extend(
                        parser
                            .take_diagnostics()
                            .into_iter()
                            .map(ParsedLine::Diagnostic),
                    );

                    for outcome in outcomes {
                        if tx.send(outcome).await.is_err() {
                            debug!("receiver dropped, stopping reader");
                            return;
                        }
                    }
                }
                Err(error) => {
                    warn!(%error, "control mode read error");
                    break;
                }
            }
        }
    })
}

/// Connection to tmux control mode
#[derive(Debug)]
pub struct ControlModeConnection {
    /// The `tmux -C` child process
    child: Child,

    /// Stdin for sending commands
    stdin: ChildStdin,

    /// Receiver for parsed lines
    rx: mpsc::Receiver<ParsedLine>,

    /// Command counter for tracking responses
    command_counter: u32,
}

impl ControlModeConnection {
    /// Attach to an existing session with `tmux -C attach-session -t <session>`.
    pub async fn attach(session_name: &str, parser: Parser) -> Result<Self, ConnectionError> {
        // Control mode clients waiting on a missing session never exit, so
        // check first.
        let check = Command::new("tmux")
            .args(["has-session", "-t", session_name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(ConnectionError::Spawn)?;

        if !check.success() {
            return Err(ConnectionError::NoSuchSession(session_name.to_string()));
        }

        Self::spawn(&["-C", "attach-session", "-t", session_name], parser)
    }

    /// Create a session with `tmux -C new-session -s <session>` and attach to it.
    pub async fn new_session(session_name: &str, parser: Parser) -> Result<Self, ConnectionError> {
        Self::spawn(&["-C", "new-session", "-s", session_name], parser)
    }

    fn spawn(args: &[&str], parser: Parser) -> Result<Self, ConnectionError> {
        info!(?args, "starting tmux control mode");

        let mut child = Command::new("tmux")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(ConnectionError::Spawn)?;

        let stdin = child.stdin.take().ok_or(ConnectionError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ConnectionError::MissingPipe("stdout"))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        spawn_reader_task(stdout, parser, tx);

        Ok(Self {
            child,
            stdin,
            rx,
            command_counter: 0,
        })
    }

    /// Send a tmux command through control mode.
    ///
    /// The response will come as a `CommandResponse` event. Returns the
    /// command number this connection assigned to it.
    pub async fn send_command(&mut self, cmd: &str) -> Result<u32, ConnectionError> {
        let cmd_num = self.command_counter;
        self.command_counter += 1;

        self.stdin
            .write_all(format!("{}\n", cmd).as_bytes())
            .await
            .map_err(ConnectionError::Write)?;
        self.stdin.flush().await.map_err(ConnectionError::Write)?;

        Ok(cmd_num)
    }

    /// Receive the next parsed line.
    ///
    /// Returns `None` once the connection is closed.
    pub async fn recv(&mut self) -> Option<ParsedLine> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ParsedLine> {
        self.rx.try_recv().ok()
    }

    /// Check if the tmux process is still running.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    pub async fn kill(&mut self) -> Result<(), ConnectionError> {
        self.child.kill().await.map_err(ConnectionError::Kill)
    }

    /// Detach with `detach-client` and wait up to 3s for tmux to exit.
    pub async fn graceful_close(&mut self) {
        // The connection might already be closing
        if let Err(error) = self.send_command("detach-client").await {
            debug!(%error, "detach-client not sent");
        }

        let timeout = tokio::time::Duration::from_millis(3000);
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => info!(%status, "control mode client detached"),
            Ok(Err(error)) => warn!(%error, "error waiting for control mode exit"),
            Err(_) => warn!("graceful detach timed out"),
        }
    }

    pub fn command_counter(&self) -> u32 {
        self.command_counter
    }
}
