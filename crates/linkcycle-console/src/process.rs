//! Pseudo-terminal backed console session
//!
//! The console program runs on the slave side of a PTY, so it sees a real
//! terminal on stdin and stdout. A reader thread forwards raw master output
//! over a channel; `expect` accumulates those bytes and searches them for
//! literal patterns. Only the text handed back to the caller is decoded, so
//! multi-byte characters split across reads survive intact. Matched bytes are
//! consumed so each `expect` sees only what arrived after the previous match.

use crate::error::SessionError;
use crate::session::{find_earliest, ControllableSession, ExpectOutcome, SpawnTarget};
use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tokio::sync::mpsc;

const READ_CHUNK: usize = 4096;

const TERMINAL_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 80,
    pixel_width: 0,
    pixel_height: 0,
};

/// [`ControllableSession`] over a real child process attached to a PTY
pub struct ProcessSession {
    child: Option<Box<dyn Child + Send + Sync>>,
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    output: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    buffer: Vec<u8>,
    eof: bool,
    line_ending: String,
}

impl fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSession")
            .field("pid", &self.pid())
            .field("buffered", &self.buffer.len())
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl Default for ProcessSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            child: None,
            master: None,
            writer: None,
            output: None,
            buffer: Vec::new(),
            eof: false,
            line_ending: "\n".to_string(),
        }
    }

    /// Use a different terminator for [`ControllableSession::send_line`]
    #[inline]
    #[must_use]
    pub fn with_line_ending(mut self, ending: impl Into<String>) -> Self {
        self.line_ending = ending.into();
        self
    }

    /// OS process id while running
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.process_id())
    }

    fn take_pending(&mut self) -> String {
        let pending = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        pending
    }
}

fn pty_error(stage: &'static str) -> impl FnOnce(anyhow::Error) -> SessionError {
    move |e| SessionError::Pty {
        stage,
        message: format!("{e:#}"),
    }
}

/// Forward master output until the slave side closes
fn forward_output(mut reader: Box<dyn Read + Send>, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(chunk[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            // EIO once the child and every slave descriptor are gone
            Err(_) => break,
        }
    }
}

#[async_trait]
impl ControllableSession for ProcessSession {
    async fn spawn(&mut self, target: &SpawnTarget) -> Result<(), SessionError> {
        if target.program.is_empty() {
            return Err(SessionError::EmptyCommand);
        }

        let pair = native_pty_system()
            .openpty(TERMINAL_SIZE)
            .map_err(pty_error("open"))?;

        let mut command = CommandBuilder::new(&target.program);
        command.args(&target.args);
        if let Ok(dir) = std::env::current_dir() {
            command.cwd(dir);
        }

        let child = pair
            .slave
            .spawn_command(command)
            .map_err(|e| SessionError::Spawn {
                command: target.to_string(),
                source: std::io::Error::other(e),
            })?;
        // Our copy of the slave must close so the reader sees the child exit
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().map_err(pty_error("clone reader"))?;
        let writer = pair.master.take_writer().map_err(pty_error("take writer"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("console-reader".to_string())
            .spawn(move || forward_output(reader, tx))?;

        tracing::debug!(command = %target, pid = ?child.process_id(), "console process spawned on pty");

        self.child = Some(child);
        self.master = Some(pair.master);
        self.writer = Some(writer);
        self.output = Some(rx);
        self.buffer.clear();
        self.eof = false;
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let mut writer = self.writer.take().ok_or(SessionError::NotRunning)?;
        let bytes = bytes.to_vec();
        let (writer, result) = tokio::task::spawn_blocking(move || {
            let result = writer.write_all(&bytes).and_then(|()| writer.flush());
            (writer, result)
        })
        .await
        .map_err(std::io::Error::other)?;
        self.writer = Some(writer);
        result?;
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let mut bytes = Vec::with_capacity(line.len() + self.line_ending.len());
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(self.line_ending.as_bytes());
        self.send(&bytes).await
    }

    async fn expect(&mut self, patterns: &[&str], timeout: Duration) -> Result<ExpectOutcome, SessionError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some((index, start, end)) = find_earliest(&self.buffer, patterns) {
                let before = String::from_utf8_lossy(&self.buffer[..start]).into_owned();
                self.buffer.drain(..end);
                return Ok(ExpectOutcome::Matched { index, before });
            }
            if self.eof {
                return Ok(ExpectOutcome::Closed {
                    pending: self.take_pending(),
                });
            }

            let output = self.output.as_mut().ok_or(SessionError::NotRunning)?;
            match tokio::time::timeout_at(deadline, output.recv()).await {
                Err(_) => {
                    return Ok(ExpectOutcome::Timeout {
                        pending: self.take_pending(),
                    })
                }
                Ok(None) => self.eof = true,
                Ok(Some(bytes)) => self.buffer.extend_from_slice(&bytes),
            }
        }
    }

    fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn terminate(&mut self) -> Result<(), SessionError> {
        let pid = self.pid().ok_or(SessionError::NotRunning)?;
        let raw_pid = i32::try_from(pid).map_err(|_| SessionError::NotRunning)?;
        tracing::debug!(pid, "sending SIGTERM to console process");
        signal::kill(Pid::from_raw(raw_pid), Signal::SIGTERM)?;
        Ok(())
    }

    fn kill(&mut self) -> Result<(), SessionError> {
        let child = self.child.as_mut().ok_or(SessionError::NotRunning)?;
        tracing::debug!(pid = ?child.process_id(), "killing console process");
        child.kill()?;
        Ok(())
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if self.is_alive() {
            if let Some(child) = self.child.as_mut() {
                let _ = child.kill();
            }
        }
        drop(self.writer.take());
        drop(self.master.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> SpawnTarget {
        SpawnTarget::new("sh", ["-c", script])
    }

    #[tokio::test]
    async fn child_sees_a_terminal() {
        let mut session = ProcessSession::new();
        session
            .spawn(&sh("if [ -t 0 ] && [ -t 1 ]; then printf 'Console#'; else printf 'no tty'; fi; sleep 5"))
            .await
            .unwrap();

        let outcome = session.expect(&["Console#"], Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome.matched(), Some(0));

        session.kill().unwrap();
    }

    #[tokio::test]
    async fn expect_consumes_up_to_match() {
        let mut session = ProcessSession::new();
        session
            .spawn(&sh("printf 'banner\\nConsole#'; cat"))
            .await
            .unwrap();

        let first = session.expect(&["Console#"], Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            first,
            ExpectOutcome::Matched {
                index: 0,
                before: "banner\r\n".to_string()
            }
        );

        session.send_line("show version").await.unwrap();
        let echo = session.expect(&["version"], Duration::from_secs(5)).await.unwrap();
        assert_eq!(echo.matched(), Some(0));

        session.kill().unwrap();
    }

    #[tokio::test]
    async fn character_split_across_writes_is_kept_whole() {
        let mut session = ProcessSession::new();
        session
            .spawn(&sh(
                "printf '\\344\\275'; sleep 0.3; printf '\\240 0/24 Eth Up\\nConsole#'; sleep 5",
            ))
            .await
            .unwrap();

        let outcome = session.expect(&["Console#"], Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            outcome,
            ExpectOutcome::Matched {
                index: 0,
                before: "你 0/24 Eth Up\r\n".to_string()
            }
        );

        session.kill().unwrap();
    }

    #[tokio::test]
    async fn expect_times_out_with_pending_text() {
        let mut session = ProcessSession::new();
        session.spawn(&sh("printf 'partial'; sleep 5")).await.unwrap();

        let outcome = session
            .expect(&["Console#"], Duration::from_millis(300))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ExpectOutcome::Timeout {
                pending: "partial".to_string()
            }
        );
        assert!(session.is_alive());

        session.terminate().unwrap();
    }

    #[tokio::test]
    async fn expect_reports_closed_peer() {
        let mut session = ProcessSession::new();
        session.spawn(&sh("printf 'bye'")).await.unwrap();

        let outcome = session.expect(&["Console#"], Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            outcome,
            ExpectOutcome::Closed {
                pending: "bye".to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let mut session = ProcessSession::new();
        let err = session
            .spawn(&SpawnTarget::new("/nonexistent/picocom", ["-b", "115200"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Spawn { .. }));
        assert!(!session.is_alive());
        assert!(session.send_line("").await.unwrap_err().is_disconnected());
    }
}
