use std::{
    io::{self, ErrorKind},
    path::PathBuf,
    process::Stdio,
    string::FromUtf8Error,
    time::Instant,
};

use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("checker executable unavailable: {0}")]
    Launch(io::Error),
    #[error("failed to run checker: {0}")]
    Io(io::Error),
    #[error("checker wrote invalid UTF-8 on {stream}")]
    Decode {
        stream: &'static str,
        #[source]
        source: FromUtf8Error,
    },
}

/// Both output streams of one checker run.
///
/// The exit status is deliberately absent: the contract with the checker is
/// stream-based, not status-based. stdout arrives already decoded because its
/// emptiness drives payload selection; stderr stays raw bytes and is only
/// decoded when it actually becomes the payload.
#[derive(Debug)]
pub struct CheckerStreams {
    pub stdout: String,
    pub stderr: Vec<u8>,
}

impl CheckerStreams {
    /// Select the text to render: stdout when it carries anything, otherwise
    /// stderr. An entirely silent checker yields an empty payload. Undecodable
    /// stderr only fails the run when stdout left it to be selected.
    pub fn into_payload(self) -> Result<String, CheckerError> {
        if self.stdout.is_empty() {
            decode_stream(self.stderr, "stderr")
        } else {
            Ok(self.stdout)
        }
    }
}

/// Invokes the external `wod` checker as `<executable> check <submission>`.
#[derive(Debug, Clone)]
pub struct WodChecker {
    executable: PathBuf,
}

impl WodChecker {
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }

    /// Run the checker once with the submission as a single argv token and
    /// capture both streams to completion. The call blocks the request until
    /// the process exits; no timeout is enforced.
    pub async fn check(&self, submission: &str) -> Result<CheckerStreams, CheckerError> {
        let started_at = Instant::now();

        let output = Command::new(&self.executable)
            .arg("check")
            .arg(submission)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| {
                warn!(
                    target = "application::checker",
                    op = "checker::check",
                    result = "error",
                    executable = %self.executable.display(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_cli",
                    error = %err,
                    "Failed to spawn workout checker"
                );
                if err.kind() == ErrorKind::NotFound {
                    CheckerError::Launch(err)
                } else {
                    CheckerError::Io(err)
                }
            })?;

        // Exit status stays unread; stream emptiness decides the payload.
        let stdout = decode_stream(output.stdout, "stdout")?;
        let stderr = output.stderr;

        info!(
            target = "application::checker",
            op = "checker::check",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            submission_bytes = submission.len(),
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "Checker finished"
        );

        Ok(CheckerStreams { stdout, stderr })
    }
}

fn decode_stream(bytes: Vec<u8>, stream: &'static str) -> Result<String, CheckerError> {
    String::from_utf8(bytes).map_err(|err| {
        warn!(
            target = "application::checker",
            op = "checker::check",
            result = "error",
            error_code = "decode",
            stream = stream,
            error = %err,
            "Checker output was not valid UTF-8"
        );
        CheckerError::Decode {
            stream,
            source: err,
        }
    })
}
