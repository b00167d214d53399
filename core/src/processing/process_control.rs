use std::{ffi::OsString, process::Stdio, time::Duration};

use async_trait::async_trait;
use nix::{
    sys::signal::{kill, Signal},
    unistd::Pid,
};
use tokio::{process::Command, sync::oneshot};
use tracing::{debug, instrument};

/// A fully specified external tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        CommandInvocation {
            program: program.into(),
            args: Vec::default(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Everything the process wrote to stdout, read until end of stream
    pub stdout: Vec<u8>,
}

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("Error starting {program}")]
    ErrorStarting {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with non-zero code {code}")]
    NonZeroExit { program: String, code: i32 },
    #[error("{program} exited by signal")]
    TerminatedBySignal { program: String },
    #[error("{program} did not finish within {timeout:?} and was killed")]
    TimedOut { program: String, timeout: Duration },
    #[error("error waiting for {program}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs external tools and captures their stdout.
/// Implementations must treat a non-successful exit as an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
    timeout: Option<Duration>,
}

impl SystemCommandRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        SystemCommandRunner { timeout }
    }
}

enum ProcessResult {
    RanToEnd(std::process::Output),
    TimedOut,
    OtherError(std::io::Error),
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    #[instrument(err, skip(self, invocation), fields(program = %invocation.program))]
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, CommandError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(invocation.args.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        debug!(command = ?command.as_std(), "Invoking command");
        let child = command
            .spawn()
            .map_err(|source| CommandError::ErrorStarting {
                program: invocation.program.clone(),
                source,
            })?;
        match run_process(child, self.timeout).await {
            ProcessResult::RanToEnd(output) => match output.status.code() {
                Some(0) => Ok(CommandOutput {
                    stdout: output.stdout,
                }),
                Some(code) => Err(CommandError::NonZeroExit {
                    program: invocation.program.clone(),
                    code,
                }),
                None => Err(CommandError::TerminatedBySignal {
                    program: invocation.program.clone(),
                }),
            },
            ProcessResult::TimedOut => Err(CommandError::TimedOut {
                program: invocation.program.clone(),
                // TimedOut is only produced when a timeout is set
                timeout: self.timeout.unwrap_or_default(),
            }),
            ProcessResult::OtherError(source) => Err(CommandError::Wait {
                program: invocation.program.clone(),
                source,
            }),
        }
    }
}

/// Waits for the process to exit and collects its output.
/// If `timeout` elapses first, the process is sent SIGKILL.
#[cfg(target_family = "unix")]
async fn run_process(child: tokio::process::Child, timeout: Option<Duration>) -> ProcessResult {
    let pid = child.id();
    let (send, mut recv) = oneshot::channel();
    tokio::task::spawn(async move { send.send(child.wait_with_output().await) });
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        result = &mut recv => {
            match result {
                Ok(Ok(output)) => ProcessResult::RanToEnd(output),
                Ok(Err(wait_err)) => ProcessResult::OtherError(wait_err),
                Err(_) => ProcessResult::OtherError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "process wait task died",
                )),
            }
        }
        _ = deadline => {
            if let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) {
                if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGKILL) {
                    tracing::error!(%err, pid, "Error sending SIGKILL to timed out process");
                }
            }
            ProcessResult::TimedOut
        }
    }
}
