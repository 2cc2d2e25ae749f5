//! Process execution seam.
//!
//! Every external program (the privileged scan command and the connect
//! script) is started through a [`CommandRunner`]. Commands are always an
//! argument vector handed straight to the OS, never a shell string.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::process::Command;

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Terminating signal on unix, if any.
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {after:?}")]
    Timeout { program: String, after: Duration },
}

pub trait CommandRunner: Send + Sync + 'static {
    /// Runs `argv[0]` with `argv[1..]` as arguments and waits for it, at most
    /// for `timeout`. A process still running at the deadline is killed.
    fn run(
        &self,
        argv: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<ProcessOutput, RunError>> + Send;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, argv: &[String], timeout: Duration) -> Result<ProcessOutput, RunError> {
        let (program, args) = argv.split_first().ok_or(RunError::EmptyCommand)?;
        debug!("running {:?}", argv);

        // kill_on_drop: when the timeout drops the wait future the child goes with it
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(RunError::Wait {
                    program: program.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(RunError::Timeout {
                    program: program.clone(),
                    after: timeout,
                });
            }
        };

        Ok(ProcessOutput {
            code: output.status.code(),
            signal: exit_signal(&output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned results and records every command line it was given.
    #[derive(Default)]
    pub struct FakeRunner {
        calls: Mutex<Vec<Vec<String>>>,
        responses: Mutex<Vec<Result<ProcessOutput, RunError>>>,
    }

    impl FakeRunner {
        pub fn push_output(&self, code: i32, stdout: &str) {
            self.push(Ok(ProcessOutput {
                code: Some(code),
                signal: None,
                stdout: stdout.to_string(),
                stderr: String::new(),
            }));
        }

        pub fn push(&self, response: Result<ProcessOutput, RunError>) {
            self.responses.lock().unwrap().push(response);
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        async fn run(
            &self,
            argv: &[String],
            _timeout: Duration,
        ) -> Result<ProcessOutput, RunError> {
            self.calls.lock().unwrap().push(argv.to_vec());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(ProcessOutput {
                    code: Some(0),
                    ..Default::default()
                })
            } else {
                responses.remove(0)
            }
        }
    }
}
