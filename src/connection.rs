//! Connection launcher.
//!
//! Applies a role configuration by running the privileged connect script with
//! the saved credential file:
//!
//! ```bash
//! <script> --internet <uplink> --hotspot <hotspot> --wifi-creds <path>
//! ```
//!
//! The script location comes from the deployment configuration only. Exit
//! code 0 means the host was reconfigured; anything else is a failure.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::error::LaunchError;
use crate::process::{CommandRunner, RunError};
use crate::roles::NetworkRoleConfig;

/// Progress of one connect operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Succeeded,
    Failed(String),
}

/// One connect operation, kept only for logging and for reporting back to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    pub ssid: String,
    pub credential_path: Option<PathBuf>,
    pub roles: NetworkRoleConfig,
    pub outcome: AttemptOutcome,
}

impl ConnectionAttempt {
    pub fn new(ssid: impl Into<String>, roles: NetworkRoleConfig) -> Self {
        Self {
            ssid: ssid.into(),
            credential_path: None,
            roles,
            outcome: AttemptOutcome::Pending,
        }
    }
}

impl fmt::Display for ConnectionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' (uplink {}, hotspot {}): ",
            self.ssid, self.roles.uplink_interface, self.roles.hotspot_interface
        )?;
        match &self.outcome {
            AttemptOutcome::Pending => write!(f, "pending"),
            AttemptOutcome::Succeeded => write!(f, "succeeded"),
            AttemptOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

pub struct ConnectionLauncher<R> {
    runner: Arc<R>,
    command: Vec<String>,
    timeout: Duration,
}

impl<R: CommandRunner> ConnectionLauncher<R> {
    /// `command` is the script invocation prefix, e.g. `["sudo", "/usr/local/sbin/wifi-mode"]`.
    pub fn new(runner: Arc<R>, command: Vec<String>, timeout: Duration) -> Self {
        Self {
            runner,
            command,
            timeout,
        }
    }

    pub fn command_line(&self, roles: &NetworkRoleConfig, credential_path: &Path) -> Vec<String> {
        let mut argv = self.command.clone();
        argv.extend([
            "--internet".to_string(),
            roles.uplink_interface.clone(),
            "--hotspot".to_string(),
            roles.hotspot_interface.clone(),
            "--wifi-creds".to_string(),
            credential_path.to_string_lossy().into_owned(),
        ]);
        argv
    }

    /// Runs the connect script and waits for it to finish.
    pub async fn launch(
        &self,
        roles: &NetworkRoleConfig,
        credential_path: &Path,
    ) -> Result<(), LaunchError> {
        let argv = self.command_line(roles, credential_path);
        info!(
            "Launching connect script: uplink {}, hotspot {}",
            roles.uplink_interface, roles.hotspot_interface
        );

        let output = self
            .runner
            .run(&argv, self.timeout)
            .await
            .map_err(|e| match e {
                RunError::Timeout { after, .. } => LaunchError::Timeout(after),
                other => LaunchError::ExecutionFailed(other.to_string()),
            })?;

        debug!("Connect script stdout:\n{}", output.stdout);

        match output.code {
            Some(0) => Ok(()),
            Some(code) => {
                // Prefer stderr, fall back to stdout for the operator message
                let stderr = output.stderr.trim();
                let message = if stderr.is_empty() {
                    output.stdout.trim()
                } else {
                    stderr
                };
                Err(LaunchError::ScriptFailed {
                    code,
                    stderr: message.to_string(),
                })
            }
            None => Err(LaunchError::Terminated {
                signal: output.signal,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use crate::process::testing::FakeRunner;

    fn roles() -> NetworkRoleConfig {
        NetworkRoleConfig {
            uplink_interface: "eth0".into(),
            hotspot_interface: "wlan0".into(),
        }
    }

    fn launcher() -> (Arc<FakeRunner>, ConnectionLauncher<FakeRunner>) {
        let runner = Arc::new(FakeRunner::default());
        let launcher = ConnectionLauncher::new(
            Arc::clone(&runner),
            vec!["/usr/local/sbin/wifi-mode".into()],
            Duration::from_secs(180),
        );
        (runner, launcher)
    }

    #[tokio::test]
    async fn builds_exact_argument_vector() {
        let (runner, launcher) = launcher();

        launcher
            .launch(&roles(), Path::new("/var/lib/creds/My Net"))
            .await
            .unwrap();

        assert_eq!(
            runner.calls(),
            vec![vec![
                "/usr/local/sbin/wifi-mode",
                "--internet",
                "eth0",
                "--hotspot",
                "wlan0",
                "--wifi-creds",
                "/var/lib/creds/My Net",
            ]]
        );
    }

    #[tokio::test]
    async fn nonzero_exit_is_script_failed() {
        let (runner, launcher) = launcher();
        runner.push(Ok(ProcessOutput {
            code: Some(3),
            signal: None,
            stdout: String::new(),
            stderr: "hostapd failed\n".into(),
        }));

        match launcher.launch(&roles(), Path::new("/c")).await {
            Err(LaunchError::ScriptFailed { code, stderr }) => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "hostapd failed");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn killed_script_is_terminated() {
        let (runner, launcher) = launcher();
        runner.push(Ok(ProcessOutput {
            code: None,
            signal: Some(9),
            ..Default::default()
        }));

        assert!(matches!(
            launcher.launch(&roles(), Path::new("/c")).await,
            Err(LaunchError::Terminated { signal: Some(9) })
        ));
    }

    #[tokio::test]
    async fn spawn_failure_and_timeout_are_reported() {
        let (runner, launcher) = launcher();
        runner.push(Err(RunError::Spawn {
            program: "wifi-mode".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }));
        runner.push(Err(RunError::Timeout {
            program: "wifi-mode".into(),
            after: Duration::from_secs(180),
        }));

        assert!(matches!(
            launcher.launch(&roles(), Path::new("/c")).await,
            Err(LaunchError::ExecutionFailed(_))
        ));
        assert!(matches!(
            launcher.launch(&roles(), Path::new("/c")).await,
            Err(LaunchError::Timeout(_))
        ));
    }

    #[test]
    fn attempt_display_mentions_outcome() {
        let mut attempt = ConnectionAttempt::new("Home", roles());
        assert!(attempt.to_string().ends_with("pending"));
        attempt.outcome = AttemptOutcome::Failed("exit 2".into());
        assert_eq!(
            attempt.to_string(),
            "'Home' (uplink eth0, hotspot wlan0): failed: exit 2"
        );
    }
}
