// Executor backed by the system `ssh` client (and `sshpass` for password logins)

use super::{CommandExecutor, ExecOutput};
use crate::error::SampleError;
use crate::models::HostDescriptor;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// `ssh` exits with 255 when the connection or authentication failed.
const SSH_CONNECT_FAILURE: i32 = 255;
/// `sshpass`: 5 is a rejected password, 6 an unknown host key.
const SSHPASS_CONNECT_FAILURES: [i32; 2] = [5, 6];

/// Whether an exit status with no output means we never got a remote shell.
fn is_connect_failure(via_sshpass: bool, exit_code: Option<i32>) -> bool {
    match exit_code {
        Some(SSH_CONNECT_FAILURE) => true,
        Some(code) => via_sshpass && SSHPASS_CONNECT_FAILURES.contains(&code),
        None => false,
    }
}

#[derive(Debug, Clone)]
pub struct SshExecutor {
    connect_timeout: Duration,
    ssh_path: String,
}

impl SshExecutor {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ssh_path: "ssh".to_string(),
        }
    }

    pub fn with_ssh_path(mut self, path: impl Into<String>) -> Self {
        self.ssh_path = path.into();
        self
    }

    /// Program and arguments for one invocation. The command itself goes over stdin.
    pub fn command_line(&self, host: &HostDescriptor) -> (String, Vec<String>) {
        let mut args = Vec::new();
        let program = if host.password.is_some() {
            args.push("-e".to_string());
            args.push(self.ssh_path.clone());
            "sshpass".to_string()
        } else {
            self.ssh_path.clone()
        };

        if host.password.is_none() {
            args.extend(["-o".into(), "BatchMode=yes".into()]);
        }
        args.extend([
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".into(),
            "StrictHostKeyChecking=accept-new".into(),
            "-p".into(),
            host.port.to_string(),
        ]);
        if let Some(key) = &host.key {
            args.extend(["-i".into(), key.clone()]);
        }
        args.push(host.target());
        args.push("sh -s".into());
        (program, args)
    }
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    #[instrument(skip_all, fields(host = %host.name))]
    async fn execute(
        &self,
        host: &HostDescriptor,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, SampleError> {
        let (program, args) = self.command_line(host);
        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(password) = &host.password {
            cmd.env("SSHPASS", password);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| SampleError::ConnectionFailed(format!("failed to spawn {program}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(command.as_bytes())
                .await
                .map_err(|e| SampleError::ConnectionFailed(format!("writing command: {e}")))?;
        }

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                SampleError::ConnectionFailed(format!("timed out after {}s", timeout.as_secs()))
            })?
            .map_err(|e| SampleError::ConnectionFailed(format!("waiting for {program}: {e}")))?;

        let out = ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        debug!(
            exit_code = ?out.exit_code,
            stdout_len = out.stdout.len(),
            stderr_len = out.stderr.len(),
            "ssh finished"
        );

        if is_connect_failure(host.password.is_some(), out.exit_code)
            && out.stdout.trim().is_empty()
        {
            return Err(SampleError::ConnectionFailed(crate::error::excerpt(
                out.stderr.trim(),
            )));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_login_uses_batch_mode() {
        let mut host = HostDescriptor::new("web", "10.0.0.5", "root");
        host.port = 2222;
        host.key = Some("/keys/id_ed25519".into());
        let (program, args) = SshExecutor::new(Duration::from_secs(10)).command_line(&host);
        assert_eq!(program, "ssh");
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/keys/id_ed25519"]));
        assert_eq!(args[args.len() - 2], "root@10.0.0.5");
        assert_eq!(args[args.len() - 1], "sh -s");
    }

    #[test]
    fn password_login_goes_through_sshpass_env() {
        let mut host = HostDescriptor::new("db", "db.lan", "admin");
        host.password = Some("secret".into());
        let (program, args) = SshExecutor::new(Duration::from_secs(5)).command_line(&host);
        assert_eq!(program, "sshpass");
        assert_eq!(&args[..2], ["-e", "ssh"]);
        assert!(!args.iter().any(|a| a.contains("secret")));
        assert!(!args.contains(&"BatchMode=yes".to_string()));
    }

    #[test]
    fn sshpass_auth_failures_are_connection_failures() {
        assert!(is_connect_failure(false, Some(255)));
        assert!(is_connect_failure(true, Some(255)));
        assert!(is_connect_failure(true, Some(5)));
        assert!(is_connect_failure(true, Some(6)));
        assert!(!is_connect_failure(false, Some(5)));
        assert!(!is_connect_failure(true, Some(1)));
        assert!(!is_connect_failure(true, None));
    }

    #[tokio::test]
    async fn missing_binary_is_connection_failure() {
        let exec = SshExecutor::new(Duration::from_secs(1)).with_ssh_path("/nonexistent/ssh-binary");
        let host = HostDescriptor::new("x", "127.0.0.1", "nobody");
        let err = exec
            .execute(&host, "true", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "connection_failed");
    }
}
