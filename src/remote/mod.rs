// Remote command boundary: one trait so the poller can run against SSH or a test double

pub mod ssh;

pub use ssh::SshExecutor;

use crate::error::SampleError;
use crate::models::HostDescriptor;
use async_trait::async_trait;
use std::time::Duration;

/// Default data-gathering script, fed to `sh -s` on the remote host.
pub const DEFAULT_SCRIPT: &str = include_str!("script.sh");

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Maps "nothing useful came back" outcomes to `CommandFailed`.
    pub fn into_stdout(self) -> Result<String, SampleError> {
        let has_stdout = !self.stdout.trim().is_empty();
        let stderr = self.stderr.trim();
        if !has_stdout && !stderr.is_empty() {
            return Err(SampleError::CommandFailed(crate::error::excerpt(stderr)));
        }
        if let Some(code) = self.exit_code.filter(|c| *c != 0)
            && !has_stdout
        {
            return Err(SampleError::CommandFailed(format!("exit status {code}")));
        }
        Ok(self.stdout)
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs `command` on `host`. The call must not outlive `timeout` by much;
    /// the sampler enforces it independently as well.
    async fn execute(
        &self,
        host: &HostDescriptor,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, SampleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_without_stdout_is_command_failure() {
        let out = ExecOutput {
            stdout: "\n".into(),
            stderr: "sh: docker: not found\n".into(),
            exit_code: Some(0),
        };
        assert_eq!(
            out.into_stdout(),
            Err(SampleError::CommandFailed("sh: docker: not found".into()))
        );
    }

    #[test]
    fn nonzero_exit_without_stdout_is_command_failure() {
        let out = ExecOutput {
            exit_code: Some(2),
            ..Default::default()
        };
        assert!(matches!(out.into_stdout(), Err(SampleError::CommandFailed(_))));
    }

    #[test]
    fn stdout_wins_over_stderr_noise() {
        let out = ExecOutput {
            stdout: "{\"cpu\":1}".into(),
            stderr: "warning".into(),
            exit_code: Some(1),
        };
        assert_eq!(out.into_stdout().unwrap(), "{\"cpu\":1}");
    }

    #[test]
    fn empty_success_passes_through() {
        assert_eq!(ExecOutput::ok("").into_stdout().unwrap(), "");
    }

    #[test]
    fn default_script_prints_one_object() {
        assert!(DEFAULT_SCRIPT.contains("printf '{\"cpu\""));
        assert!(DEFAULT_SCRIPT.contains("energy_range_uj"));
    }
}
