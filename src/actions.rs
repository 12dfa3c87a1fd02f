// Host actions run over the same execution channel as sampling

use crate::error::SampleError;
use crate::models::HostDescriptor;
use crate::remote::CommandExecutor;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

/// Upgrades with whichever package manager the host has.
pub const UPDATE_PACKAGES_COMMAND: &str = "if command -v apt-get >/dev/null 2>&1; then \
sudo apt-get update && sudo apt-get -y upgrade; \
elif command -v dnf >/dev/null 2>&1; then sudo dnf -y upgrade; \
elif command -v yum >/dev/null 2>&1; then sudo yum -y update; \
else echo 'No supported package manager found'; fi";

/// Detached so the session closes before the host goes down.
pub const REBOOT_COMMAND: &str = "(sleep 1; sudo reboot) >/dev/null 2>&1 &";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostAction {
    UpdatePackages,
    Reboot,
    Run,
}

impl HostAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostAction::UpdatePackages => "update_packages",
            HostAction::Reboot => "reboot",
            HostAction::Run => "run",
        }
    }
}

impl fmt::Display for HostAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update_packages" => Ok(HostAction::UpdatePackages),
            "reboot" => Ok(HostAction::Reboot),
            "run" => Ok(HostAction::Run),
            other => Err(format!("unknown action {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutput {
    pub host: String,
    pub action: HostAction,
    /// Stdout followed by stderr.
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Remote command for `action`. `Run` takes the caller's command; the others ignore it.
pub fn command_for(action: HostAction, command: Option<&str>) -> Result<String, String> {
    match action {
        HostAction::UpdatePackages => Ok(UPDATE_PACKAGES_COMMAND.to_string()),
        HostAction::Reboot => Ok(REBOOT_COMMAND.to_string()),
        HostAction::Run => command
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .ok_or_else(|| "run requires a non-empty \"command\"".to_string()),
    }
}

#[instrument(skip_all, fields(host = %host.name, action = %action))]
pub async fn run_action(
    executor: &dyn CommandExecutor,
    host: &HostDescriptor,
    action: HostAction,
    command: &str,
    timeout: Duration,
) -> Result<ActionOutput, SampleError> {
    let out = tokio::time::timeout(timeout, executor.execute(host, command, timeout))
        .await
        .map_err(|_| {
            SampleError::ConnectionFailed(format!("timed out after {:.1}s", timeout.as_secs_f64()))
        })??;

    let output = match action {
        HostAction::Reboot => "reboot triggered".to_string(),
        _ => format!("{}{}", out.stdout, out.stderr),
    };
    tracing::info!(exit_code = ?out.exit_code, "host action finished");
    Ok(ActionOutput {
        host: host.name.clone(),
        action,
        output,
        exit_code: out.exit_code,
    })
}
