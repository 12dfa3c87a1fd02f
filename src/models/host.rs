// Host identity and credentials

use serde::{Deserialize, Serialize};

const REDACTED: &str = "**REDACTED**";

fn default_ssh_port() -> u16 {
    22
}

/// One remote host to sample. Immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDescriptor {
    /// Stable identity used for cache keys, topics and entity ids.
    pub name: String,
    /// Address or DNS name passed to the SSH client.
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Path to a private key file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl HostDescriptor {
    pub fn new(name: impl Into<String>, host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: default_ssh_port(),
            username: username.into(),
            password: None,
            key: None,
        }
    }

    /// `user@host` target for the SSH client.
    pub fn target(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// Copy with address and credentials masked, for diagnostics output.
    pub fn redacted(&self) -> Self {
        Self {
            name: self.name.clone(),
            host: REDACTED.into(),
            port: self.port,
            username: REDACTED.into(),
            password: self.password.as_ref().map(|_| REDACTED.into()),
            key: self.key.as_ref().map(|_| REDACTED.into()),
        }
    }
}
