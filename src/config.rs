use crate::flatten::sanitize;
use crate::models::HostDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Ticks never run more often than this.
pub const MIN_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub hosts: Vec<HostDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound for one remote command. Must leave room for the ~1 s measurement window.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Replaces the built-in data-gathering script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

fn default_interval_secs() -> u64 {
    30
}

fn default_command_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            command: None,
        }
    }
}

impl PollingConfig {
    /// Configured interval, raised to the 5 s floor.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(MIN_INTERVAL_SECS))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    /// Keys left out of published payloads and discovery.
    #[serde(default)]
    pub disabled: Vec<String>,
    /// Where last-known records are persisted. Unset keeps them in memory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_file: Option<String>,
    /// Max number of tick reports kept in the broadcast channel for /ws/stats (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_broadcast_capacity() -> usize {
    16
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            stats_file: None,
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Remote host actions (package update, reboot, arbitrary command). Off unless enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Also allow `run` with a caller-supplied command.
    #[serde(default)]
    pub allow_run_command: bool,
    #[serde(default = "default_action_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_action_timeout_secs() -> u64 {
    600
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_run_command: false,
            timeout_secs: default_action_timeout_secs(),
        }
    }
}

impl ActionsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "vserver-stats".into()
}

fn default_topic_prefix() -> String {
    "vserver_ssh".into()
}

fn default_discovery_prefix() -> String {
    "homeassistant".into()
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config file {path}: {e}"))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.polling.interval_secs > 0,
            "polling.interval_secs must be > 0, got {}",
            self.polling.interval_secs
        );
        anyhow::ensure!(
            self.polling.command_timeout_secs >= 2,
            "polling.command_timeout_secs must be >= 2, got {}",
            self.polling.command_timeout_secs
        );
        anyhow::ensure!(
            self.polling.connect_timeout_secs > 0,
            "polling.connect_timeout_secs must be > 0, got {}",
            self.polling.connect_timeout_secs
        );
        if let Some(cmd) = &self.polling.command {
            anyhow::ensure!(!cmd.trim().is_empty(), "polling.command must be non-empty when set");
        }
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.actions.timeout_secs > 0,
            "actions.timeout_secs must be > 0, got {}",
            self.actions.timeout_secs
        );
        if let Some(mqtt) = &self.mqtt {
            anyhow::ensure!(!mqtt.host.is_empty(), "mqtt.host must be non-empty");
            anyhow::ensure!(mqtt.port > 0, "mqtt.port must be > 0");
            anyhow::ensure!(!mqtt.client_id.is_empty(), "mqtt.client_id must be non-empty");
        }

        anyhow::ensure!(!self.hosts.is_empty(), "at least one [[hosts]] entry is required");
        let mut names = HashSet::new();
        let mut slugs: HashMap<String, &str> = HashMap::new();
        for (i, h) in self.hosts.iter().enumerate() {
            anyhow::ensure!(!h.name.trim().is_empty(), "hosts[{i}].name must be non-empty");
            anyhow::ensure!(names.insert(h.name.as_str()), "duplicate host name {:?}", h.name);
            // MQTT topics and entity ids are keyed by the sanitized name.
            if let Some(other) = slugs.insert(sanitize(&h.name), &h.name) {
                anyhow::bail!(
                    "host names {other:?} and {:?} map to the same id {:?}",
                    h.name,
                    sanitize(&h.name)
                );
            }
            anyhow::ensure!(!h.host.is_empty(), "hosts[{i}] ({}): host must be non-empty", h.name);
            anyhow::ensure!(
                !h.username.is_empty(),
                "hosts[{i}] ({}): username must be non-empty",
                h.name
            );
            anyhow::ensure!(h.port > 0, "hosts[{i}] ({}): port must be > 0", h.name);
        }
        Ok(())
    }

    /// Config view safe to expose: every host address and credential masked.
    pub fn diagnostics(&self) -> serde_json::Value {
        serde_json::json!({
            "server": self.server,
            "polling": self.polling,
            "publishing": self.publishing,
            "mqtt": self.mqtt.as_ref().map(|m| serde_json::json!({
                "host": m.host,
                "port": m.port,
                "client_id": m.client_id,
                "topic_prefix": m.topic_prefix,
                "discovery_prefix": m.discovery_prefix,
                "authenticated": m.username.is_some(),
            })),
            "actions": self.actions,
            "hosts": self.hosts.iter().map(HostDescriptor::redacted).collect::<Vec<_>>(),
        })
    }
}
