// MQTT sink: JSON state per host plus retained Home Assistant discovery configs

use super::Publisher;
use crate::config::MqttConfig;
use crate::discovery::Category;
use crate::flatten::sanitize;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const CLIENT_CAPACITY: usize = 64;

const TEXT_KEYS: &[&str] = &["os", "pkg_list", "containers", "vnc", "web", "ssh", "local_ip"];

/// How Home Assistant should present one value key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityMeta {
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub text: bool,
}

impl EntityMeta {
    fn unit(unit: &'static str) -> Self {
        Self {
            unit: Some(unit),
            ..Self::default()
        }
    }

    fn with_class(mut self, device_class: &'static str) -> Self {
        self.device_class = Some(device_class);
        self
    }
}

pub fn entity_meta(key: &str) -> EntityMeta {
    if TEXT_KEYS.contains(&key) {
        return EntityMeta {
            text: true,
            ..EntityMeta::default()
        };
    }
    if key.starts_with("sensor_") {
        return sensor_meta(key);
    }
    if key.starts_with("container_") {
        return EntityMeta::unit("%");
    }
    if key.starts_with("disk_") && (key.ends_with("_total") || key.ends_with("_free")) {
        return EntityMeta::unit("GiB").with_class("data_size");
    }
    match key {
        "cpu" | "mem" | "swap" | "disk" => EntityMeta::unit("%"),
        "net_in" | "net_out" | "disk_read" | "disk_write" => {
            EntityMeta::unit("B/s").with_class("data_rate")
        }
        "uptime" => EntityMeta::unit("s").with_class("duration"),
        "temp" => EntityMeta::unit("°C").with_class("temperature"),
        "swap_total" => EntityMeta::unit("GiB").with_class("data_size"),
        "ram" => EntityMeta::unit("MB"),
        "cpu_freq" => EntityMeta::unit("MHz").with_class("frequency"),
        "power_w" => EntityMeta::unit("W").with_class("power"),
        "energy_kwh_total" => EntityMeta {
            state_class: Some("total_increasing"),
            ..EntityMeta::unit("kWh").with_class("energy")
        },
        _ => EntityMeta::default(),
    }
}

/// Unit guessed from the flattened sensor path.
fn sensor_meta(key: &str) -> EntityMeta {
    let lower = key.to_lowercase();
    if lower.contains("temp") {
        EntityMeta::unit("°C").with_class("temperature")
    } else if lower.contains("fan") {
        EntityMeta::unit("RPM")
    } else if lower.contains("power") {
        EntityMeta::unit("W").with_class("power")
    } else if lower.starts_with("sensor_in") || lower.contains("volt") {
        EntityMeta::unit("V").with_class("voltage")
    } else {
        EntityMeta::default()
    }
}

pub fn state_topic(topic_prefix: &str, host: &str) -> String {
    format!("{topic_prefix}/{}/state", sanitize(host))
}

pub fn discovery_topic(discovery_prefix: &str, host: &str, key: &str) -> String {
    format!("{discovery_prefix}/sensor/{}_{key}/config", sanitize(host))
}

/// Discovery config payload for one value key of one host.
pub fn discovery_config(cfg: &MqttConfig, host: &str, key: &str) -> Value {
    let meta = entity_meta(key);
    let default = if meta.text { "''" } else { "0" };
    let uid = format!("{}_{key}", sanitize(host));
    let mut payload = json!({
        "name": format!("{host} {key}"),
        "state_topic": state_topic(&cfg.topic_prefix, host),
        "value_template": format!("{{{{ value_json.{key} | default({default}) }}}}"),
        "unique_id": uid,
        "device": {
            "identifiers": [format!("vserver_ssh_{}", sanitize(host))],
            "name": host,
        },
    });
    if let Value::Object(m) = &mut payload {
        if let Some(unit) = meta.unit {
            m.insert("unit_of_measurement".into(), json!(unit));
        }
        if let Some(dc) = meta.device_class {
            m.insert("device_class".into(), json!(dc));
        }
        if let Some(sc) = meta.state_class {
            m.insert("state_class".into(), json!(sc));
        }
    }
    payload
}

/// Never waits on the broker: while disconnected, or when the request queue is full,
/// calls fail immediately so the poll loop keeps its cadence.
pub struct MqttPublisher {
    client: AsyncClient,
    cfg: MqttConfig,
    connected: Arc<AtomicBool>,
    eventloop: JoinHandle<()>,
}

impl MqttPublisher {
    /// Creates the client and spawns the event loop. Connection happens in the background
    /// and is retried forever.
    pub fn connect(cfg: MqttConfig) -> Self {
        let mut opts = MqttOptions::new(cfg.client_id.clone(), cfg.host.clone(), cfg.port);
        opts.set_keep_alive(KEEP_ALIVE);
        if let Some(user) = &cfg.username {
            opts.set_credentials(user.clone(), cfg.password.clone().unwrap_or_default());
        }
        let (client, mut eventloop) = AsyncClient::new(opts, CLIENT_CAPACITY);
        let broker = format!("{}:{}", cfg.host, cfg.port);
        let connected = Arc::new(AtomicBool::new(false));
        let flag = connected.clone();

        let eventloop = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        flag.store(true, Ordering::Release);
                        tracing::info!(broker = %broker, "MQTT connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        flag.store(false, Ordering::Release);
                        tracing::warn!(
                            error = %e,
                            broker = %broker,
                            operation = "mqtt_poll",
                            "MQTT connection error"
                        );
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Self {
            client,
            cfg,
            connected,
            eventloop,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, topic: String, retain: bool, body: Vec<u8>) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.is_connected(),
            "MQTT broker {}:{} not connected",
            self.cfg.host,
            self.cfg.port
        );
        self.client
            .try_publish(topic, QoS::AtLeastOnce, retain, body)
            .map_err(|e| anyhow::anyhow!("MQTT request queue unavailable: {e}"))
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.eventloop.abort();
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, host: &str, payload: &Map<String, Value>) -> anyhow::Result<()> {
        let body = serde_json::to_vec(payload)?;
        self.send(state_topic(&self.cfg.topic_prefix, host), false, body)?;
        tracing::debug!(host, operation = "publish", "state published");
        Ok(())
    }

    async fn announce(&self, host: &str, category: Category, keys: &[String]) -> anyhow::Result<()> {
        for key in keys {
            let body = serde_json::to_vec(&discovery_config(&self.cfg, host, key))?;
            self.send(discovery_topic(&self.cfg.discovery_prefix, host, key), true, body)?;
        }
        tracing::debug!(host, category = %category, count = keys.len(), "discovery published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> MqttConfig {
        MqttConfig {
            host: "broker".into(),
            port: 1883,
            username: None,
            password: None,
            client_id: "test".into(),
            topic_prefix: "vserver_ssh".into(),
            discovery_prefix: "homeassistant".into(),
        }
    }

    #[tokio::test]
    async fn unreachable_broker_fails_fast() {
        let publisher = MqttPublisher::connect(MqttConfig {
            host: "127.0.0.1".into(),
            port: 1,
            ..cfg()
        });
        let mut payload = Map::new();
        payload.insert("cpu".into(), json!(1));
        let keys = vec!["cpu".to_string()];
        for _ in 0..200 {
            let sent = tokio::time::timeout(Duration::from_secs(1), publisher.publish("h", &payload))
                .await
                .expect("publish must not block");
            assert!(sent.is_err());
            let announced = tokio::time::timeout(
                Duration::from_secs(1),
                publisher.announce("h", Category::Metric, &keys),
            )
            .await
            .expect("announce must not block");
            assert!(announced.is_err());
        }
        assert!(!publisher.is_connected());
    }

    #[test]
    fn topics() {
        assert_eq!(state_topic("vserver_ssh", "web-01"), "vserver_ssh/web_01/state");
        assert_eq!(
            discovery_topic("homeassistant", "web", "cpu"),
            "homeassistant/sensor/web_cpu/config"
        );
    }

    #[test]
    fn numeric_config_has_unit_and_zero_default() {
        let c = discovery_config(&cfg(), "web", "net_in");
        assert_eq!(c["unit_of_measurement"], "B/s");
        assert_eq!(c["device_class"], "data_rate");
        assert_eq!(c["value_template"], "{{ value_json.net_in | default(0) }}");
        assert_eq!(c["unique_id"], "web_net_in");
        assert_eq!(c["state_topic"], "vserver_ssh/web/state");
        assert_eq!(c["device"]["identifiers"][0], "vserver_ssh_web");
    }

    #[test]
    fn text_config_defaults_to_empty_string() {
        let c = discovery_config(&cfg(), "web", "os");
        assert_eq!(c["value_template"], "{{ value_json.os | default('') }}");
        assert!(c.get("unit_of_measurement").is_none());
    }

    #[test]
    fn units_are_inferred() {
        assert_eq!(entity_meta("container_web_cpu").unit, Some("%"));
        assert_eq!(entity_meta("disk_root_free").unit, Some("GiB"));
        assert_eq!(entity_meta("disk_read").unit, Some("B/s"));
        assert_eq!(entity_meta("energy_kwh_total").state_class, Some("total_increasing"));
        assert_eq!(entity_meta("sensor_coretemp_core_0_temp2_input").unit, Some("°C"));
        assert_eq!(entity_meta("sensor_nct_fan1_fan1_input").unit, Some("RPM"));
        assert_eq!(entity_meta("sensor_in0_input").unit, Some("V"));
        assert_eq!(entity_meta("sensor_acpi_power1").unit, Some("W"));
        assert_eq!(entity_meta("cores"), EntityMeta::default());
    }
}
