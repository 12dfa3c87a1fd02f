// Normalized snapshot: derived rates instead of counters, flattened to stable keys for publishing

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Scalar keys every snapshot carries, in publish order.
pub const METRIC_KEYS: &[&str] = &[
    "cpu",
    "mem",
    "swap",
    "disk",
    "disk_capacity_total",
    "swap_total",
    "uptime",
    "temp",
    "net_in",
    "net_out",
    "disk_read",
    "disk_write",
    "ram",
    "cores",
    "load_1",
    "load_5",
    "load_15",
    "cpu_freq",
    "processes",
    "os",
    "pkg_count",
    "pkg_list",
    "docker",
    "containers",
    "vnc",
    "web",
    "ssh",
    "local_ip",
    "power_w",
    "energy_kwh_total",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStat {
    pub name: String,
    /// Sanitized name used in entity keys.
    pub key: String,
    pub cpu: Option<f64>,
    pub mem: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskStat {
    pub name: Option<String>,
    pub mount: Option<String>,
    /// GiB.
    pub total: f64,
    /// GiB.
    pub free: f64,
    pub label: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedSnapshot {
    pub cpu: Option<i64>,
    pub mem: Option<i64>,
    pub swap: Option<i64>,
    pub disk: Option<i64>,
    /// GiB.
    pub disk_capacity_total: Option<f64>,
    /// GiB.
    pub swap_total: Option<f64>,
    pub uptime: Option<i64>,
    pub temp: Option<f64>,
    /// Bytes/s.
    pub net_in: Option<f64>,
    pub net_out: Option<f64>,
    /// Bytes/s.
    pub disk_read: Option<f64>,
    pub disk_write: Option<f64>,
    pub ram: Option<i64>,
    pub cores: Option<i64>,
    pub load_1: Option<f64>,
    pub load_5: Option<f64>,
    pub load_15: Option<f64>,
    pub cpu_freq: Option<i64>,
    pub processes: Option<i64>,
    pub os: String,
    pub pkg_count: Option<i64>,
    pub pkg_list: String,
    pub docker: Option<i64>,
    pub containers: String,
    pub vnc: String,
    pub web: String,
    pub ssh: String,
    pub local_ip: String,
    pub power_w: Option<f64>,
    pub energy_kwh_total: Option<f64>,
    pub container_stats: Vec<ContainerStat>,
    pub disk_stats: Vec<DiskStat>,
    /// `sensor_<path>` -> reading.
    pub sensors: BTreeMap<String, f64>,
}

impl NormalizedSnapshot {
    /// Zero/blank record published when a host could not be sampled.
    /// Optional readings (temperature, frequency, power, energy) stay unknown.
    pub fn fallback() -> Self {
        Self {
            cpu: Some(0),
            mem: Some(0),
            swap: Some(0),
            disk: Some(0),
            disk_capacity_total: Some(0.0),
            swap_total: Some(0.0),
            uptime: Some(0),
            temp: None,
            net_in: Some(0.0),
            net_out: Some(0.0),
            disk_read: Some(0.0),
            disk_write: Some(0.0),
            ram: Some(0),
            cores: Some(0),
            load_1: Some(0.0),
            load_5: Some(0.0),
            load_15: Some(0.0),
            cpu_freq: None,
            processes: Some(0),
            pkg_count: Some(0),
            docker: Some(0),
            power_w: None,
            energy_kwh_total: None,
            ..Self::default()
        }
    }

    /// Flat key/value view: scalar metrics, per-container/per-disk/sensor keys and the raw lists.
    pub fn to_values(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("cpu".into(), json!(self.cpu));
        m.insert("mem".into(), json!(self.mem));
        m.insert("swap".into(), json!(self.swap));
        m.insert("disk".into(), json!(self.disk));
        m.insert("disk_capacity_total".into(), json!(self.disk_capacity_total));
        m.insert("swap_total".into(), json!(self.swap_total));
        m.insert("uptime".into(), json!(self.uptime));
        m.insert("temp".into(), json!(self.temp));
        m.insert("net_in".into(), json!(self.net_in));
        m.insert("net_out".into(), json!(self.net_out));
        m.insert("disk_read".into(), json!(self.disk_read));
        m.insert("disk_write".into(), json!(self.disk_write));
        m.insert("ram".into(), json!(self.ram));
        m.insert("cores".into(), json!(self.cores));
        m.insert("load_1".into(), json!(self.load_1));
        m.insert("load_5".into(), json!(self.load_5));
        m.insert("load_15".into(), json!(self.load_15));
        m.insert("cpu_freq".into(), json!(self.cpu_freq));
        m.insert("processes".into(), json!(self.processes));
        m.insert("os".into(), json!(self.os));
        m.insert("pkg_count".into(), json!(self.pkg_count));
        m.insert("pkg_list".into(), json!(self.pkg_list));
        m.insert("docker".into(), json!(self.docker));
        m.insert("containers".into(), json!(self.containers));
        m.insert("vnc".into(), json!(self.vnc));
        m.insert("web".into(), json!(self.web));
        m.insert("ssh".into(), json!(self.ssh));
        m.insert("local_ip".into(), json!(self.local_ip));
        m.insert("power_w".into(), json!(self.power_w));
        m.insert("energy_kwh_total".into(), json!(self.energy_kwh_total));

        for c in &self.container_stats {
            m.insert(format!("container_{}_cpu", c.key), json!(c.cpu));
            m.insert(format!("container_{}_mem", c.key), json!(c.mem));
        }
        for d in &self.disk_stats {
            m.insert(format!("disk_{}_total", d.key), json!(d.total));
            m.insert(format!("disk_{}_free", d.key), json!(d.free));
        }
        for (k, v) in &self.sensors {
            m.insert(k.clone(), json!(v));
        }
        m.insert("container_stats".into(), json!(self.container_stats));
        m.insert("disk_stats".into(), json!(self.disk_stats));
        m
    }

    /// Sanitized container keys, in report order.
    pub fn container_keys(&self) -> Vec<String> {
        self.container_stats.iter().map(|c| c.key.clone()).collect()
    }

    pub fn disk_keys(&self) -> Vec<String> {
        self.disk_stats.iter().map(|d| d.key.clone()).collect()
    }

    pub fn sensor_keys(&self) -> Vec<String> {
        self.sensors.keys().cloned().collect()
    }
}

/// Drops disabled keys from a flattened payload.
pub fn without_disabled<'a>(
    values: &Map<String, Value>,
    disabled: impl IntoIterator<Item = &'a String>,
) -> Map<String, Value> {
    let mut out = values.clone();
    for k in disabled {
        out.remove(k);
    }
    out
}
