// Raw snapshot: typed view over the JSON object returned by the remote command.
// Every field is coerced with a fallback; bad fields become None/empty plus a diagnostic.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawContainer {
    pub name: String,
    pub cpu: Option<f64>,
    pub mem: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDisk {
    pub name: Option<String>,
    pub mount: Option<String>,
    /// Bytes.
    pub total: Option<i64>,
    /// Bytes.
    pub free: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSnapshot {
    pub cpu: Option<i64>,
    pub mem: Option<i64>,
    pub swap: Option<i64>,
    pub disk: Option<i64>,
    pub disk_capacity_total: Option<i64>,
    pub swap_total: Option<i64>,
    pub uptime: Option<i64>,
    pub temp: Option<f64>,
    pub rx: Option<i64>,
    pub tx: Option<i64>,
    pub disk_read: Option<i64>,
    pub disk_write: Option<i64>,
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
    pub energy_uj: Option<i64>,
    pub energy_range_uj: Option<i64>,
    pub container_stats: Vec<RawContainer>,
    pub disk_stats: Vec<RawDisk>,
    /// Nested lm-sensors style readings; always an object (empty when absent).
    pub sensors: Map<String, Value>,
    /// Coercion problems seen while reading the object. Informational only.
    pub diagnostics: Vec<String>,
}

impl RawSnapshot {
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        let mut f = Fields {
            obj,
            diagnostics: Vec::new(),
        };
        let swap = match f.int("swap_usage") {
            Some(v) => Some(v),
            None => f.int("swap"),
        };
        let container_stats = f
            .list("container_stats")
            .iter()
            .filter_map(|entry| match entry.as_object() {
                Some(c) => Some(RawContainer {
                    name: c.get("name").map(text_of).unwrap_or_default(),
                    cpu: c.get("cpu").and_then(coerce_float),
                    mem: c.get("mem").and_then(coerce_float),
                }),
                None => {
                    f.diagnostics
                        .push(format!("container_stats: skipping non-object entry {entry}"));
                    None
                }
            })
            .collect();
        let disk_stats = f
            .list("disk_stats")
            .iter()
            .filter_map(|entry| match entry.as_object() {
                Some(d) => Some(RawDisk {
                    name: non_empty(d.get("name")),
                    mount: non_empty(d.get("mount")),
                    total: d.get("total").and_then(coerce_int),
                    free: d.get("free").and_then(coerce_int),
                }),
                None => {
                    f.diagnostics
                        .push(format!("disk_stats: skipping non-object entry {entry}"));
                    None
                }
            })
            .collect();
        let sensors = f.map("sensors");

        Self {
            cpu: f.int("cpu"),
            mem: f.int("mem"),
            swap,
            disk: f.int("disk"),
            disk_capacity_total: f.int("disk_capacity_total"),
            swap_total: f.int("swap_total"),
            uptime: f.int("uptime"),
            temp: f.float("temp"),
            rx: f.int("rx"),
            tx: f.int("tx"),
            disk_read: f.int("disk_read"),
            disk_write: f.int("disk_write"),
            ram: f.int("ram"),
            cores: f.int("cores"),
            load_1: f.float("load_1"),
            load_5: f.float("load_5"),
            load_15: f.float("load_15"),
            cpu_freq: f.int("cpu_freq"),
            processes: f.int("processes"),
            os: f.text("os"),
            pkg_count: f.int("pkg_count"),
            pkg_list: f.text("pkg_list"),
            docker: f.int("docker"),
            containers: f.text("containers"),
            vnc: f.text("vnc"),
            web: f.text("web"),
            ssh: f.text("ssh"),
            local_ip: f.text("local_ip"),
            power_w: f.float("power_w"),
            energy_uj: f.int("energy_uj"),
            energy_range_uj: f.int("energy_range_uj"),
            container_stats,
            disk_stats,
            sensors,
            diagnostics: f.diagnostics,
        }
    }
}

struct Fields<'a> {
    obj: &'a Map<String, Value>,
    diagnostics: Vec<String>,
}

impl<'a> Fields<'a> {
    fn present(&self, key: &str) -> Option<&'a Value> {
        self.obj.get(key).filter(|v| !v.is_null())
    }

    fn int(&mut self, key: &str) -> Option<i64> {
        let v = self.present(key)?;
        let out = coerce_int(v);
        if out.is_none() {
            self.diagnostics.push(format!("{key}: not an integer: {v}"));
        }
        out
    }

    fn float(&mut self, key: &str) -> Option<f64> {
        let v = self.present(key)?;
        let out = coerce_float(v);
        if out.is_none() {
            self.diagnostics.push(format!("{key}: not a number: {v}"));
        }
        out
    }

    fn text(&mut self, key: &str) -> String {
        self.present(key).map(text_of).unwrap_or_default()
    }

    fn list(&mut self, key: &str) -> &'a [Value] {
        match self.present(key) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.diagnostics
                    .push(format!("{key}: expected list, got {}", kind(other)));
                &[]
            }
            None => &[],
        }
    }

    fn map(&mut self, key: &str) -> Map<String, Value> {
        match self.present(key) {
            Some(Value::Object(m)) => m.clone(),
            Some(other) => {
                self.diagnostics
                    .push(format!("{key}: expected map, got {}", kind(other)));
                Map::new()
            }
            None => Map::new(),
        }
    }
}

/// Integer coercion: integral numbers, floats (truncated) and numeric strings.
pub fn coerce_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Float coercion: any number or a numeric string. Non-finite values are rejected.
pub fn coerce_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn non_empty(v: Option<&Value>) -> Option<String> {
    v.map(text_of).filter(|s| !s.is_empty())
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawSnapshot {
        RawSnapshot::from_object(v.as_object().unwrap())
    }

    #[test]
    fn coerces_numeric_strings_and_floats() {
        let r = raw(json!({"cpu": "42", "mem": 17.9, "temp": "51.5", "load_1": 0.25}));
        assert_eq!(r.cpu, Some(42));
        assert_eq!(r.mem, Some(17));
        assert_eq!(r.temp, Some(51.5));
        assert_eq!(r.load_1, Some(0.25));
        assert!(r.diagnostics.is_empty());
    }

    #[test]
    fn bad_field_becomes_none_without_poisoning_others() {
        let r = raw(json!({"cpu": "n/a", "mem": 30, "rx": [1]}));
        assert_eq!(r.cpu, None);
        assert_eq!(r.mem, Some(30));
        assert_eq!(r.rx, None);
        assert_eq!(r.diagnostics.len(), 2);
    }

    #[test]
    fn null_fields_are_absent_not_diagnostics() {
        let r = raw(json!({"temp": null, "cpu_freq": null, "energy_uj": null}));
        assert_eq!(r.temp, None);
        assert_eq!(r.cpu_freq, None);
        assert!(r.diagnostics.is_empty());
    }

    #[test]
    fn wrong_shaped_collections_default_to_empty() {
        let r = raw(json!({"container_stats": "oops", "disk_stats": {"a": 1}, "sensors": [1, 2]}));
        assert!(r.container_stats.is_empty());
        assert!(r.disk_stats.is_empty());
        assert!(r.sensors.is_empty());
        assert_eq!(r.diagnostics.len(), 3);
    }

    #[test]
    fn reads_container_and_disk_entries() {
        let r = raw(json!({
            "container_stats": [{"name": "web", "cpu": 1.5, "mem": "2.25"}, 7],
            "disk_stats": [{"name": "/dev/sda1", "mount": "/", "total": 1000, "free": 400}],
        }));
        assert_eq!(r.container_stats.len(), 1);
        assert_eq!(r.container_stats[0].name, "web");
        assert_eq!(r.container_stats[0].mem, Some(2.25));
        assert_eq!(r.disk_stats[0].mount.as_deref(), Some("/"));
        assert_eq!(r.disk_stats[0].free, Some(400));
        assert_eq!(r.diagnostics.len(), 1);
    }

    #[test]
    fn swap_usage_takes_precedence_over_swap() {
        assert_eq!(raw(json!({"swap_usage": 12, "swap": 3})).swap, Some(12));
        assert_eq!(raw(json!({"swap": 3})).swap, Some(3));
    }
}
