// Model tests: flattened snapshot views, fallback records, serialization

use serde_json::{Value, json};
use std::collections::BTreeMap;
use vserver_stats::models::{
    ContainerStat, DiskStat, HostDescriptor, HostRecord, METRIC_KEYS, NormalizedSnapshot,
    TickReport, without_disabled,
};

fn sample_snapshot() -> NormalizedSnapshot {
    NormalizedSnapshot {
        cpu: Some(12),
        net_in: Some(1000.0),
        os: "Debian".into(),
        container_stats: vec![ContainerStat {
            name: "Web-1".into(),
            key: "web_1".into(),
            cpu: Some(1.5),
            mem: None,
        }],
        disk_stats: vec![DiskStat {
            name: Some("/dev/sda1".into()),
            mount: Some("/".into()),
            total: 100.0,
            free: 42.5,
            label: "/dev/sda1 (/)".into(),
            key: "_dev_sda1__".into(),
        }],
        sensors: BTreeMap::from([("sensor_chip_temp1".to_string(), 40.0)]),
        ..NormalizedSnapshot::default()
    }
}

#[test]
fn test_to_values_carries_every_metric_key() {
    let values = sample_snapshot().to_values();
    for key in METRIC_KEYS {
        assert!(values.contains_key(*key), "missing {key}");
    }
    assert_eq!(values["cpu"], 12);
    assert_eq!(values["mem"], Value::Null);
    assert_eq!(values["os"], "Debian");
}

#[test]
fn test_to_values_dynamic_keys() {
    let values = sample_snapshot().to_values();
    assert_eq!(values["container_web_1_cpu"], 1.5);
    assert_eq!(values["container_web_1_mem"], Value::Null);
    assert_eq!(values["disk__dev_sda1___total"], 100.0);
    assert_eq!(values["disk__dev_sda1___free"], 42.5);
    assert_eq!(values["sensor_chip_temp1"], 40.0);
    assert_eq!(values["container_stats"][0]["name"], "Web-1");
    assert_eq!(values["disk_stats"][0]["label"], "/dev/sda1 (/)");
}

#[test]
fn test_fallback_is_zeroed_with_unknown_optionals() {
    let values = NormalizedSnapshot::fallback().to_values();
    assert_eq!(values["cpu"], 0);
    assert_eq!(values["disk_capacity_total"], 0.0);
    assert_eq!(values["net_out"], 0.0);
    assert_eq!(values["temp"], Value::Null);
    assert_eq!(values["cpu_freq"], Value::Null);
    assert_eq!(values["power_w"], Value::Null);
    assert_eq!(values["energy_kwh_total"], Value::Null);
    assert_eq!(values["os"], "");
    assert_eq!(values["container_stats"], json!([]));
}

#[test]
fn test_key_lists() {
    let s = sample_snapshot();
    assert_eq!(s.container_keys(), vec!["web_1"]);
    assert_eq!(s.disk_keys(), vec!["_dev_sda1__"]);
    assert_eq!(s.sensor_keys(), vec!["sensor_chip_temp1"]);
}

#[test]
fn test_without_disabled() {
    let values = sample_snapshot().to_values();
    let disabled = vec!["cpu".to_string(), "not_a_key".to_string()];
    let filtered = without_disabled(&values, &disabled);
    assert!(!filtered.contains_key("cpu"));
    assert_eq!(filtered.len(), values.len() - 1);
    assert!(values.contains_key("cpu"));
}

#[test]
fn test_host_record_serializes_flat() {
    let rec = HostRecord {
        name: "web".into(),
        available: true,
        error: None,
        timestamp: 99,
        values: sample_snapshot().to_values(),
    };
    let json = serde_json::to_value(&rec).unwrap();
    assert_eq!(json["name"], "web");
    assert_eq!(json["cpu"], 12);
    assert!(json.get("error").is_none());
    assert!(json.get("values").is_none());

    let report = TickReport {
        timestamp: 99,
        hosts: vec![rec],
    };
    assert_eq!(report.failed(), 0);
}

#[test]
fn test_host_descriptor_defaults_and_redaction() {
    let h: HostDescriptor =
        toml::from_str("name = \"a\"\nhost = \"1.2.3.4\"\nusername = \"root\"\n").unwrap();
    assert_eq!(h.port, 22);
    assert_eq!(h.target(), "root@1.2.3.4");
    assert!(h.password.is_none());

    let mut with_secret = h.clone();
    with_secret.password = Some("pw".into());
    let r = with_secret.redacted();
    assert_eq!(r.name, "a");
    assert_eq!(r.host, "**REDACTED**");
    assert_eq!(r.password.as_deref(), Some("**REDACTED**"));
    assert!(r.key.is_none());
}
