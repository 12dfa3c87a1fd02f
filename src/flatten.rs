// Key sanitizing and flattening of nested hardware-sensor readings

use serde_json::Value;
use std::collections::BTreeMap;

/// Lowercase key with every run of characters outside `[A-Za-z0-9_]` replaced by one `_`.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

/// Walks a sensor tree and emits `sensor_<path> -> value` for every numeric leaf.
/// Path segments are sanitized and joined with `_`; non-numeric leaves are dropped.
pub fn flatten_sensors(tree: &Value) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    visit("", tree, &mut out);
    out
}

fn visit(prefix: &str, node: &Value, out: &mut BTreeMap<String, f64>) {
    match node {
        Value::Object(children) => {
            for (k, v) in children {
                let seg = sanitize(k);
                let path = if prefix.is_empty() {
                    seg
                } else {
                    format!("{prefix}_{seg}")
                };
                visit(&path, v, out);
            }
        }
        leaf => {
            if let Some(v) = leaf_value(leaf) {
                out.insert(format!("sensor_{prefix}"), v);
            }
        }
    }
}

fn leaf_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|f| f.is_finite())
}
