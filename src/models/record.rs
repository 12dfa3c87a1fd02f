// Published per-host records and per-tick reports

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Last-known state of one host, as stored, served over HTTP and streamed over WebSockets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    pub name: String,
    /// False when this record is a fallback for a failed sample.
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix milliseconds of the tick that produced the record.
    pub timestamp: i64,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

/// Everything one poll tick produced, in configured host order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub timestamp: i64,
    pub hosts: Vec<HostRecord>,
}

impl TickReport {
    pub fn failed(&self) -> usize {
        self.hosts.iter().filter(|h| !h.available).count()
    }
}
