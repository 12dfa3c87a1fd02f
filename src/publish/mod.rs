// Publication sinks for per-tick payloads and discovery announcements

pub mod log;
pub mod mqtt;

pub use log::LogPublisher;
pub use mqtt::MqttPublisher;

use crate::discovery::Category;
use async_trait::async_trait;
use serde_json::{Map, Value};

#[async_trait]
pub trait Publisher: Send + Sync {
    /// One call per host per tick, with disabled keys already removed.
    async fn publish(&self, host: &str, payload: &Map<String, Value>) -> anyhow::Result<()>;

    /// Called only with a non-empty list of value keys not yet announced for this host.
    /// On error the same keys come back on the next tick.
    async fn announce(&self, host: &str, category: Category, keys: &[String]) -> anyhow::Result<()>;
}
