// Sink that only logs; used when no MQTT broker is configured

use super::Publisher;
use crate::discovery::Category;
use async_trait::async_trait;
use serde_json::{Map, Value};

#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, host: &str, payload: &Map<String, Value>) -> anyhow::Result<()> {
        let body = serde_json::to_string(payload)?;
        tracing::info!(host, operation = "publish", payload = %body, "host stats");
        Ok(())
    }

    async fn announce(&self, host: &str, category: Category, keys: &[String]) -> anyhow::Result<()> {
        tracing::info!(
            host,
            operation = "announce",
            category = %category,
            keys = ?keys,
            "new entities"
        );
        Ok(())
    }
}
