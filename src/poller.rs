// Poll loop: every tick samples all hosts in parallel, then aggregates and publishes in host order.
// A failed host only swaps its own contribution for a fallback record.

use crate::config::AppConfig;
use crate::discovery::{Category, DiscoveryRegistry};
use crate::models::{
    HostDescriptor, HostRecord, METRIC_KEYS, NormalizedSnapshot, TickReport, without_disabled,
};
use crate::publish::Publisher;
use crate::remote::{CommandExecutor, DEFAULT_SCRIPT};
use crate::sampler::Sampler;
use crate::store::SnapshotStore;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::time::{Duration, Instant};
use tracing::Instrument;

/// Rate limit for "no receivers" debug log (avoid logging every tick when no one is on /ws/stats)
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(300);

/// Collaborators the poller drives.
pub struct PollerDeps {
    pub executor: Arc<dyn CommandExecutor>,
    pub publisher: Arc<dyn Publisher>,
    pub store: SnapshotStore,
    pub tx: broadcast::Sender<TickReport>,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub command_timeout: Duration,
    pub command: String,
    pub disabled: HashSet<String>,
}

impl PollerConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        let interval = config.polling.interval();
        if interval.as_secs() != config.polling.interval_secs {
            tracing::warn!(
                configured_secs = config.polling.interval_secs,
                effective_secs = interval.as_secs(),
                "polling interval raised to minimum"
            );
        }
        Self {
            interval,
            command_timeout: config.polling.command_timeout(),
            command: config
                .polling
                .command
                .clone()
                .unwrap_or_else(|| DEFAULT_SCRIPT.to_string()),
            disabled: config.publishing.disabled.iter().cloned().collect(),
        }
    }
}

pub struct Poller {
    hosts: Vec<HostDescriptor>,
    sampler: Sampler,
    discovery: DiscoveryRegistry,
    deps: PollerDeps,
    config: PollerConfig,
    ticks: u64,
    last_no_receivers_log: Option<Instant>,
}

/// Time left to sleep before the next tick, or `None` to start it right away.
pub fn sleep_budget(interval: Duration, elapsed: Duration) -> Option<Duration> {
    interval.checked_sub(elapsed).filter(|d| !d.is_zero())
}

fn unix_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}

impl Poller {
    pub fn new(hosts: Vec<HostDescriptor>, deps: PollerDeps, config: PollerConfig) -> Self {
        Self {
            hosts,
            sampler: Sampler::new(),
            discovery: DiscoveryRegistry::new(),
            deps,
            config,
            ticks: 0,
            last_no_receivers_log: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn discovery(&self) -> &DiscoveryRegistry {
        &self.discovery
    }

    /// One full Sampling -> Aggregating -> Publishing pass.
    pub async fn run_tick(&mut self) -> TickReport {
        let started = Instant::now();
        let timestamp = unix_millis();

        let fetched = join_all(self.hosts.iter().map(|host| {
            self.sampler.fetch(
                self.deps.executor.as_ref(),
                host,
                &self.config.command,
                self.config.command_timeout,
            )
        }))
        .await;

        let mut records = Vec::with_capacity(self.hosts.len());
        for (host, result) in self.hosts.iter().zip(fetched) {
            let outcome = result
                .and_then(|f| self.sampler.normalize(&host.name, &f.stdout, f.observed_at));
            let (snapshot, error) = match outcome {
                Ok(s) => (s, None),
                Err(e) => {
                    tracing::warn!(
                        host = %host.name,
                        error = %e,
                        kind = e.kind(),
                        operation = "sample",
                        "sampling failed; publishing fallback"
                    );
                    (NormalizedSnapshot::fallback(), Some(e.to_string()))
                }
            };

            let mut observed = vec![(
                Category::Metric,
                self.discovery
                    .peek_new(&host.name, Category::Metric, METRIC_KEYS),
            )];
            if error.is_none() {
                observed.push((
                    Category::Container,
                    self.discovery
                        .peek_new(&host.name, Category::Container, snapshot.container_keys()),
                ));
                observed.push((
                    Category::Disk,
                    self.discovery
                        .peek_new(&host.name, Category::Disk, snapshot.disk_keys()),
                ));
                observed.push((
                    Category::Sensor,
                    self.discovery
                        .peek_new(&host.name, Category::Sensor, snapshot.sensor_keys()),
                ));
            }

            // Ids are only recorded once announced so a failed announcement retries next tick.
            for (category, ids) in observed {
                if ids.is_empty() {
                    continue;
                }
                let keys: Vec<String> = ids
                    .iter()
                    .flat_map(|id| category.entity_keys(id))
                    .filter(|k| !self.config.disabled.contains(k))
                    .collect();
                if !keys.is_empty()
                    && let Err(e) = self
                        .deps
                        .publisher
                        .announce(&host.name, category, &keys)
                        .await
                {
                    tracing::warn!(
                        host = %host.name,
                        error = %e,
                        category = %category,
                        operation = "announce",
                        "discovery announcement failed; retrying next tick"
                    );
                    continue;
                }
                self.discovery.diff_new(&host.name, category, &ids);
            }

            let values = snapshot.to_values();
            let payload = without_disabled(&values, &self.config.disabled);
            match self.deps.publisher.publish(&host.name, &payload).await {
                Ok(()) => tracing::debug!(host = %host.name, keys = payload.len(), "published"),
                Err(e) => tracing::warn!(
                    host = %host.name,
                    error = %e,
                    operation = "publish",
                    "publish failed"
                ),
            }

            records.push(HostRecord {
                name: host.name.clone(),
                available: error.is_none(),
                error,
                timestamp,
                values,
            });
        }

        let report = TickReport {
            timestamp,
            hosts: records,
        };
        self.deps.store.update(report.hosts.iter().cloned()).await;
        if let Err(e) = self.deps.store.persist().await {
            tracing::warn!(error = %e, operation = "persist_stats", "saving stats file failed");
        }
        if self.deps.tx.send(report.clone()).is_err() {
            let should_log = self
                .last_no_receivers_log
                .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL);
            if should_log {
                tracing::debug!(
                    operation = "broadcast_report",
                    "No active WebSocket clients; broadcast channel has no receivers"
                );
                self.last_no_receivers_log = Some(Instant::now());
            }
        }

        self.ticks += 1;
        tracing::info!(
            tick = self.ticks,
            hosts = report.hosts.len(),
            failed = report.failed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tick complete"
        );
        report
    }
}

/// Runs ticks back to back, sleeping `interval - elapsed` in between (never negative, no
/// catch-up burst), until `shutdown_rx` fires or its sender is dropped.
pub fn spawn(mut poller: Poller, mut shutdown_rx: oneshot::Receiver<()>) -> tokio::task::JoinHandle<()> {
    let interval = poller.interval();
    let span = tracing::span!(
        tracing::Level::DEBUG,
        "poller",
        interval_secs = interval.as_secs()
    );
    let task = async move {
        loop {
            let started = Instant::now();
            tokio::select! {
                _ = poller.run_tick() => {}
                _ = &mut shutdown_rx => {
                    tracing::debug!("Poller shutting down mid-tick");
                    break;
                }
            }
            if let Some(pause) = sleep_budget(interval, started.elapsed()) {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Poller shutting down");
                        break;
                    }
                }
            }
        }
    };
    tokio::spawn(task.instrument(span))
}
