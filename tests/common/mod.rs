// Shared test helpers
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use vserver_stats::discovery::Category;
use vserver_stats::error::SampleError;
use vserver_stats::models::{HostDescriptor, TickReport};
use vserver_stats::poller::{Poller, PollerConfig, PollerDeps};
use vserver_stats::publish::Publisher;
use vserver_stats::remote::{CommandExecutor, ExecOutput};
use vserver_stats::store::SnapshotStore;

/// One scripted reply: wait `delay`, then return `result`.
#[derive(Clone)]
pub struct Reply {
    pub delay: Duration,
    pub result: Result<ExecOutput, SampleError>,
}

impl Reply {
    pub fn json(body: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(ExecOutput::ok(body)),
        }
    }

    pub fn err(e: SampleError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(e),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Executor replaying queued replies per host name. When a queue runs dry the last reply repeats.
#[derive(Default)]
pub struct MockExecutor {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    last: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, host: &str, reply: Reply) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, host: &str) -> Reply {
        let queued = self
            .replies
            .lock()
            .unwrap()
            .get_mut(host)
            .and_then(VecDeque::pop_front);
        let mut last = self.last.lock().unwrap();
        match queued {
            Some(r) => {
                last.insert(host.to_string(), r.clone());
                r
            }
            None => last
                .get(host)
                .cloned()
                .unwrap_or_else(|| Reply::err(SampleError::ConnectionFailed("no reply scripted".into()))),
        }
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn execute(
        &self,
        host: &HostDescriptor,
        _command: &str,
        _timeout: Duration,
    ) -> Result<ExecOutput, SampleError> {
        self.calls
            .lock()
            .unwrap()
            .push((host.name.clone(), Instant::now()));
        let reply = self.next(&host.name);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}

#[derive(Debug, Clone)]
pub struct Published {
    pub host: String,
    pub payload: Map<String, Value>,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub struct Announced {
    pub host: String,
    pub category: Category,
    pub keys: Vec<String>,
}

/// Records every publish attempt and every successful announcement.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<Published>>,
    pub announced: Mutex<Vec<Announced>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let p = Self::default();
        p.set_failing(true);
        p
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn published_for(&self, host: &str) -> Vec<Published> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.host == host)
            .cloned()
            .collect()
    }

    pub fn announced_for(&self, host: &str, category: Category) -> Vec<String> {
        self.announced
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.host == host && a.category == category)
            .flat_map(|a| a.keys.clone())
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, host: &str, payload: &Map<String, Value>) -> anyhow::Result<()> {
        self.published.lock().unwrap().push(Published {
            host: host.to_string(),
            payload: payload.clone(),
            at: Instant::now(),
        });
        anyhow::ensure!(!self.fail.load(Ordering::SeqCst), "broker unavailable");
        Ok(())
    }

    async fn announce(&self, host: &str, category: Category, keys: &[String]) -> anyhow::Result<()> {
        anyhow::ensure!(!self.fail.load(Ordering::SeqCst), "broker unavailable");
        self.announced.lock().unwrap().push(Announced {
            host: host.to_string(),
            category,
            keys: keys.to_vec(),
        });
        Ok(())
    }
}

pub fn host(name: &str) -> HostDescriptor {
    HostDescriptor::new(name, format!("{name}.lan"), "root")
}

pub fn poller_config(interval_secs: u64) -> PollerConfig {
    PollerConfig {
        interval: Duration::from_secs(interval_secs),
        command_timeout: Duration::from_secs(60),
        command: "true".into(),
        disabled: Default::default(),
    }
}

pub struct Harness {
    pub executor: Arc<MockExecutor>,
    pub publisher: Arc<RecordingPublisher>,
    pub store: SnapshotStore,
    pub tx: broadcast::Sender<TickReport>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_publisher(RecordingPublisher::new())
    }

    pub fn with_publisher(publisher: RecordingPublisher) -> Self {
        let (tx, _) = broadcast::channel(8);
        Self {
            executor: Arc::new(MockExecutor::new()),
            publisher: Arc::new(publisher),
            store: SnapshotStore::in_memory(),
            tx,
        }
    }

    pub fn poller(&self, hosts: &[&str], config: PollerConfig) -> Poller {
        Poller::new(
            hosts.iter().map(|h| host(h)).collect(),
            PollerDeps {
                executor: self.executor.clone(),
                publisher: self.publisher.clone(),
                store: self.store.clone(),
                tx: self.tx.clone(),
            },
            config,
        )
    }
}
