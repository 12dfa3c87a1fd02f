// Last-known record per host, shared with HTTP readers and mirrored to a JSON file

use crate::models::HostRecord;
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct SnapshotStore {
    records: Arc<RwLock<BTreeMap<String, HostRecord>>>,
    path: Option<PathBuf>,
}

impl SnapshotStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a file-backed store, reloading whatever the previous run persisted.
    /// A missing file starts empty; an unreadable one is logged and ignored.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let mut records = BTreeMap::new();
        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<HostRecord>>(&bytes) {
                Ok(list) => {
                    for r in list {
                        records.insert(r.name.clone(), r);
                    }
                    tracing::info!(
                        path = %path.display(),
                        hosts = records.len(),
                        "restored last-known stats"
                    );
                }
                Err(e) => tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    operation = "load_stats_file",
                    "ignoring unreadable stats file"
                ),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("reading stats file {}", path.display()));
            }
        }
        Ok(Self {
            records: Arc::new(RwLock::new(records)),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn update(&self, records: impl IntoIterator<Item = HostRecord>) {
        let mut guard = self.records.write().await;
        for r in records {
            guard.insert(r.name.clone(), r);
        }
    }

    /// Writes all records as a JSON list through a temp file and rename. No-op in memory mode.
    pub async fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = {
            let guard = self.records.read().await;
            serde_json::to_vec_pretty(&guard.values().collect::<Vec<_>>())?
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))?;
        Ok(())
    }

    pub async fn all(&self) -> Vec<HostRecord> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn get(&self, name: &str) -> Option<HostRecord> {
        self.records.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}
