// Per-host sampler: run the remote command, extract the snapshot, turn counters into rates

use crate::discovery::Category;
use crate::error::SampleError;
use crate::extractor;
use crate::flatten::{flatten_sensors, sanitize};
use crate::models::{
    ContainerStat, DiskStat, HostDescriptor, METRIC_KEYS, NormalizedSnapshot, RawDisk, RawSnapshot,
};
use crate::rates::{DiskRateCache, EnergyAccumulator, NetRateCache};
use crate::remote::CommandExecutor;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Remote output plus the moment it arrived, in seconds since the sampler was created.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub stdout: String,
    pub observed_at: f64,
}

/// Owns every rate cache. Fetching only borrows it, so all hosts can be fetched at once;
/// normalizing mutates only the entries keyed by that host.
#[derive(Debug)]
pub struct Sampler {
    net: NetRateCache,
    disk: DiskRateCache,
    energy: EnergyAccumulator,
    epoch: Instant,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler {
    pub fn new() -> Self {
        Self {
            net: NetRateCache::new(),
            disk: DiskRateCache::new(),
            energy: EnergyAccumulator::new(),
            epoch: Instant::now(),
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Runs the command with a hard deadline. Empty output paired with stderr or a failing
    /// exit status is a `CommandFailed`.
    #[instrument(skip_all, fields(host = %host.name))]
    pub async fn fetch(
        &self,
        executor: &dyn CommandExecutor,
        host: &HostDescriptor,
        command: &str,
        timeout: Duration,
    ) -> Result<Fetched, SampleError> {
        let output = tokio::time::timeout(timeout, executor.execute(host, command, timeout))
            .await
            .map_err(|_| {
                SampleError::ConnectionFailed(format!(
                    "timed out after {:.1}s",
                    timeout.as_secs_f64()
                ))
            })??;
        let stdout = output.into_stdout()?;
        Ok(Fetched {
            stdout,
            observed_at: self.elapsed_secs(),
        })
    }

    /// Extracts the snapshot from `output` and derives rates with `now` as the sample time.
    pub fn normalize(
        &mut self,
        host: &str,
        output: &str,
        now: f64,
    ) -> Result<NormalizedSnapshot, SampleError> {
        let raw = extractor::parse_snapshot(output)?;
        Ok(self.normalize_raw(host, raw, now))
    }

    pub fn normalize_raw(&mut self, host: &str, raw: RawSnapshot, now: f64) -> NormalizedSnapshot {
        let (net_in, net_out) = match (raw.rx, raw.tx) {
            (Some(rx), Some(tx)) => {
                let r = self.net.compute(host, rx, tx, now);
                (Some(round_to(r.net_in, 2)), Some(round_to(r.net_out, 2)))
            }
            _ => {
                debug!(host, "missing rx/tx counters");
                (None, None)
            }
        };
        let (disk_read, disk_write) = match (raw.disk_read, raw.disk_write) {
            (Some(read), Some(write)) => {
                let r = self.disk.compute(host, read, write, now);
                (Some(round_to(r.read, 2)), Some(round_to(r.write, 2)))
            }
            _ => (None, None),
        };
        let energy_kwh_total = self
            .energy
            .compute(host, raw.energy_uj, raw.energy_range_uj)
            .map(|kwh| round_to(kwh, 5));

        let mut taken = HashSet::new();
        let container_stats = raw
            .container_stats
            .into_iter()
            .filter_map(|c| {
                let key = sanitize(&c.name);
                (!key.is_empty()).then(|| ContainerStat {
                    key: claim_key(key, Category::Container, &mut taken),
                    name: c.name,
                    cpu: c.cpu,
                    mem: c.mem,
                })
            })
            .collect();
        let mut taken = HashSet::new();
        let disk_stats = raw
            .disk_stats
            .into_iter()
            .filter_map(disk_stat)
            .map(|mut d| {
                d.key = claim_key(std::mem::take(&mut d.key), Category::Disk, &mut taken);
                d
            })
            .collect();

        NormalizedSnapshot {
            cpu: raw.cpu,
            mem: raw.mem,
            swap: raw.swap,
            disk: raw.disk,
            disk_capacity_total: raw.disk_capacity_total.map(gib),
            swap_total: raw.swap_total.map(gib),
            uptime: raw.uptime,
            temp: raw.temp,
            net_in,
            net_out,
            disk_read,
            disk_write,
            ram: raw.ram,
            cores: raw.cores,
            load_1: raw.load_1,
            load_5: raw.load_5,
            load_15: raw.load_15,
            cpu_freq: raw.cpu_freq,
            processes: raw.processes,
            os: raw.os,
            pkg_count: raw.pkg_count,
            pkg_list: raw.pkg_list,
            docker: raw.docker,
            containers: raw.containers,
            vnc: raw.vnc,
            web: raw.web,
            ssh: raw.ssh,
            local_ip: raw.local_ip,
            power_w: raw.power_w.map(|w| round_to(w, 2)),
            energy_kwh_total,
            container_stats,
            disk_stats,
            sensors: flatten_sensors(&Value::Object(raw.sensors)),
        }
    }

    /// Fetch and normalize in one go, stamped with the arrival time of the output.
    pub async fn sample(
        &mut self,
        executor: &dyn CommandExecutor,
        host: &HostDescriptor,
        command: &str,
        timeout: Duration,
    ) -> Result<NormalizedSnapshot, SampleError> {
        let fetched = self.fetch(executor, host, command, timeout).await?;
        self.normalize(&host.name, &fetched.stdout, fetched.observed_at)
    }
}

/// Keyed by `<name>_<mount>` when both are known and differ; entries with no usable key are dropped.
fn disk_stat(d: RawDisk) -> Option<DiskStat> {
    let name = d.name.filter(|s| !s.is_empty()).or_else(|| d.mount.clone());
    let mount = d.mount.filter(|s| !s.is_empty());
    let (key_source, label) = match (&name, &mount) {
        (Some(n), Some(m)) if n != m => (format!("{n}_{m}"), format!("{n} ({m})")),
        (Some(n), _) => (n.clone(), n.clone()),
        (None, Some(m)) => (m.clone(), m.clone()),
        (None, None) => return None,
    };
    let key = sanitize(&key_source);
    if key.is_empty() {
        return None;
    }
    Some(DiskStat {
        name,
        mount,
        total: gib(d.total.unwrap_or(0)),
        free: gib(d.free.unwrap_or(0)),
        label,
        key,
    })
}

/// Suffixes `_2`, `_3`, ... until the key is unique within its list and its value keys
/// do not shadow a fixed metric such as `disk_capacity_total`.
fn claim_key(base: String, category: Category, taken: &mut HashSet<String>) -> String {
    let mut key = base.clone();
    let mut n = 1;
    loop {
        let reserved = category
            .entity_keys(&key)
            .iter()
            .any(|k| METRIC_KEYS.contains(&k.as_str()));
        if !reserved && taken.insert(key.clone()) {
            return key;
        }
        n += 1;
        key = format!("{base}_{n}");
    }
}

fn gib(bytes: i64) -> f64 {
    round_to(bytes as f64 / BYTES_PER_GIB, 2)
}

pub fn round_to(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}
