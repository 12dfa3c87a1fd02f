// Counter-pair rate caches (network rx/tx, disk read/write)

use std::collections::HashMap;

/// Smallest time delta used as divisor, in seconds.
pub const MIN_DT_SECS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Baseline {
    values: [i64; 2],
    at: f64,
}

/// Per-key baseline of two monotonic counters. Rates are per second and never negative;
/// a decrease (reset, reboot) reports 0 for that tick and becomes the new baseline.
#[derive(Debug, Default)]
pub struct PairRateCache {
    last: HashMap<String, Baseline>,
}

impl PairRateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `now` is seconds on any monotonic-enough clock shared by all calls for `key`.
    pub fn compute(&mut self, key: &str, current: [i64; 2], now: f64) -> [f64; 2] {
        let rates = match self.last.get(key) {
            Some(prev) => {
                let dt = (now - prev.at).max(MIN_DT_SECS);
                [
                    rate(prev.values[0], current[0], dt),
                    rate(prev.values[1], current[1], dt),
                ]
            }
            None => [0.0, 0.0],
        };
        self.last.insert(
            key.to_string(),
            Baseline {
                values: current,
                at: now,
            },
        );
        rates
    }

    #[cfg(test)]
    fn contains(&self, key: &str) -> bool {
        self.last.contains_key(key)
    }
}

fn rate(prev: i64, cur: i64, dt: f64) -> f64 {
    ((cur as f64 - prev as f64) / dt).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NetRates {
    /// Received bytes/s.
    pub net_in: f64,
    /// Transmitted bytes/s.
    pub net_out: f64,
}

/// Network throughput from cumulative rx/tx byte counters.
#[derive(Debug, Default)]
pub struct NetRateCache(PairRateCache);

impl NetRateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(&mut self, key: &str, rx: i64, tx: i64, now: f64) -> NetRates {
        let [net_in, net_out] = self.0.compute(key, [rx, tx], now);
        NetRates { net_in, net_out }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiskRates {
    /// Bytes/s read.
    pub read: f64,
    /// Bytes/s written.
    pub write: f64,
}

/// Disk throughput from cumulative read/write byte counters.
#[derive(Debug, Default)]
pub struct DiskRateCache(PairRateCache);

impl DiskRateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(&mut self, key: &str, read: i64, write: i64, now: f64) -> DiskRates {
        let [read, write] = self.0.compute(key, [read, write], now);
        DiskRates { read, write }
    }
}
