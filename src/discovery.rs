// Discovery registry: remembers which entity keys each host has already announced

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Metric,
    Container,
    Disk,
    Sensor,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Metric => "metric",
            Category::Container => "container",
            Category::Disk => "disk",
            Category::Sensor => "sensor",
        }
    }

    /// Published value keys behind one discovered identifier.
    pub fn entity_keys(&self, id: &str) -> Vec<String> {
        match self {
            Category::Metric | Category::Sensor => vec![id.to_string()],
            Category::Container => vec![format!("container_{id}_cpu"), format!("container_{id}_mem")],
            Category::Disk => vec![format!("disk_{id}_total"), format!("disk_{id}_free")],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only set of announced keys per (host, category).
#[derive(Debug, Default)]
pub struct DiscoveryRegistry {
    seen: HashMap<(String, Category), HashSet<String>>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns keys not seen before for this host and category, in input order without
    /// duplicates, and records them.
    pub fn diff_new<I, S>(&mut self, host: &str, category: Category, observed: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fresh = self.peek_new(host, category, observed);
        self.seen
            .entry((host.to_string(), category))
            .or_default()
            .extend(fresh.iter().cloned());
        fresh
    }

    /// Same result as `diff_new` without recording anything.
    pub fn peek_new<I, S>(&self, host: &str, category: Category, observed: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let seen = self.seen.get(&(host.to_string(), category));
        let mut fresh: Vec<String> = Vec::new();
        for key in observed {
            let key = key.as_ref();
            let known = seen.is_some_and(|s| s.contains(key));
            if !known && !fresh.iter().any(|k| k == key) {
                fresh.push(key.to_string());
            }
        }
        fresh
    }

    pub fn is_known(&self, host: &str, category: Category, key: &str) -> bool {
        self.seen
            .get(&(host.to_string(), category))
            .is_some_and(|s| s.contains(key))
    }
}
