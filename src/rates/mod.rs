// Stateful converters from cumulative counters to rates and totals, keyed by host

pub mod counter;
pub mod energy;

pub use counter::{DiskRateCache, DiskRates, MIN_DT_SECS, NetRateCache, NetRates, PairRateCache};
pub use energy::{EnergyAccumulator, MICROJOULE_PER_KWH};
