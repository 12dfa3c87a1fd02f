// Domain models: host identity, raw and normalized snapshots, published records

mod host;
mod raw;
mod record;
mod snapshot;

pub use host::HostDescriptor;
pub use raw::{RawContainer, RawDisk, RawSnapshot, coerce_float, coerce_int};
pub use record::{HostRecord, TickReport};
pub use snapshot::{ContainerStat, DiskStat, METRIC_KEYS, NormalizedSnapshot, without_disabled};
