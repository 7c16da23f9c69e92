//! Scanner module - host probing and concurrent subnet sweeps

pub mod probe;
pub mod sweep;

pub use probe::{probe_device, tcp_probe, ProbePolicy};
pub use sweep::scan_range;
