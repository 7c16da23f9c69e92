//! Network module - range validation, subnet math, default-range detection

pub mod detect;
pub mod range;

pub use detect::detect_default_range;
pub use range::{describe_range, host_addresses, validate_network_range, RangeInfo};
