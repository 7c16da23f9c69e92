//! Configuration constants for the smart-plug discovery engine

use std::time::Duration;

/// TCP port the device's description and control services listen on
pub const DEVICE_PORT: u16 = 49153;

/// Path of the device description document
pub const DESCRIPTION_PATH: &str = "/setup.xml";

/// Case-insensitive substrings that identify a vendor description document
pub const DEVICE_SIGNATURES: &[&str] = &["wemo", "belkin", "urn:belkin"];

/// Maximum concurrent host probes during a subnet sweep
pub const MAX_CONCURRENT_PROBES: usize = 50;

/// Per-host TCP probe timeout during sweeps
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for the description fetch that confirms a device fingerprint
pub const FINGERPRINT_TIMEOUT: Duration = Duration::from_secs(2);

// ====== Scan Progress Configuration ======

/// Progress percent reserved for pre-scan setup
pub const SCAN_PROGRESS_FLOOR: u8 = 15;

/// Progress percent where the sweep phase ends (post-processing follows)
pub const SCAN_PROGRESS_CEIL: u8 = 90;

/// Grace period before a Completed session resets to Idle
pub const SESSION_GRACE: Duration = Duration::from_secs(2);

// ====== Network Detection Configuration ======

/// Sentinel file marking an isolated container network namespace
pub const NAMESPACE_SENTINEL: &str = "/.dockerenv";

/// Local addresses with this prefix are assumed to be a bridge, not the real LAN
pub const BRIDGE_PREFIX: &str = "172.";

/// Common home/corporate /24 ranges tested when the process cannot see the
/// surrounding network directly, in preference order
pub const CANDIDATE_HOST_RANGES: &[&str] = &[
    "192.168.16.0/24",
    "192.168.1.0/24",
    "192.168.0.0/24",
    "10.0.0.0/24",
    "10.0.1.0/24",
    "172.16.0.0/24",
    "192.168.2.0/24",
    "192.168.10.0/24",
    "192.168.11.0/24",
    "192.168.20.0/24",
    "192.168.50.0/24",
    "192.168.100.0/24",
];

/// Host offsets where devices are commonly parked, probed on the device port
pub const CANDIDATE_DEVICE_OFFSETS: &[u32] = &[169, 100, 101, 150];

/// Last-resort ranges probed at the gateway before giving up
pub const FALLBACK_RANGES: &[&str] = &[
    "192.168.1.0/24",
    "192.168.0.0/24",
    "10.0.0.0/24",
    "172.16.0.0/24",
    "172.17.0.0/24",
    "172.18.0.0/24",
    "172.19.0.0/24",
    "172.20.0.0/24",
];

/// Range returned when every detection method fails
pub const DEFAULT_RANGE: &str = "192.168.1.0/24";

/// Timeout for device-offset probes during network detection
pub const DETECT_DEVICE_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for gateway reachability probes during network detection
pub const DETECT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(1);

// ====== Status Polling Configuration ======

/// Maximum concurrent per-device status queries
pub const MAX_CONCURRENT_STATUS: usize = 10;

/// Per-device status query timeout
pub const STATUS_DEVICE_TIMEOUT: Duration = Duration::from_secs(8);

/// Wall-clock bound on a whole status fan-out
pub const STATUS_OVERALL_TIMEOUT: Duration = Duration::from_secs(15);

// ====== Background Discovery Configuration ======

/// Interval between background discovery runs
pub const BACKGROUND_INTERVAL: Duration = Duration::from_secs(300);

/// Backoff after a failed background discovery run
pub const BACKGROUND_RETRY: Duration = Duration::from_secs(60);

/// Discovery timeout used by the background worker
pub const BACKGROUND_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Default broadcast discovery timeout for interactive refreshes
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-host scan time used by the display-only estimate (seconds)
pub const ESTIMATE_SECS_PER_HOST: f64 = 0.1;
