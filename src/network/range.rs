//! Network range validation, normalization, and description

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, OnceLock};

use crate::config::ESTIMATE_SECS_PER_HOST;

/// Memo for validation results, keyed by the exact input string.
/// Validation is pure and repeated calls with identical input are common
/// (every scan request re-validates its range).
fn validation_cache() -> &'static Mutex<HashMap<String, Result<String, String>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Result<String, String>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Validate and normalize a user-supplied network specification.
///
/// Accepts CIDR notation (`192.168.1.0/24`), an IP with a dotted subnet
/// mask (`192.168.1.0/255.255.255.0`), or a bare IPv4 address (treated
/// as `/32`). Returns the canonical `network/prefix` form with host bits
/// zeroed, or a caller-facing error message.
pub fn validate_network_range(input: &str) -> Result<String, String> {
    if let Some(cached) = validation_cache()
        .lock()
        .ok()
        .and_then(|cache| cache.get(input).cloned())
    {
        return cached;
    }

    let result = validate_uncached(input);

    if let Ok(mut cache) = validation_cache().lock() {
        cache.insert(input.to_string(), result.clone());
    }

    result
}

fn validate_uncached(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Network input must be a non-empty string".to_string());
    }

    if trimmed.contains('/') {
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() != 2 {
            return Err(
                "Invalid network format. Use CIDR notation (e.g., 192.168.1.0/24)".to_string(),
            );
        }

        let ip: Ipv4Addr = parts[0]
            .parse()
            .map_err(|_| format!("Invalid IP address: {}", parts[0]))?;

        let prefix_len = if parts[1].chars().all(|c| c.is_ascii_digit()) {
            let prefix: u32 = parts[1]
                .parse()
                .map_err(|_| "CIDR prefix length must be between 0 and 32".to_string())?;
            if prefix > 32 {
                return Err("CIDR prefix length must be between 0 and 32".to_string());
            }
            prefix as u8
        } else {
            let mask: Ipv4Addr = parts[1]
                .parse()
                .map_err(|_| format!("Invalid subnet mask: {}", parts[1]))?;
            prefix_from_mask(mask).ok_or_else(|| format!("Invalid subnet mask: {}", parts[1]))?
        };

        let network = mask_network(ip, prefix_len);
        Ok(format!("{}/{}", network, prefix_len))
    } else {
        let ip: Ipv4Addr = trimmed
            .parse()
            .map_err(|_| format!("Invalid network format: {}", trimmed))?;
        Ok(format!("{}/32", ip))
    }
}

/// Prefix length of a canonical (contiguous-ones) subnet mask.
fn prefix_from_mask(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let ones = bits.count_ones();
    let canonical = if ones == 0 { 0 } else { u32::MAX << (32 - ones) };
    if bits == canonical {
        Some(ones as u8)
    } else {
        None
    }
}

/// Zero the host bits of `ip` for the given prefix length.
fn mask_network(ip: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    let mask = if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    };
    Ipv4Addr::from(u32::from(ip) & mask)
}

/// Display-oriented description of a network range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeInfo {
    pub network_address: Ipv4Addr,
    pub broadcast_address: Ipv4Addr,
    pub cidr: String,
    pub prefix_length: u8,
    pub host_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_host: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_host: Option<Ipv4Addr>,
    pub is_single_host: bool,
    pub estimated_scan_seconds: f64,
    pub estimated_scan_time: String,
}

/// Describe a (normalized) CIDR range for display. The scan-time figure
/// is a linear estimate for the UI, not a scheduling guarantee.
pub fn describe_range(cidr: &str) -> Result<RangeInfo, String> {
    let network: Ipv4Network = cidr
        .parse()
        .map_err(|e| format!("Invalid network range: {}", e))?;
    let network = Ipv4Network::new(network.network(), network.prefix())
        .map_err(|e| format!("Invalid network range: {}", e))?;

    // Endpoints come from prefix arithmetic; a short prefix has billions
    // of hosts and must never be enumerated here.
    let base = u32::from(network.network());
    let (host_count, first_host, last_host) = match network.prefix() {
        32 => (1u64, network.network(), network.network()),
        31 => (2, network.network(), network.broadcast()),
        prefix => {
            let size = 1u64 << (32 - prefix);
            let last = Ipv4Addr::from((u64::from(base) + size - 2) as u32);
            (size - 2, Ipv4Addr::from(base + 1), last)
        }
    };
    let estimated_scan_seconds =
        (host_count as f64 * ESTIMATE_SECS_PER_HOST).max(1.0);

    Ok(RangeInfo {
        network_address: network.network(),
        broadcast_address: network.broadcast(),
        cidr: network.to_string(),
        prefix_length: network.prefix(),
        host_count: host_count as usize,
        first_host: Some(first_host),
        last_host: Some(last_host),
        is_single_host: host_count == 1,
        estimated_scan_seconds,
        estimated_scan_time: format!("{:.1}s", estimated_scan_seconds),
    })
}

/// Enumerate the usable host addresses of a range, in ascending order.
///
/// Network and broadcast addresses are excluded for prefixes of /30 and
/// shorter; /31 and /32 have no such reserved addresses.
pub fn host_addresses(network: Ipv4Network) -> Vec<Ipv4Addr> {
    let base = u32::from(network.network());
    let prefix = network.prefix();

    match prefix {
        32 => vec![network.network()],
        31 => vec![Ipv4Addr::from(base), Ipv4Addr::from(base + 1)],
        _ => {
            let size = 1u64 << (32 - prefix);
            (1..size - 1)
                .map(|offset| Ipv4Addr::from(base.wrapping_add(offset as u32)))
                .collect()
        }
    }
}

#[cfg(test)]
#[path = "range_tests.rs"]
mod range_tests;
