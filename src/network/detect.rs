//! Default scan-range detection
//!
//! The scanning process often has a more restrictive network view than the
//! devices it needs to find (container namespaces, bridge networks), so
//! detection walks an ordered fallback chain and always produces *a* range
//! rather than erroring.

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::config::{
    BRIDGE_PREFIX, CANDIDATE_DEVICE_OFFSETS, CANDIDATE_HOST_RANGES, DEFAULT_RANGE,
    DETECT_DEVICE_TIMEOUT, DETECT_GATEWAY_TIMEOUT, DEVICE_PORT, FALLBACK_RANGES,
    NAMESPACE_SENTINEL,
};
use crate::scanner::tcp_probe;

/// Detect the subnet to scan when the caller did not supply one.
///
/// Fallback chain: isolated-namespace candidate enumeration, outbound-UDP
/// local address, routing-table gateway, gateway-probed fallback ranges,
/// hardcoded default. Never fails.
pub async fn detect_default_range() -> String {
    if Path::new(NAMESPACE_SENTINEL).exists() {
        tracing::info!("Isolated network namespace detected, enumerating host networks");
        if let Some(network) = detect_host_networks().await.into_iter().next() {
            tracing::info!("Selected host network for scanning: {}", network);
            return network;
        }
    }

    if let Some(local_ip) = local_outbound_ip() {
        tracing::info!("Detected local outbound address: {}", local_ip);
        if local_ip.to_string().starts_with(BRIDGE_PREFIX) {
            tracing::info!("Local address looks like a bridge, preferring host networks");
            if let Some(network) = detect_host_networks().await.into_iter().next() {
                return network;
            }
        } else {
            return derive_slash24(local_ip);
        }
    }

    if let Some(gateway) = default_gateway() {
        let network = derive_slash24(gateway);
        tracing::info!("Derived range {} from default gateway {}", network, gateway);
        return network;
    }

    tracing::info!("Trying fallback range detection");
    for range in FALLBACK_RANGES {
        if let Ok(network) = range.parse::<Ipv4Network>() {
            if gateway_reachable(network).await {
                tracing::info!("Detected reachable network range: {}", range);
                return (*range).to_string();
            }
        }
    }

    tracing::warn!("Could not detect network range, using default {}", DEFAULT_RANGE);
    DEFAULT_RANGE.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateSignal {
    Device,
    Reachable,
    None,
}

/// Enumerate plausible surrounding networks by probing a fixed candidate
/// list. A candidate with a device-port hit at a likely host offset is a
/// confirmed device network and outranks every merely-reachable network;
/// the candidate list's own order breaks ties.
pub async fn detect_host_networks() -> Vec<String> {
    let mut handles = Vec::with_capacity(CANDIDATE_HOST_RANGES.len());

    for range in CANDIDATE_HOST_RANGES {
        handles.push(tokio::spawn(async move {
            let signal = match range.parse::<Ipv4Network>() {
                Ok(network) => probe_candidate(network).await,
                Err(_) => CandidateSignal::None,
            };
            (*range, signal)
        }));
    }

    let mut device_networks = Vec::new();
    let mut reachable_networks = Vec::new();

    for handle in handles {
        match handle.await {
            Ok((range, CandidateSignal::Device)) => {
                tracing::info!("Found device network: {}", range);
                device_networks.push(range.to_string());
            }
            Ok((range, CandidateSignal::Reachable)) => {
                tracing::info!("Detected reachable host network: {}", range);
                reachable_networks.push(range.to_string());
            }
            Ok((_, CandidateSignal::None)) => {}
            Err(e) => tracing::debug!("Candidate probe task failed: {}", e),
        }
    }

    device_networks.extend(reachable_networks);
    device_networks
}

async fn probe_candidate(network: Ipv4Network) -> CandidateSignal {
    let base = u32::from(network.network());

    for &offset in CANDIDATE_DEVICE_OFFSETS {
        let candidate = Ipv4Addr::from(base.wrapping_add(offset));
        if tcp_probe(candidate, DEVICE_PORT, DETECT_DEVICE_TIMEOUT).await {
            tracing::info!("Found device at {} in network {}", candidate, network);
            return CandidateSignal::Device;
        }
    }

    if gateway_reachable(network).await {
        return CandidateSignal::Reachable;
    }

    CandidateSignal::None
}

/// Weak "this network exists" signal: the .1 gateway answers on HTTP/HTTPS.
async fn gateway_reachable(network: Ipv4Network) -> bool {
    let gateway = Ipv4Addr::from(u32::from(network.network()).wrapping_add(1));
    tcp_probe(gateway, 80, DETECT_GATEWAY_TIMEOUT).await
        || tcp_probe(gateway, 443, DETECT_GATEWAY_TIMEOUT).await
}

/// Local address the OS would use for outbound traffic, read from a
/// throwaway connected UDP socket (no packet is sent).
fn local_outbound_ip() -> Option<Ipv4Addr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()? {
        std::net::SocketAddr::V4(addr) => Some(*addr.ip()),
        std::net::SocketAddr::V6(_) => None,
    }
}

/// Default-gateway address from the OS routing state, if readable.
fn default_gateway() -> Option<Ipv4Addr> {
    let table = std::fs::read_to_string("/proc/net/route").ok()?;
    parse_route_table(&table)
}

/// Parse `/proc/net/route`: the default route has an all-zero destination;
/// addresses are little-endian hex.
fn parse_route_table(table: &str) -> Option<Ipv4Addr> {
    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[1] != "00000000" {
            continue;
        }
        if let Ok(raw) = u32::from_str_radix(fields[2], 16) {
            if raw != 0 {
                return Some(Ipv4Addr::from(raw.swap_bytes()));
            }
        }
    }
    None
}

/// The /24 containing `ip`.
fn derive_slash24(ip: Ipv4Addr) -> String {
    let octets = ip.octets();
    format!("{}.{}.{}.0/24", octets[0], octets[1], octets[2])
}
