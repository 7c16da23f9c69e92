//! Discovery orchestration
//!
//! Up to three independent strategies per run (broadcast, subnet scan,
//! known-device refresh), each isolated so one failing strategy never
//! aborts the others. Devices dedup by UDN; an identity already in the
//! registry is left untouched, including its address. Forget and re-add
//! is the escape hatch for an address change.

use anyhow::Result;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::app::AppState;
use crate::config::{DESCRIPTION_PATH, DEVICE_PORT, PROBE_TIMEOUT};
use crate::errors::{ApiError, ApiResult};
use crate::network::{detect_default_range, validate_network_range};
use crate::scanner::scan_range;

fn description_url(ip: Ipv4Addr) -> String {
    format!("http://{}:{}{}", ip, DEVICE_PORT, DESCRIPTION_PATH)
}

/// Run a full discovery pass. Returns the total number of registered
/// devices afterwards.
///
/// `custom_network` must already be validated/normalized by the caller;
/// when absent and `network_scan` is set, the range is auto-detected.
pub async fn discover_devices(
    state: &AppState,
    timeout: Duration,
    network_scan: bool,
    custom_network: Option<String>,
) -> usize {
    tracing::info!("Starting device discovery");
    let started = std::time::Instant::now();

    // Strategy 1: native broadcast discovery
    match state.client.broadcast_discover(timeout).await {
        Ok(devices) => {
            for device in devices {
                if state.registry.add(device.clone()) {
                    tracing::info!("Discovered new device: {} ({})", device.name, device.udn);
                }
            }
        }
        Err(e) => tracing::error!("Broadcast discovery failed: {}", e),
    }

    // Strategy 2: subnet scan
    if network_scan {
        if let Err(e) = subnet_scan(state, custom_network).await {
            tracing::error!("Network scan discovery failed: {}", e);
        }
    }

    // Strategy 3: known-device refresh
    refresh_known_devices(state).await;

    state.record_discovery_run();

    if state.tracker.is_scanning() {
        let epoch = state.tracker.complete(&format!(
            "Discovery completed - Found {} devices",
            state.registry.len()
        ));
        state.tracker.spawn_idle_reset(epoch);
    }

    let count = state.registry.len();
    tracing::info!(
        "Discovery completed in {:.2}s. {} devices registered.",
        started.elapsed().as_secs_f64(),
        count
    );
    count
}

async fn subnet_scan(state: &AppState, custom_network: Option<String>) -> Result<()> {
    let range = match custom_network {
        Some(range) => {
            tracing::info!("Using custom network range: {}", range);
            range
        }
        None => detect_default_range().await,
    };
    let network: Ipv4Network = range
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid scan range {}: {}", range, e))?;

    // The session may already be Running when an explicit scan request
    // started it before delegating here; a conflict just means we join it.
    let _ = state.tracker.begin("network", Some(range.clone()));

    let found = scan_range(
        &state.http,
        &state.tracker,
        network,
        PROBE_TIMEOUT,
        state.probe_policy,
    )
    .await;

    state
        .tracker
        .update_step("Processing discovered devices", Some(90));

    for ip in found {
        match state.client.describe(&description_url(ip)).await {
            Ok(device) => {
                if state.registry.add(device.clone()) {
                    tracing::info!("Network scan found new device: {} at {}", device.name, ip);
                }
            }
            Err(e) => tracing::debug!("Failed to resolve device at {}: {}", ip, e),
        }
    }

    Ok(())
}

/// Verify each known device still answers. Failures are logged but never
/// remove the device from the registry.
async fn refresh_known_devices(state: &AppState) {
    use crate::models::Capability;

    for device in state.registry.list() {
        let result = if device.supports(Capability::QueryState) {
            state
                .client
                .query_state(&device, false, PROBE_TIMEOUT)
                .await
                .map(|_| ())
        } else if device.supports(Capability::QueryFriendlyName) {
            state
                .client
                .query_friendly_name(&device, PROBE_TIMEOUT)
                .await
                .map(|_| ())
        } else {
            Ok(())
        };

        if let Err(e) = result {
            tracing::warn!("Device {} ({}) may be offline: {}", device.name, device.udn, e);
        }
    }
}

/// Per-IP outcome of a targeted discovery request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpDiscoveryResult {
    pub ip: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_discovered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpDiscoveryReport {
    pub total_ips_processed: usize,
    pub newly_discovered: usize,
    pub already_existed: usize,
    pub failed: usize,
    pub summary: String,
    pub results: Vec<IpDiscoveryResult>,
}

/// Targeted discovery of one or more IPs (space/comma/semicolon
/// separated). Individual failures are reported per IP; the batch always
/// completes.
pub async fn discover_by_ip(state: &AppState, ip_input: &str) -> ApiResult<IpDiscoveryReport> {
    let ips: Vec<&str> = ip_input
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|part| !part.is_empty())
        .collect();

    if ips.is_empty() {
        return Err(ApiError::Validation(
            "No valid IP addresses provided".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(ips.len());
    let mut newly_discovered = 0;
    let mut already_existed = 0;
    let mut failed = 0;

    for raw_ip in &ips {
        let ip: Ipv4Addr = match raw_ip.parse() {
            Ok(ip) => ip,
            Err(_) => {
                failed += 1;
                results.push(IpDiscoveryResult {
                    ip: (*raw_ip).to_string(),
                    success: false,
                    name: None,
                    model: None,
                    udn: None,
                    serial: None,
                    ip_address: None,
                    already_discovered: None,
                    error: Some("Invalid IP address format".to_string()),
                    message: format!("'{}' is not a valid IP address", raw_ip),
                });
                continue;
            }
        };

        match state.client.describe(&description_url(ip)).await {
            Ok(device) => {
                let already = !state.registry.add(device.clone());
                if already {
                    already_existed += 1;
                } else {
                    newly_discovered += 1;
                }
                results.push(IpDiscoveryResult {
                    ip: raw_ip.to_string(),
                    success: true,
                    name: Some(device.name.clone()),
                    model: device.model.clone(),
                    udn: Some(device.udn.clone()),
                    serial: device.serial_number.clone(),
                    ip_address: device.host,
                    already_discovered: Some(already),
                    error: None,
                    message: if already {
                        format!("Device '{}' was already discovered", device.name)
                    } else {
                        format!("Device '{}' discovered and added successfully", device.name)
                    },
                });
            }
            Err(e) => {
                failed += 1;
                results.push(IpDiscoveryResult {
                    ip: raw_ip.to_string(),
                    success: false,
                    name: None,
                    model: None,
                    udn: None,
                    serial: None,
                    ip_address: None,
                    already_discovered: None,
                    error: Some(e.to_string()),
                    message: format!("Error discovering device at {}: {}", ip, e),
                });
            }
        }
    }

    let mut summary_parts = Vec::new();
    if newly_discovered > 0 {
        summary_parts.push(format!("{} new device(s) added", newly_discovered));
    }
    if already_existed > 0 {
        summary_parts.push(format!("{} device(s) already known", already_existed));
    }
    if failed > 0 {
        summary_parts.push(format!("{} failed", failed));
    }

    Ok(IpDiscoveryReport {
        total_ips_processed: ips.len(),
        newly_discovered,
        already_existed,
        failed,
        summary: format!("Processed {} IP(s): {}", ips.len(), summary_parts.join(", ")),
        results,
    })
}

/// Validate a caller-supplied custom range, mapping parse failures to the
/// 400 contract.
pub fn normalize_custom_network(custom_network: Option<&str>) -> ApiResult<Option<String>> {
    match custom_network {
        None => Ok(None),
        Some(raw) => validate_network_range(raw)
            .map(Some)
            .map_err(|e| ApiError::Validation(format!("Invalid network range: {}", e))),
    }
}
