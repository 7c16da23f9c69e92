//! Typed service layer
//!
//! One function per caller-facing operation, returning serializable
//! response types or an [`ApiError`] carrying the status-code contract.
//! An HTTP front end maps these one-to-one onto routes; the CLI calls
//! them directly.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppState;
use crate::config::{
    DEFAULT_DISCOVERY_TIMEOUT, STATUS_DEVICE_TIMEOUT, STATUS_OVERALL_TIMEOUT,
};
use crate::discovery::{self, IpDiscoveryReport};
use crate::errors::{ApiError, ApiResult};
use crate::models::{Capability, Device, DeviceSummary, DiscoveryStatus, PowerState};
use crate::network::{describe_range, validate_network_range, RangeInfo};
use crate::poller::{poll_all, StatusReport};
use crate::session::ScanProgress;

/// Registered devices in discovery order, with display-name overrides applied.
pub fn list_devices(state: &AppState) -> Vec<DeviceSummary> {
    state
        .registry
        .list()
        .into_iter()
        .map(|device| {
            let friendly_name = state.names.get(&device.udn);
            DeviceSummary {
                display_name: friendly_name
                    .clone()
                    .unwrap_or_else(|| device.name.clone()),
                friendly_name,
                name: device.name,
                udn: device.udn,
                model: device.model,
                serial: device.serial_number,
                ip_address: device.host,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub status: String,
    pub device_count: usize,
}

/// Interactive discovery pass (broadcast plus optional subnet scan).
/// `timeout` bounds the broadcast phase; absent means the default.
pub async fn run_discovery(
    state: &AppState,
    network_scan: bool,
    custom_network: Option<&str>,
    timeout: Option<std::time::Duration>,
) -> ApiResult<DiscoveryReport> {
    let custom = discovery::normalize_custom_network(custom_network)?;
    let timeout = timeout.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT);
    let count = discovery::discover_devices(state, timeout, network_scan, custom).await;
    Ok(DiscoveryReport {
        status: "completed".to_string(),
        device_count: count,
    })
}

/// Targeted discovery of specific addresses.
pub async fn discover_by_ip(state: &AppState, ip_input: &str) -> ApiResult<IpDiscoveryReport> {
    discovery::discover_by_ip(state, ip_input).await
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkScanReport {
    pub status: String,
    pub devices_found: usize,
    pub device_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_range: Option<String>,
}

/// Run a subnet scan to completion and report what it found. Conflicts
/// while another scan is running.
pub async fn run_network_scan(
    state: &AppState,
    custom_network: Option<&str>,
) -> ApiResult<NetworkScanReport> {
    let custom = discovery::normalize_custom_network(custom_network)?;
    state.tracker.begin("network", custom.clone())?;

    let before = state.registry.len();
    let total =
        discovery::discover_devices(state, DEFAULT_DISCOVERY_TIMEOUT, true, custom.clone()).await;

    Ok(NetworkScanReport {
        status: "completed".to_string(),
        devices_found: total.saturating_sub(before),
        device_count: total,
        network_range: custom,
    })
}

/// Live snapshot of the scan session.
pub fn scan_progress(state: &AppState) -> ScanProgress {
    state.tracker.snapshot()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub status: String,
    pub message: String,
}

/// Request cooperative cancellation of the running scan.
pub fn cancel_scan(state: &AppState) -> ApiResult<CancelResponse> {
    state.tracker.request_cancel()?;
    Ok(CancelResponse {
        status: "cancelling".to_string(),
        message: "Scan cancellation requested".to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgetResponse {
    pub status: String,
    pub message: String,
    pub remaining_devices: usize,
}

/// Remove one device and its display-name override.
pub fn forget_device(state: &AppState, udn: &str) -> ApiResult<ForgetResponse> {
    let device = state
        .registry
        .remove(udn)
        .ok_or_else(|| ApiError::NotFound(format!("Device {} not found", udn)))?;

    if let Err(e) = state.names.remove(udn) {
        tracing::warn!("Failed to drop friendly name for {}: {}", udn, e);
    }

    Ok(ForgetResponse {
        status: "success".to_string(),
        message: format!("Device '{}' removed", device.name),
        remaining_devices: state.registry.len(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedDevice {
    pub name: String,
    pub udn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgetAllResponse {
    pub status: String,
    pub devices_removed: usize,
    pub removed: Vec<RemovedDevice>,
    pub message: String,
}

/// Clear the registry and every display-name override.
pub fn forget_all_devices(state: &AppState) -> ForgetAllResponse {
    let removed = state.registry.remove_all();
    let udns: Vec<String> = removed.iter().map(|d| d.udn.clone()).collect();
    if let Err(e) = state.names.remove_many(&udns) {
        tracing::warn!("Failed to drop friendly names: {}", e);
    }

    ForgetAllResponse {
        status: "success".to_string(),
        devices_removed: removed.len(),
        removed: removed
            .into_iter()
            .map(|d| RemovedDevice {
                name: d.name,
                udn: d.udn,
            })
            .collect(),
        message: format!("Removed {} device(s)", udns.len()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryStatusReport {
    #[serde(flatten)]
    pub status: DiscoveryStatus,
    pub device_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_discovery_formatted: Option<String>,
}

pub fn discovery_status(state: &AppState) -> DiscoveryStatusReport {
    let status = state.discovery_status();
    let last_discovery_formatted = status
        .last_discovery
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    DiscoveryStatusReport {
        status,
        device_count: state.registry.len(),
        last_discovery_formatted,
    }
}

pub fn set_auto_discovery(state: &AppState, enabled: bool) -> DiscoveryStatus {
    tracing::info!(
        "Automatic discovery {}",
        if enabled { "enabled" } else { "disabled" }
    );
    state.set_auto_discovery(enabled)
}

/// Poll every registered device concurrently.
pub async fn devices_status(state: &AppState) -> StatusReport {
    poll_all(
        state.registry.list(),
        Arc::clone(&state.client),
        STATUS_DEVICE_TIMEOUT,
        STATUS_OVERALL_TIMEOUT,
    )
    .await
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkValidation {
    pub valid: bool,
    pub normalized: String,
    #[serde(flatten)]
    pub info: RangeInfo,
}

/// Validate and describe a caller-supplied network range.
pub fn validate_network(input: &str) -> ApiResult<NetworkValidation> {
    let normalized = validate_network_range(input).map_err(ApiError::Validation)?;
    let info = describe_range(&normalized).map_err(ApiError::Validation)?;
    Ok(NetworkValidation {
        valid: true,
        normalized,
        info,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: String,
    pub device: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<PowerState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
}

/// Invoke a named action against one device.
///
/// Unknown devices and unknown or unsupported actions are 404s; a device
/// that accepts the request but fails it is a 400.
pub async fn invoke_action(state: &AppState, udn: &str, action: &str) -> ApiResult<ActionResponse> {
    let device = require_device(state, udn)?;

    let capability = Capability::from_action_name(action)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown action '{}'", action)))?;
    if !device.supports(capability) {
        return Err(ApiError::NotFound(format!(
            "Device '{}' does not support action '{}'",
            device.name, action
        )));
    }

    let timeout = STATUS_DEVICE_TIMEOUT;
    let mut response = ActionResponse {
        status: "success".to_string(),
        device: state.names.display_name(&device),
        action: action.to_string(),
        state: None,
        friendly_name: None,
    };

    match capability {
        Capability::PowerOn => {
            response.state = Some(invocation(state.client.set_power(&device, true, timeout)).await?);
        }
        Capability::PowerOff => {
            response.state =
                Some(invocation(state.client.set_power(&device, false, timeout)).await?);
        }
        Capability::Toggle => {
            let current = invocation(state.client.query_state(&device, true, timeout)).await?;
            let target = current != PowerState::On;
            response.state =
                Some(invocation(state.client.set_power(&device, target, timeout)).await?);
        }
        Capability::QueryState => {
            response.state =
                Some(invocation(state.client.query_state(&device, true, timeout)).await?);
        }
        Capability::QueryFriendlyName => {
            response.friendly_name =
                Some(invocation(state.client.query_friendly_name(&device, timeout)).await?);
        }
    }

    Ok(response)
}

async fn invocation<T>(
    fut: impl std::future::Future<Output = anyhow::Result<T>>,
) -> ApiResult<T> {
    fut.await
        .map_err(|e| ApiError::Invocation(format!("Device communication failed: {}", e)))
}

fn require_device(state: &AppState, udn: &str) -> ApiResult<Device> {
    state
        .registry
        .get(udn)
        .ok_or_else(|| ApiError::NotFound(format!("Device {} not found", udn)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeviceResult {
    pub device: String,
    pub udn: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkActionReport {
    pub action: String,
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<BulkDeviceResult>,
}

/// Switch every capable device on or off. Devices without the capability
/// are skipped, per-device failures are recorded, and the batch always
/// completes.
pub async fn bulk_set_power(state: &AppState, on: bool) -> ApiResult<BulkActionReport> {
    let devices = state.registry.list();
    if devices.is_empty() {
        return Err(ApiError::Validation("No devices discovered".to_string()));
    }

    let needed = if on {
        Capability::PowerOn
    } else {
        Capability::PowerOff
    };
    let action = needed.action_name().to_string();

    let mut results = Vec::with_capacity(devices.len());
    let mut succeeded = 0;
    let mut skipped = 0;
    let mut failed = 0;

    for device in &devices {
        let display = state.names.display_name(device);
        if !device.supports(needed) {
            skipped += 1;
            results.push(BulkDeviceResult {
                device: display,
                udn: device.udn.clone(),
                status: "skipped".to_string(),
                detail: Some(format!("Does not support '{}'", action)),
            });
            continue;
        }

        match state.client.set_power(device, on, STATUS_DEVICE_TIMEOUT).await {
            Ok(_) => {
                succeeded += 1;
                results.push(BulkDeviceResult {
                    device: display,
                    udn: device.udn.clone(),
                    status: "success".to_string(),
                    detail: None,
                });
            }
            Err(e) => {
                failed += 1;
                tracing::warn!("Bulk {} failed for {}: {}", action, device.udn, e);
                results.push(BulkDeviceResult {
                    device: display,
                    udn: device.udn.clone(),
                    status: "error".to_string(),
                    detail: Some(e.to_string()),
                });
            }
        }
    }

    Ok(BulkActionReport {
        action,
        total: devices.len(),
        succeeded,
        skipped,
        failed,
        results,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendlyNameResponse {
    pub udn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    pub display_name: String,
}

pub fn get_friendly_name(state: &AppState, udn: &str) -> ApiResult<FriendlyNameResponse> {
    let device = require_device(state, udn)?;
    let friendly_name = state.names.get(udn);
    Ok(FriendlyNameResponse {
        udn: udn.to_string(),
        display_name: friendly_name
            .clone()
            .unwrap_or_else(|| device.name.clone()),
        friendly_name,
    })
}

/// Set or clear the display-name override. An empty name clears it.
pub fn set_friendly_name(
    state: &AppState,
    udn: &str,
    name: Option<&str>,
) -> ApiResult<FriendlyNameResponse> {
    let device = require_device(state, udn)?;
    state
        .names
        .set(udn, name)
        .map_err(|e| ApiError::Invocation(format!("Failed to persist friendly name: {}", e)))?;

    let friendly_name = state.names.get(udn);
    Ok(FriendlyNameResponse {
        udn: udn.to_string(),
        display_name: friendly_name
            .clone()
            .unwrap_or_else(|| device.name.clone()),
        friendly_name,
    })
}

pub fn delete_friendly_name(state: &AppState, udn: &str) -> ApiResult<FriendlyNameResponse> {
    set_friendly_name(state, udn, None)
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
