//! Concurrent status polling
//!
//! Polls every registered device in parallel under a worker cap, with a
//! per-device timeout and an overall deadline for the whole batch. A
//! straggler past the deadline is aborted and reported offline so one
//! dead device cannot stall the report.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::client::DeviceControl;
use crate::config::MAX_CONCURRENT_STATUS;
use crate::models::{Capability, ConnectionStatus, Device, DeviceStatus, PowerState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub devices: Vec<DeviceStatus>,
    pub summary: StatusSummary,
    pub timestamp: String,
}

/// Poll `devices` concurrently. Always returns one entry per device, in
/// the input order, even when the overall deadline elapses.
pub async fn poll_all(
    devices: Vec<Device>,
    client: Arc<dyn DeviceControl>,
    per_device_timeout: Duration,
    overall_timeout: Duration,
) -> StatusReport {
    let total = devices.len();
    let deadline = Instant::now() + overall_timeout;
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_STATUS));

    let mut handles = Vec::with_capacity(total);
    for device in devices {
        let semaphore = Arc::clone(&semaphore);
        let client = Arc::clone(&client);
        handles.push((
            device.clone(),
            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("status semaphore never closed");
                poll_one(&device, client.as_ref(), per_device_timeout).await
            }),
        ));
    }

    let mut statuses = Vec::with_capacity(total);
    for (device, mut handle) in handles {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, &mut handle).await {
            Ok(Ok(status)) => statuses.push(status),
            Ok(Err(e)) => {
                tracing::error!("Status task for {} panicked: {}", device.udn, e);
                statuses.push(DeviceStatus::offline_for(
                    &device,
                    "Internal polling error".to_string(),
                ));
            }
            Err(_) => {
                handle.abort();
                tracing::warn!(
                    "Status poll for {} exceeded the overall deadline",
                    device.udn
                );
                statuses.push(DeviceStatus::offline_for(
                    &device,
                    "Connection timeout".to_string(),
                ));
            }
        }
    }

    let summary = StatusSummary {
        total,
        online: count_status(&statuses, ConnectionStatus::Online),
        offline: count_status(&statuses, ConnectionStatus::Offline),
        unknown: count_status(&statuses, ConnectionStatus::Unknown),
    };

    StatusReport {
        devices: statuses,
        summary,
        timestamp: Utc::now().to_rfc3339(),
    }
}

fn count_status(statuses: &[DeviceStatus], wanted: ConnectionStatus) -> usize {
    statuses
        .iter()
        .filter(|s| s.connection_status == wanted)
        .count()
}

/// Single-device probe ladder: a fresh state query when supported, else a
/// friendly-name read as a liveness check, else Unknown.
async fn poll_one(
    device: &Device,
    client: &dyn DeviceControl,
    timeout: Duration,
) -> DeviceStatus {
    if device.supports(Capability::QueryState) {
        match client.query_state(device, true, timeout).await {
            Ok(state) => online_status(device, state),
            Err(e) => {
                tracing::debug!("State query failed for {}: {}", device.udn, e);
                DeviceStatus::offline_for(device, e.to_string())
            }
        }
    } else if device.supports(Capability::QueryFriendlyName) {
        match client.query_friendly_name(device, timeout).await {
            Ok(_) => online_status(device, PowerState::Unknown),
            Err(e) => {
                tracing::debug!("Liveness check failed for {}: {}", device.udn, e);
                DeviceStatus::offline_for(device, e.to_string())
            }
        }
    } else {
        DeviceStatus::unknown_for(device)
    }
}

fn online_status(device: &Device, state: PowerState) -> DeviceStatus {
    let mut status = DeviceStatus::unknown_for(device);
    status.connection_status = ConnectionStatus::Online;
    status.state = state;
    status.last_seen = Some(Utc::now().to_rfc3339());
    status
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
