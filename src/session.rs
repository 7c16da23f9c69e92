//! Scan session state machine and live progress tracking
//!
//! One session exists process-wide: `Idle → Running → {Completed,
//! Cancelling → Completed} → Idle`. Starting while Running is a conflict,
//! never a queue. Counters only move forward within a session.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::{SCAN_PROGRESS_CEIL, SCAN_PROGRESS_FLOOR, SESSION_GRACE};
use crate::errors::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Running,
    Cancelling,
    Completed,
}

#[derive(Debug)]
struct SessionInner {
    state: ScanState,
    /// Bumped on every `begin` so a stale grace timer cannot reset a newer session.
    epoch: u64,
    scan_type: Option<String>,
    network_range: Option<String>,
    started_at: Option<Instant>,
    total_hosts: usize,
    hosts_probed: usize,
    devices_found: usize,
    progress_percent: u8,
    current_step: String,
    can_cancel: bool,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: ScanState::Idle,
            epoch: 0,
            scan_type: None,
            network_range: None,
            started_at: None,
            total_hosts: 0,
            hosts_probed: 0,
            devices_found: 0,
            progress_percent: 0,
            current_step: String::new(),
            can_cancel: false,
        }
    }
}

/// Shared handle to the process-wide scan session.
pub struct ScanTracker {
    inner: Mutex<SessionInner>,
}

impl ScanTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SessionInner::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        // A poisoned session lock means a panicked scan task; the counters
        // are still sound, so keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Transition `Idle/Completed → Running`. Rejects with a conflict while
    /// a scan is Running or draining a cancellation.
    pub fn begin(&self, scan_type: &str, network_range: Option<String>) -> ApiResult<()> {
        let mut inner = self.lock();
        if matches!(inner.state, ScanState::Running | ScanState::Cancelling) {
            return Err(ApiError::Conflict("Scan already in progress".to_string()));
        }

        let epoch = inner.epoch + 1;
        *inner = SessionInner::new();
        inner.epoch = epoch;
        inner.state = ScanState::Running;
        inner.scan_type = Some(scan_type.to_string());
        inner.network_range = network_range;
        inner.started_at = Some(Instant::now());
        inner.current_step = "Starting scan...".to_string();
        inner.can_cancel = true;
        Ok(())
    }

    /// Request cooperative cancellation. Valid only while Running and
    /// cancellable; in-flight probes are not force-killed.
    pub fn request_cancel(&self) -> ApiResult<()> {
        let mut inner = self.lock();
        if inner.state != ScanState::Running {
            return Err(ApiError::Validation("No scan in progress".to_string()));
        }
        if !inner.can_cancel {
            return Err(ApiError::Validation(
                "Current scan cannot be cancelled".to_string(),
            ));
        }
        inner.state = ScanState::Cancelling;
        inner.current_step = "Cancelling scan...".to_string();
        Ok(())
    }

    /// True once cancellation has been requested; the sweep checks this
    /// between result collections.
    pub fn is_cancelled(&self) -> bool {
        self.lock().state == ScanState::Cancelling
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.lock().state, ScanState::Running | ScanState::Cancelling)
    }

    pub fn set_network_range(&self, range: &str) {
        self.lock().network_range = Some(range.to_string());
    }

    /// Record the sweep's host total and move progress to the sweep floor.
    pub fn set_total_hosts(&self, total: usize) {
        let mut inner = self.lock();
        inner.total_hosts = total;
        inner.progress_percent = inner.progress_percent.max(SCAN_PROGRESS_FLOOR);
        inner.current_step = format!("Starting scan of {} IP addresses", total);
    }

    /// Record one completed probe. Counters are monotonic; completion maps
    /// onto the [floor, ceil] percent band reserved for the sweep phase.
    pub fn record_probe(&self, found_device: bool) {
        let mut inner = self.lock();
        inner.hosts_probed += 1;
        if found_device {
            inner.devices_found += 1;
        }

        if inner.total_hosts > 0 {
            let band = f64::from(SCAN_PROGRESS_CEIL - SCAN_PROGRESS_FLOOR);
            let fraction = inner.hosts_probed as f64 / inner.total_hosts as f64;
            let percent = f64::from(SCAN_PROGRESS_FLOOR) + fraction.min(1.0) * band;
            inner.progress_percent = inner.progress_percent.max(percent as u8);
        }

        inner.current_step = format!(
            "Scanned {}/{} IPs - Found {} devices",
            inner.hosts_probed, inner.total_hosts, inner.devices_found
        );
    }

    /// Free-form step update for the non-sweep phases.
    pub fn update_step(&self, step: &str, percent: Option<u8>) {
        let mut inner = self.lock();
        inner.current_step = step.to_string();
        if let Some(percent) = percent {
            inner.progress_percent = inner.progress_percent.max(percent.min(100));
        }
    }

    /// Transition to Completed (from Running or Cancelling) and return the
    /// session epoch for the grace reset.
    pub fn complete(&self, step: &str) -> u64 {
        let mut inner = self.lock();
        inner.state = ScanState::Completed;
        inner.can_cancel = false;
        inner.current_step = step.to_string();
        inner.progress_percent = 100;
        inner.epoch
    }

    /// After a grace period, reset a Completed session back to Idle so late
    /// status reads can still observe the completed state. A session begun
    /// in the meantime is left alone.
    pub fn spawn_idle_reset(self: &Arc<Self>, epoch: u64) {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(SESSION_GRACE).await;
            let mut inner = tracker.lock();
            if inner.state == ScanState::Completed && inner.epoch == epoch {
                let epoch = inner.epoch;
                *inner = SessionInner::new();
                inner.epoch = epoch;
            }
        });
    }

    /// Consistent snapshot for the progress endpoint.
    pub fn snapshot(&self) -> ScanProgress {
        let inner = self.lock();

        let elapsed_seconds = inner
            .started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let estimated_time_remaining = if inner.hosts_probed > 0 && inner.total_hosts > 0 {
            let avg = elapsed_seconds / inner.hosts_probed as f64;
            let remaining = inner.total_hosts.saturating_sub(inner.hosts_probed);
            let eta = remaining as f64 * avg;
            (eta > 0.0).then_some(eta)
        } else {
            None
        };

        ScanProgress {
            is_scanning: matches!(inner.state, ScanState::Running | ScanState::Cancelling),
            state: inner.state,
            scan_type: inner.scan_type.clone(),
            network_range: inner.network_range.clone(),
            progress_percent: inner.progress_percent,
            current_step: inner.current_step.clone(),
            ips_scanned: inner.hosts_probed,
            total_ips: inner.total_hosts,
            devices_found: inner.devices_found,
            elapsed_seconds,
            elapsed_formatted: format_duration(elapsed_seconds),
            estimated_time_remaining,
            estimated_time_remaining_formatted: estimated_time_remaining.map(format_duration),
            can_cancel: inner.can_cancel,
        }
    }
}

impl Default for ScanTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire-visible snapshot of the scan session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub is_scanning: bool,
    pub state: ScanState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_range: Option<String>,
    pub progress_percent: u8,
    pub current_step: String,
    pub ips_scanned: usize,
    pub total_ips: usize,
    pub devices_found: usize,
    pub elapsed_seconds: f64,
    pub elapsed_formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining_formatted: Option<String>,
    pub can_cancel: bool,
}

/// Human duration: seconds under a minute, minutes under an hour, else hours.
fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        format!("{:.1}m", seconds / 60.0)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}
