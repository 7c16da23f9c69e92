//! Background auto-discovery
//!
//! A single long-lived task that reruns discovery on a fixed interval.
//! The gap between runs is slept in one-second ticks so a stop request
//! takes effect promptly instead of waiting out a five-minute sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::app::AppState;
use crate::config::{
    BACKGROUND_DISCOVERY_TIMEOUT, BACKGROUND_INTERVAL, BACKGROUND_RETRY,
};
use crate::discovery::discover_devices;

pub struct BackgroundDiscovery {
    is_running: Arc<AtomicBool>,
}

impl BackgroundDiscovery {
    pub fn new() -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the periodic discovery loop. Idempotent: a second start while
    /// the loop is live is a no-op.
    pub fn start(&self, state: Arc<AppState>) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let is_running = Arc::clone(&self.is_running);
        state.set_background_running(true);

        tokio::spawn(async move {
            tracing::info!(
                "Background discovery started (interval: {}s)",
                BACKGROUND_INTERVAL.as_secs()
            );

            while is_running.load(Ordering::SeqCst) {
                let pause = run_cycle(&state, BACKGROUND_DISCOVERY_TIMEOUT + PASS_GRACE).await;

                for _ in 0..pause.as_secs() {
                    if !is_running.load(Ordering::SeqCst) {
                        break;
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }

            state.set_background_running(false);
            tracing::info!("Background discovery stopped");
        });
    }

    /// Request the loop to stop; it exits within a tick.
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

impl Default for BackgroundDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

/// Headroom past the discovery timeout before a pass is declared stuck.
const PASS_GRACE: Duration = Duration::from_secs(30);

/// One scheduling cycle. Returns the gap to sleep before the next one:
/// the regular interval after a pass (or while disabled), the shorter
/// retry interval after a failed pass.
async fn run_cycle(state: &AppState, deadline: Duration) -> Duration {
    if !state.auto_discovery_enabled() {
        // Disabled, not stopped: keep ticking so re-enable resumes
        // without restarting the loop.
        return BACKGROUND_INTERVAL;
    }

    match run_pass(state, None, deadline).await {
        Ok(count) => {
            tracing::debug!(
                "Background discovery pass complete: {} devices registered",
                count
            );
            BACKGROUND_INTERVAL
        }
        Err(e) => {
            tracing::error!("Background discovery pass failed: {}", e);
            BACKGROUND_RETRY
        }
    }
}

/// Full discovery pass, subnet sweep included, bounded by `deadline`.
async fn run_pass(
    state: &AppState,
    custom_network: Option<String>,
    deadline: Duration,
) -> anyhow::Result<usize> {
    tokio::time::timeout(
        deadline,
        discover_devices(state, BACKGROUND_DISCOVERY_TIMEOUT, true, custom_network),
    )
    .await
    .map_err(|_| anyhow::anyhow!("discovery pass exceeded its deadline"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientFuture, DeviceControl};
    use crate::models::{Device, PowerState};

    struct QuietClient;

    impl DeviceControl for QuietClient {
        fn describe<'a>(&'a self, _url: &'a str) -> ClientFuture<'a, Device> {
            Box::pin(async { Err(anyhow::anyhow!("unreachable")) })
        }
        fn broadcast_discover<'a>(&'a self, _timeout: Duration) -> ClientFuture<'a, Vec<Device>> {
            Box::pin(async { Ok(Vec::new()) })
        }
        fn query_state<'a>(
            &'a self,
            _device: &'a Device,
            _force_refresh: bool,
            _timeout: Duration,
        ) -> ClientFuture<'a, PowerState> {
            Box::pin(async { Ok(PowerState::Off) })
        }
        fn set_power<'a>(
            &'a self,
            _device: &'a Device,
            _on: bool,
            _timeout: Duration,
        ) -> ClientFuture<'a, PowerState> {
            Box::pin(async { Ok(PowerState::On) })
        }
        fn query_friendly_name<'a>(
            &'a self,
            _device: &'a Device,
            _timeout: Duration,
        ) -> ClientFuture<'a, String> {
            Box::pin(async { Ok("Lamp".to_string()) })
        }
    }

    /// Client whose broadcast never answers, stalling a pass past any deadline.
    struct StalledClient;

    impl DeviceControl for StalledClient {
        fn describe<'a>(&'a self, _url: &'a str) -> ClientFuture<'a, Device> {
            Box::pin(async { Err(anyhow::anyhow!("unreachable")) })
        }
        fn broadcast_discover<'a>(&'a self, _timeout: Duration) -> ClientFuture<'a, Vec<Device>> {
            Box::pin(async {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            })
        }
        fn query_state<'a>(
            &'a self,
            _device: &'a Device,
            _force_refresh: bool,
            _timeout: Duration,
        ) -> ClientFuture<'a, PowerState> {
            Box::pin(async { Ok(PowerState::Off) })
        }
        fn set_power<'a>(
            &'a self,
            _device: &'a Device,
            _on: bool,
            _timeout: Duration,
        ) -> ClientFuture<'a, PowerState> {
            Box::pin(async { Ok(PowerState::On) })
        }
        fn query_friendly_name<'a>(
            &'a self,
            _device: &'a Device,
            _timeout: Duration,
        ) -> ClientFuture<'a, String> {
            Box::pin(async { Ok("Lamp".to_string()) })
        }
    }

    fn test_state() -> Arc<AppState> {
        AppState::builder(Arc::new(QuietClient))
            .with_names_path(std::env::temp_dir().join("plughub_monitor_test_names.json"))
            .build()
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_clears_flag() {
        let monitor = BackgroundDiscovery::new();
        let state = test_state();

        monitor.start(Arc::clone(&state));
        monitor.start(Arc::clone(&state));
        assert!(monitor.is_running());

        monitor.stop();
        assert!(!monitor.is_running());

        // Give the loop a moment to observe the flag and update status.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn background_pass_runs_the_subnet_sweep() {
        let state = test_state();

        // TEST-NET-1 single-host range keeps the sweep fast and offline.
        let count = run_pass(
            &state,
            Some("192.0.2.1/32".to_string()),
            Duration::from_secs(30),
        )
        .await
        .unwrap();
        assert_eq!(count, 0);

        let progress = state.tracker.snapshot();
        assert_eq!(progress.total_ips, 1);
        assert_eq!(progress.ips_scanned, 1);
        assert_eq!(progress.progress_percent, 100);
        assert_eq!(state.discovery_status().discovery_count, 1);
    }

    #[tokio::test]
    async fn failed_pass_backs_off_before_the_next_cycle() {
        let state = AppState::builder(Arc::new(StalledClient))
            .with_names_path(std::env::temp_dir().join("plughub_monitor_stall_names.json"))
            .build();

        let pause = run_cycle(&state, Duration::from_millis(100)).await;
        assert_eq!(pause, BACKGROUND_RETRY);

        // A disabled worker skips the pass and waits out the full interval.
        state.set_auto_discovery(false);
        let pause = run_cycle(&state, Duration::from_millis(100)).await;
        assert_eq!(pause, BACKGROUND_INTERVAL);
    }
}
