//! Composition root: process-wide shared state
//!
//! All mutable state (registry, scan session, discovery counters, name
//! store) lives here and is passed by reference into the components, so
//! nothing reaches for globals and tests can build isolated instances.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::client::{DeviceControl, UpnpClient};
use crate::models::DiscoveryStatus;
use crate::names::FriendlyNameStore;
use crate::registry::DeviceRegistry;
use crate::scanner::ProbePolicy;
use crate::session::ScanTracker;

pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub tracker: Arc<ScanTracker>,
    pub names: Arc<FriendlyNameStore>,
    pub client: Arc<dyn DeviceControl>,
    /// Client used for raw probes (fingerprint fetches during sweeps).
    pub http: reqwest::Client,
    pub probe_policy: ProbePolicy,
    status: Mutex<DiscoveryStatus>,
}

impl AppState {
    /// Production wiring: UPnP client, name store at its default path.
    pub fn from_env() -> Arc<Self> {
        Self::builder(Arc::new(UpnpClient::new())).build()
    }

    pub fn builder(client: Arc<dyn DeviceControl>) -> AppStateBuilder {
        AppStateBuilder {
            client,
            names_path: None,
            probe_policy: ProbePolicy::default(),
        }
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, DiscoveryStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a completed discovery run (any strategy mix).
    pub fn record_discovery_run(&self) {
        let mut status = self.lock_status();
        status.last_discovery = Some(chrono::Utc::now());
        status.discovery_count += 1;
    }

    pub fn discovery_status(&self) -> DiscoveryStatus {
        self.lock_status().clone()
    }

    pub fn auto_discovery_enabled(&self) -> bool {
        self.lock_status().auto_discovery_enabled
    }

    pub fn set_auto_discovery(&self, enabled: bool) -> DiscoveryStatus {
        let mut status = self.lock_status();
        status.auto_discovery_enabled = enabled;
        status.clone()
    }

    pub fn set_background_running(&self, running: bool) {
        self.lock_status().background_discovery_running = running;
    }
}

pub struct AppStateBuilder {
    client: Arc<dyn DeviceControl>,
    names_path: Option<PathBuf>,
    probe_policy: ProbePolicy,
}

impl AppStateBuilder {
    pub fn with_names_path(mut self, path: PathBuf) -> Self {
        self.names_path = Some(path);
        self
    }

    pub fn with_probe_policy(mut self, policy: ProbePolicy) -> Self {
        self.probe_policy = policy;
        self
    }

    pub fn build(self) -> Arc<AppState> {
        let names_path = self
            .names_path
            .unwrap_or_else(FriendlyNameStore::default_path);

        Arc::new(AppState {
            registry: Arc::new(DeviceRegistry::new()),
            tracker: Arc::new(ScanTracker::new()),
            names: Arc::new(FriendlyNameStore::open(names_path)),
            client: self.client,
            http: reqwest::Client::new(),
            probe_policy: self.probe_policy,
            status: Mutex::new(DiscoveryStatus::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientFuture;
    use crate::models::{Device, PowerState};
    use std::time::Duration;

    struct NullClient;

    impl DeviceControl for NullClient {
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
            Box::pin(async { Err(anyhow::anyhow!("unreachable")) })
        }
        fn set_power<'a>(
            &'a self,
            _device: &'a Device,
            _on: bool,
            _timeout: Duration,
        ) -> ClientFuture<'a, PowerState> {
            Box::pin(async { Err(anyhow::anyhow!("unreachable")) })
        }
        fn query_friendly_name<'a>(
            &'a self,
            _device: &'a Device,
            _timeout: Duration,
        ) -> ClientFuture<'a, String> {
            Box::pin(async { Err(anyhow::anyhow!("unreachable")) })
        }
    }

    #[test]
    fn discovery_counters_advance_per_run() {
        let state = AppState::builder(Arc::new(NullClient))
            .with_names_path(std::env::temp_dir().join("plughub_app_test_names.json"))
            .build();

        assert_eq!(state.discovery_status().discovery_count, 0);
        state.record_discovery_run();
        state.record_discovery_run();

        let status = state.discovery_status();
        assert_eq!(status.discovery_count, 2);
        assert!(status.last_discovery.is_some());
    }

    #[test]
    fn auto_discovery_flag_toggles() {
        let state = AppState::builder(Arc::new(NullClient))
            .with_names_path(std::env::temp_dir().join("plughub_app_test_names2.json"))
            .build();

        assert!(state.auto_discovery_enabled());
        let status = state.set_auto_discovery(false);
        assert!(!status.auto_discovery_enabled);
        assert!(!state.auto_discovery_enabled());
    }
}
