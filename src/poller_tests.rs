use super::*;
use crate::client::ClientFuture;
use anyhow::anyhow;

/// Scripted client: per-UDN behavior for state and name queries.
struct ScriptedClient {
    hang_udns: Vec<String>,
    fail_udns: Vec<String>,
    state: PowerState,
}

impl ScriptedClient {
    fn new(state: PowerState) -> Self {
        Self {
            hang_udns: Vec::new(),
            fail_udns: Vec::new(),
            state,
        }
    }
}

impl DeviceControl for ScriptedClient {
    fn describe<'a>(&'a self, _url: &'a str) -> ClientFuture<'a, Device> {
        Box::pin(async { Err(anyhow!("not under test")) })
    }

    fn broadcast_discover<'a>(&'a self, _timeout: Duration) -> ClientFuture<'a, Vec<Device>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn query_state<'a>(
        &'a self,
        device: &'a Device,
        _force_refresh: bool,
        _timeout: Duration,
    ) -> ClientFuture<'a, PowerState> {
        let state = self.state;
        Box::pin(async move {
            if self.hang_udns.contains(&device.udn) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_udns.contains(&device.udn) {
                return Err(anyhow!("connection refused"));
            }
            Ok(state)
        })
    }

    fn set_power<'a>(
        &'a self,
        _device: &'a Device,
        _on: bool,
        _timeout: Duration,
    ) -> ClientFuture<'a, PowerState> {
        Box::pin(async { Err(anyhow!("not under test")) })
    }

    fn query_friendly_name<'a>(
        &'a self,
        device: &'a Device,
        _timeout: Duration,
    ) -> ClientFuture<'a, String> {
        Box::pin(async move {
            if self.fail_udns.contains(&device.udn) {
                return Err(anyhow!("connection refused"));
            }
            Ok(device.name.clone())
        })
    }
}

fn device_with(udn: &str, capabilities: Vec<Capability>) -> Device {
    let mut device = Device::new(udn.to_string(), format!("Device {}", udn));
    device.capabilities = capabilities;
    device
}

#[tokio::test]
async fn reports_every_device_once() {
    let devices = vec![
        device_with("uuid:a", vec![Capability::QueryState]),
        device_with("uuid:b", vec![Capability::QueryState]),
        device_with("uuid:c", vec![Capability::QueryState]),
    ];
    let client = Arc::new(ScriptedClient::new(PowerState::On));

    let report = poll_all(
        devices,
        client,
        Duration::from_secs(1),
        Duration::from_secs(5),
    )
    .await;

    assert_eq!(report.devices.len(), 3);
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.online, 3);
    assert_eq!(report.devices[0].udn, "uuid:a");
    assert_eq!(report.devices[0].state, PowerState::On);
    assert!(report.devices[0].last_seen.is_some());
}

#[tokio::test]
async fn straggler_past_deadline_is_reported_offline() {
    let mut client = ScriptedClient::new(PowerState::Off);
    client.hang_udns.push("uuid:slow".to_string());

    let devices = vec![
        device_with("uuid:fast", vec![Capability::QueryState]),
        device_with("uuid:slow", vec![Capability::QueryState]),
    ];

    let report = poll_all(
        devices,
        Arc::new(client),
        Duration::from_secs(3600),
        Duration::from_millis(200),
    )
    .await;

    assert_eq!(report.devices.len(), 2);
    let slow = &report.devices[1];
    assert_eq!(slow.udn, "uuid:slow");
    assert_eq!(slow.connection_status, ConnectionStatus::Offline);
    assert_eq!(slow.error.as_deref(), Some("Connection timeout"));
}

#[tokio::test]
async fn query_failure_marks_device_offline_with_reason() {
    let mut client = ScriptedClient::new(PowerState::On);
    client.fail_udns.push("uuid:dead".to_string());

    let devices = vec![device_with("uuid:dead", vec![Capability::QueryState])];
    let report = poll_all(
        devices,
        Arc::new(client),
        Duration::from_secs(1),
        Duration::from_secs(5),
    )
    .await;

    let status = &report.devices[0];
    assert_eq!(status.connection_status, ConnectionStatus::Offline);
    assert!(status.error.as_deref().unwrap().contains("connection refused"));
    assert_eq!(report.summary.offline, 1);
}

#[tokio::test]
async fn name_only_device_uses_liveness_check() {
    let devices = vec![device_with(
        "uuid:nameonly",
        vec![Capability::QueryFriendlyName],
    )];
    let report = poll_all(
        devices,
        Arc::new(ScriptedClient::new(PowerState::On)),
        Duration::from_secs(1),
        Duration::from_secs(5),
    )
    .await;

    let status = &report.devices[0];
    assert_eq!(status.connection_status, ConnectionStatus::Online);
    assert_eq!(status.state, PowerState::Unknown);
}

#[tokio::test]
async fn capability_free_device_stays_unknown() {
    let devices = vec![device_with("uuid:mystery", Vec::new())];
    let report = poll_all(
        devices,
        Arc::new(ScriptedClient::new(PowerState::On)),
        Duration::from_secs(1),
        Duration::from_secs(5),
    )
    .await;

    let status = &report.devices[0];
    assert_eq!(status.connection_status, ConnectionStatus::Unknown);
    assert_eq!(status.state, PowerState::Unknown);
    assert_eq!(report.summary.unknown, 1);
}
