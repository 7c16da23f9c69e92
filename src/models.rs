//! Data models for devices, statuses, and discovery bookkeeping

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::config::{DESCRIPTION_PATH, DEVICE_PORT};

/// Action kinds a device can expose.
///
/// The set is closed on purpose: action names arriving from callers are
/// mapped into this enum and anything unrecognized is rejected, rather
/// than dispatching arbitrary method names against the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    PowerOn,
    PowerOff,
    Toggle,
    QueryState,
    QueryFriendlyName,
}

impl Capability {
    /// Caller-facing action name (matches the control endpoint's path segment).
    pub fn action_name(&self) -> &'static str {
        match self {
            Capability::PowerOn => "on",
            Capability::PowerOff => "off",
            Capability::Toggle => "toggle",
            Capability::QueryState => "get_state",
            Capability::QueryFriendlyName => "get_friendly_name",
        }
    }

    /// Parse a caller-supplied action name. Unknown names return None and
    /// surface as NotFound at the service layer.
    pub fn from_action_name(name: &str) -> Option<Self> {
        match name {
            "on" => Some(Capability::PowerOn),
            "off" => Some(Capability::PowerOff),
            "toggle" => Some(Capability::Toggle),
            "get_state" => Some(Capability::QueryState),
            "get_friendly_name" => Some(Capability::QueryFriendlyName),
            _ => None,
        }
    }
}

/// A discovered controllable endpoint.
///
/// `udn` is the stable identity and the sole deduplication key; the
/// network address is mutable (DHCP), the descriptive metadata is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub udn: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
}

impl Device {
    /// Canonical minimal constructor to avoid field drift across call-sites.
    pub fn new(udn: String, name: String) -> Self {
        Self {
            udn,
            name,
            model: None,
            serial_number: None,
            host: None,
            capabilities: Vec::new(),
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// URL of the device's description document, when the address is known.
    pub fn description_url(&self) -> Option<String> {
        self.host
            .map(|ip| format!("http://{}:{}{}", ip, DEVICE_PORT, DESCRIPTION_PATH))
    }
}

/// Device summary as listed to callers, including the display-name override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    pub display_name: String,
    pub udn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<Ipv4Addr>,
}

/// Liveness classification from a status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Online,
    Offline,
    Unknown,
}

/// Last observed power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    Off,
    Unknown,
}

/// Per-device result of one status poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub name: String,
    pub udn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<Ipv4Addr>,
    pub state: PowerState,
    pub connection_status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceStatus {
    pub fn unknown_for(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            udn: device.udn.clone(),
            model: device.model.clone(),
            ip_address: device.host,
            state: PowerState::Unknown,
            connection_status: ConnectionStatus::Unknown,
            last_seen: None,
            error: None,
        }
    }

    pub fn offline_for(device: &Device, error: String) -> Self {
        let mut status = Self::unknown_for(device);
        status.connection_status = ConnectionStatus::Offline;
        status.error = Some(error);
        status
    }
}

/// Process-wide discovery bookkeeping, mutated by every discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_discovery: Option<chrono::DateTime<chrono::Utc>>,
    pub discovery_count: u64,
    pub auto_discovery_enabled: bool,
    pub background_discovery_running: bool,
}

impl Default for DiscoveryStatus {
    fn default() -> Self {
        Self {
            last_discovery: None,
            discovery_count: 0,
            auto_discovery_enabled: true,
            background_discovery_running: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_action_names_round_trip() {
        for cap in [
            Capability::PowerOn,
            Capability::PowerOff,
            Capability::Toggle,
            Capability::QueryState,
            Capability::QueryFriendlyName,
        ] {
            assert_eq!(Capability::from_action_name(cap.action_name()), Some(cap));
        }
        assert_eq!(Capability::from_action_name("reboot"), None);
    }

    #[test]
    fn description_url_requires_host() {
        let mut device = Device::new("uuid:Socket-1".into(), "Lamp".into());
        assert!(device.description_url().is_none());

        device.host = Some("192.168.1.169".parse().unwrap());
        assert_eq!(
            device.description_url().unwrap(),
            "http://192.168.1.169:49153/setup.xml"
        );
    }

    #[test]
    fn device_serialization_skips_empty_fields() {
        let device = Device::new("uuid:Socket-1".into(), "Lamp".into());
        let json = serde_json::to_string(&device).unwrap();
        assert!(!json.contains("model"));
        assert!(!json.contains("capabilities"));
        assert!(json.contains("\"udn\":\"uuid:Socket-1\""));
    }
}
