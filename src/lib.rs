//! PlugHub — Smart Plug Discovery & Control Engine
//!
//! This crate provides local smart-plug management:
//! - SSDP broadcast discovery and targeted IP discovery
//! - Concurrent TCP subnet sweeps with live progress tracking
//! - Automatic network range detection (container-aware)
//! - SOAP-style device control (power, state, friendly names)
//! - Concurrent status polling with per-device and overall deadlines
//! - Background auto-discovery on a fixed interval
//! - Persisted user-assigned display names

pub mod api;
pub mod app;
pub mod client;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod names;
pub mod network;
pub mod poller;
pub mod registry;
pub mod scanner;
pub mod session;

pub use app::{AppState, AppStateBuilder};
pub use client::{ClientFuture, DeviceControl, UpnpClient};
pub use config::*;
pub use discovery::{discover_by_ip, discover_devices, IpDiscoveryReport, IpDiscoveryResult};
pub use errors::{ApiError, ApiResult};
pub use models::*;
pub use monitor::BackgroundDiscovery;
pub use names::FriendlyNameStore;
pub use network::{
    describe_range, detect_default_range, host_addresses, validate_network_range, RangeInfo,
};
pub use poller::{poll_all, StatusReport, StatusSummary};
pub use registry::DeviceRegistry;
pub use scanner::{probe_device, scan_range, tcp_probe, ProbePolicy};
pub use session::{ScanProgress, ScanState, ScanTracker};
