//! External device-client boundary
//!
//! The description parser and SOAP invoker are collaborators, not part of
//! the discovery core; this trait is their contract. The engine depends
//! only on `DeviceControl`, so tests inject mocks and the production
//! implementation lives in [`upnp`].

pub mod upnp;

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::models::{Device, PowerState};

pub use upnp::UpnpClient;

pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Contract to the black-box description/control client.
///
/// `query_state` with `force_refresh` must bypass any freshness shortcuts
/// and issue a new protocol-level read: repeated polls have to observe
/// physical button presses on the device, not a memoized value.
pub trait DeviceControl: Send + Sync {
    /// Resolve a full device description from its description URL.
    fn describe<'a>(&'a self, url: &'a str) -> ClientFuture<'a, Device>;

    /// Native broadcast-style discovery, bounded by `timeout`.
    fn broadcast_discover<'a>(&'a self, timeout: Duration) -> ClientFuture<'a, Vec<Device>>;

    /// Read the device's power state.
    fn query_state<'a>(
        &'a self,
        device: &'a Device,
        force_refresh: bool,
        timeout: Duration,
    ) -> ClientFuture<'a, PowerState>;

    /// Set the device's power state, returning the resulting state.
    fn set_power<'a>(
        &'a self,
        device: &'a Device,
        on: bool,
        timeout: Duration,
    ) -> ClientFuture<'a, PowerState>;

    /// Read the device's self-reported name; doubles as a lightweight
    /// liveness check for devices without a state query.
    fn query_friendly_name<'a>(
        &'a self,
        device: &'a Device,
        timeout: Duration,
    ) -> ClientFuture<'a, String>;
}
