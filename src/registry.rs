//! In-memory device registry keyed by stable device identity (UDN)

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::Device;

#[derive(Debug, Default)]
struct RegistryInner {
    /// UDNs in insertion order; listing must be stable for display.
    order: Vec<String>,
    devices: HashMap<String, Device>,
}

/// Process-wide store of known devices.
///
/// Every identity maps to exactly one device. All operations take the
/// single lock so they appear atomic to concurrent callers; `list`
/// returns a snapshot taken under that lock.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    inner: Mutex<RegistryInner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a device if its identity is new. Returns false (leaving the
    /// existing entry untouched) on a duplicate identity.
    pub fn add(&self, device: Device) -> bool {
        let mut inner = self.lock();
        if inner.devices.contains_key(&device.udn) {
            return false;
        }
        inner.order.push(device.udn.clone());
        inner.devices.insert(device.udn.clone(), device);
        true
    }

    pub fn get(&self, udn: &str) -> Option<Device> {
        self.lock().devices.get(udn).cloned()
    }

    pub fn contains(&self, udn: &str) -> bool {
        self.lock().devices.contains_key(udn)
    }

    /// Remove one device, returning it so callers can report what was
    /// forgotten.
    pub fn remove(&self, udn: &str) -> Option<Device> {
        let mut inner = self.lock();
        let removed = inner.devices.remove(udn);
        if removed.is_some() {
            inner.order.retain(|id| id != udn);
        }
        removed
    }

    /// Clear the registry, returning the removed devices in listing order.
    pub fn remove_all(&self) -> Vec<Device> {
        let mut inner = self.lock();
        let order = std::mem::take(&mut inner.order);
        let mut devices = std::mem::take(&mut inner.devices);
        order
            .into_iter()
            .filter_map(|udn| devices.remove(&udn))
            .collect()
    }

    /// Snapshot of all devices in insertion order.
    pub fn list(&self) -> Vec<Device> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|udn| inner.devices.get(udn).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().devices.is_empty()
    }
}
