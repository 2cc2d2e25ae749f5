use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::Serialize;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiInterface {
    pub name: String,
    pub is_usb: bool,
}

/// Reads network devices from a sysfs-style directory (`/sys/class/net`).
///
/// Nothing is cached: every query lists the directory again, so adapters
/// plugged in or removed between requests are picked up.
#[derive(Debug, Clone)]
pub struct InterfaceCatalog {
    net_dir: PathBuf,
    wireless_prefix: String,
}

impl InterfaceCatalog {
    pub fn new(net_dir: impl Into<PathBuf>, wireless_prefix: impl Into<String>) -> Self {
        Self {
            net_dir: net_dir.into(),
            wireless_prefix: wireless_prefix.into(),
        }
    }

    /// All network device names, sorted. Unreadable listing yields an empty list.
    pub fn list_network_interfaces(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.net_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", self.net_dir.display(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    /// Wireless adapters: devices named `<prefix><N>`.
    pub fn list_wireless_interfaces(&self) -> Vec<WifiInterface> {
        self.list_network_interfaces()
            .into_iter()
            .filter(|name| is_wireless_name(name, &self.wireless_prefix))
            .map(|name| WifiInterface {
                is_usb: is_usb_interface(&self.net_dir, &name),
                name,
            })
            .collect()
    }

    /// Get a wireless interface by name, failing if it is not currently listed.
    pub fn get_interface(&self, name: &str) -> Result<WifiInterface, ValidationError> {
        self.list_wireless_interfaces()
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| ValidationError::UnknownInterface(name.to_string()))
    }

    /// Check that `name` is a listed network device of any kind.
    pub fn require_device(&self, name: &str) -> Result<(), ValidationError> {
        if self.list_network_interfaces().iter().any(|n| n == name) {
            Ok(())
        } else {
            Err(ValidationError::UnknownDevice(name.to_string()))
        }
    }
}

fn is_wireless_name(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Check if a network interface is USB-based by examining sysfs
fn is_usb_interface(net_dir: &Path, interface_name: &str) -> bool {
    let device_path = net_dir.join(interface_name).join("device");

    if !device_path.exists() {
        return false;
    }

    // The device link resolves through the USB bus for USB adapters
    if let Ok(resolved) = fs::read_link(&device_path) {
        if let Some(resolved_str) = resolved.to_str() {
            return resolved_str.contains("usb");
        }
    }

    fs::read_to_string(device_path.join("uevent"))
        .map(|content| content.contains("usb"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn net_dir(devices: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for device in devices {
            fs::create_dir(dir.path().join(device)).unwrap();
        }
        dir
    }

    #[test]
    fn lists_only_wireless_names_in_order() {
        let dir = net_dir(&["wlan1", "eth0", "lo", "wlan0", "wlanx", "wlan"]);
        let catalog = InterfaceCatalog::new(dir.path(), "wlan");

        let names: Vec<_> = catalog
            .list_wireless_interfaces()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["wlan0", "wlan1"]);
    }

    #[test]
    fn missing_listing_is_empty_not_an_error() {
        let catalog = InterfaceCatalog::new("/nonexistent/sys/class/net", "wlan");
        assert!(catalog.list_wireless_interfaces().is_empty());
        assert!(catalog.list_network_interfaces().is_empty());
    }

    #[test]
    fn get_interface_rejects_non_wireless_devices() {
        let dir = net_dir(&["wlan0", "eth0"]);
        let catalog = InterfaceCatalog::new(dir.path(), "wlan");

        assert_eq!(catalog.get_interface("wlan0").unwrap().name, "wlan0");
        assert_eq!(
            catalog.get_interface("eth0"),
            Err(ValidationError::UnknownInterface("eth0".into()))
        );
        assert!(catalog.require_device("eth0").is_ok());
        assert!(catalog.require_device("eth1").is_err());
    }

    #[test]
    fn usb_adapter_detected_from_uevent() {
        let dir = net_dir(&["wlan0", "wlan1"]);
        let device = dir.path().join("wlan1").join("device");
        fs::create_dir(&device).unwrap();
        fs::write(device.join("uevent"), "DRIVER=rtl8xxxu\nPRODUCT=usb/0bda/8179\n").unwrap();

        let catalog = InterfaceCatalog::new(dir.path(), "wlan");
        let interfaces = catalog.list_wireless_interfaces();
        assert!(!interfaces[0].is_usb);
        assert!(interfaces[1].is_usb);
    }
}
