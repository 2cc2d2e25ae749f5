use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::persist::write_atomic;

/// Which interface carries the internet uplink and which one serves the hotspot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRoleConfig {
    #[serde(rename = "uplink")]
    pub uplink_interface: String,
    #[serde(rename = "hotspot")]
    pub hotspot_interface: String,
}

/// A single JSON record, replaced whole on every save.
#[derive(Debug, Clone)]
pub struct RoleConfigStore {
    path: PathBuf,
}

impl RoleConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, roles: &NetworkRoleConfig) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_vec_pretty(roles).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &content, 0o644)?;

        info!(
            "Saved role configuration: uplink {}, hotspot {}",
            roles.uplink_interface, roles.hotspot_interface
        );
        Ok(())
    }

    /// The saved record, `None` if nothing was saved yet.
    pub fn load(&self) -> Result<Option<NetworkRoleConfig>, StoreError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| StoreError::Format {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn roles(uplink: &str, hotspot: &str) -> NetworkRoleConfig {
        NetworkRoleConfig {
            uplink_interface: uplink.into(),
            hotspot_interface: hotspot.into(),
        }
    }

    #[test]
    fn load_before_save_is_none() {
        let dir = TempDir::new().unwrap();
        let store = RoleConfigStore::new(dir.path().join("roles.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn record_uses_uplink_and_hotspot_keys() {
        let dir = TempDir::new().unwrap();
        let store = RoleConfigStore::new(dir.path().join("state").join("roles.json"));

        store.save(&roles("eth0", "wlan0")).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"uplink": "eth0", "hotspot": "wlan0"}));
    }

    #[test]
    fn save_replaces_previous_record() {
        let dir = TempDir::new().unwrap();
        let store = RoleConfigStore::new(dir.path().join("roles.json"));

        store.save(&roles("eth0", "wlan0")).unwrap();
        store.save(&roles("wlan1", "wlan0")).unwrap();

        assert_eq!(store.load().unwrap(), Some(roles("wlan1", "wlan0")));
    }

    #[test]
    fn garbage_record_is_a_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roles.json");
        fs::write(&path, "uplink=eth0").unwrap();

        assert!(matches!(
            RoleConfigStore::new(path).load(),
            Err(StoreError::Format { .. })
        ));
    }
}
