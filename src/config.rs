use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the web form listens on
    pub listen_port: u16,
    /// Directory listing the host's network devices
    pub net_class_dir: PathBuf,
    /// Wireless adapters are named `<prefix><N>`
    pub wireless_prefix: String,
    /// Scan command prefix; `<interface> scan` is appended
    pub scan_command: Vec<String>,
    pub scan_timeout_secs: u64,
    /// Connect script invocation; role and credential flags are appended
    pub connect_command: Vec<String>,
    pub connect_timeout_secs: u64,
    pub archive_dir: PathBuf,
    pub credential_dir: PathBuf,
    pub role_config_path: PathBuf,
    pub session_ttl_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Config {
            listen_port: 5555,
            net_class_dir: PathBuf::from("/sys/class/net"),
            wireless_prefix: "wlan".to_string(),
            scan_command: vec!["sudo".to_string(), "iwlist".to_string()],
            scan_timeout_secs: 45,
            connect_command: vec!["sudo".to_string(), "/usr/local/sbin/wifi-mode".to_string()],
            connect_timeout_secs: 180,
            archive_dir: data_dir.join("scans"),
            credential_dir: data_dir.join("credentials"),
            role_config_path: data_dir.join("roles.json"),
            session_ttl_secs: 3600,
            log_file: None,
        }
    }
}

impl Config {
    /// Loads the config from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Loads the config from `path`; a missing file gives the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_command.first().is_none_or(|p| p.is_empty()) {
            bail!("scan_command must name a program");
        }
        if self.connect_command.first().is_none_or(|p| p.is_empty()) {
            bail!("connect_command must name a program");
        }
        if self.wireless_prefix.is_empty() {
            bail!("wireless_prefix must not be empty");
        }
        if self.scan_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        Ok(())
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("wifi-switcher").join("config.toml"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("wifi-switcher"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/wifi-switcher"))
}
