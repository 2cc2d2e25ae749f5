//! WiFi network scanning module.
//!
//! Runs the privileged scan command for one interface and returns its raw
//! text output. The command is configured as an argument vector (by default
//! `sudo iwlist`) and the executor appends `<interface> scan`:
//!
//! ```bash
//! sudo iwlist wlan0 scan
//! ```
//!
//! The interface must be listed by the [`InterfaceCatalog`] at the time of the
//! call, otherwise nothing is executed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::error::ScanError;
use crate::interface::InterfaceCatalog;
use crate::process::{CommandRunner, RunError};

/// Networks seen by one scan on one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// The interface that was scanned.
    pub interface: String,

    /// When the scan finished.
    pub timestamp: DateTime<Utc>,

    /// Network names in first-seen order, without duplicates.
    pub networks: Vec<String>,

    /// Where the raw output was archived, if archiving succeeded.
    pub raw_output_ref: Option<PathBuf>,
}

impl ScanResult {
    pub fn contains(&self, ssid: &str) -> bool {
        self.networks.iter().any(|n| n == ssid)
    }
}

pub struct ScanExecutor<R> {
    catalog: InterfaceCatalog,
    runner: Arc<R>,
    command: Vec<String>,
    timeout: Duration,
}

impl<R: CommandRunner> ScanExecutor<R> {
    pub fn new(
        catalog: InterfaceCatalog,
        runner: Arc<R>,
        command: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            runner,
            command,
            timeout,
        }
    }

    /// Command line that scanning `interface` runs.
    pub fn command_line(&self, interface: &str) -> Vec<String> {
        let mut argv = self.command.clone();
        argv.push(interface.to_string());
        argv.push("scan".to_string());
        argv
    }

    /// Scans with `interface` and returns the raw output.
    ///
    /// A non-zero exit status is logged but still yields the output, since an
    /// interface that sees no networks is not a failure.
    pub async fn scan(&self, interface: &str) -> Result<String, ScanError> {
        let iface = self.catalog.get_interface(interface)?;
        let argv = self.command_line(&iface.name);

        let output = self
            .runner
            .run(&argv, self.timeout)
            .await
            .map_err(|e| match e {
                RunError::Timeout { after, .. } => ScanError::Timeout {
                    interface: iface.name.clone(),
                    after,
                },
                other => ScanError::ExecutionFailed(other.to_string()),
            })?;

        if !output.success() {
            warn!(
                "Scan on {} exited with {:?}: {}",
                iface.name,
                output.code,
                output.stderr.trim()
            );
        }
        debug!("Scan output for {}:\n{}", iface.name, output.stdout);

        Ok(output.stdout)
    }
}

/// Prints the networks of a scan as a numbered list.
///
/// # Output Format
/// ```text
/// #   SSID
/// ----------------------------------------
/// 1   MyHomeNetwork
/// 2   GuestNetwork
/// ```
pub fn display_scan(scan: &ScanResult) {
    if scan.networks.is_empty() {
        println!("No networks found.");
    } else {
        println!("{:<4}{}", "#", "SSID");
        println!("{}", "-".repeat(40));
        for (i, ssid) in scan.networks.iter().enumerate() {
            println!("{:<4}{}", i + 1, truncate_ssid(ssid, 36));
        }
    }

    if let Some(ref path) = scan.raw_output_ref {
        println!();
        println!("Raw output: {}", path.display());
    }
}

/// Shortens an SSID to at most `max_len` characters, ending in "..." when cut.
fn truncate_ssid(ssid: &str, max_len: usize) -> String {
    if ssid.chars().count() > max_len {
        let kept: String = ssid.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        ssid.to_string()
    }
}
