//! WiFi mode switcher.
//!
//! Lets an operator pick a wireless adapter, scan for networks, choose one,
//! enter its password and hand everything to a privileged script that puts
//! the device into internet-uplink / hotspot mode.
//!
//! # Modules
//!
//! - [`interface`] - wireless adapter discovery
//! - [`scan`] - running the privileged scan command
//! - [`parser`] - extracting network names from scan output
//! - [`archive`] - keeping raw scan output for later inspection
//! - [`session`] - per-session storage of the last scan
//! - [`credentials`] - per-network credential files
//! - [`roles`] - the saved uplink/hotspot assignment
//! - [`connection`] - running the connect script
//! - [`workflow`] - the scan/connect state machine tying it all together
//! - [`server`] - the web form
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use wifi_switcher::{Config, ConnectRequest, SessionId, SystemRunner, Workflow};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let workflow = Workflow::new(&Config::load()?, Arc::new(SystemRunner));
//! let session = SessionId::generate();
//!
//! let scan = workflow.scan(&session, "wlan0").await?;
//! println!("Networks: {:?}", scan.networks);
//!
//! workflow
//!     .connect(
//!         &session,
//!         &ConnectRequest {
//!             interface: "wlan0".into(),
//!             ssid: "Home".into(),
//!             secret: "password123".into(),
//!             uplink: "eth0".into(),
//!             hotspot: "wlan0".into(),
//!         },
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod archive;

/// Application configuration loaded from a TOML file.
pub mod config;

pub mod connection;

pub mod credentials;

/// Error types, one per workflow stage.
pub mod error;

pub mod interface;

pub mod parser;

/// Directory and atomic-write helpers for the stores.
pub mod persist;

/// Process execution seam used for every external command.
pub mod process;

pub mod roles;

pub mod scan;

pub mod server;

pub mod session;

pub mod workflow;

pub use config::Config;
pub use connection::{AttemptOutcome, ConnectionAttempt};
pub use credentials::{Credential, CredentialStore};
pub use error::{ErrorKind, LaunchError, ScanError, StoreError, ValidationError, WorkflowError};
pub use interface::{InterfaceCatalog, WifiInterface};
pub use parser::parse_networks;
pub use process::{CommandRunner, ProcessOutput, RunError, SystemRunner};
pub use roles::{NetworkRoleConfig, RoleConfigStore};
pub use scan::ScanResult;
pub use session::{SessionId, SessionStore};
pub use workflow::{ConnectRequest, Workflow, WorkflowState};
