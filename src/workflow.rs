//! Workflow controller.
//!
//! Ties the components together per operator session:
//!
//! ```text
//! Idle -> Scanning -> Scanned -> Connecting -> Connected
//!            |                       |
//!            +-------> Failed <------+
//! ```
//!
//! A connect is only accepted for a network that the session's last scan
//! actually reported, and inputs are saved before the connect script runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{error, info, warn};

use crate::archive::ScanArchive;
use crate::config::Config;
use crate::connection::{AttemptOutcome, ConnectionAttempt, ConnectionLauncher};
use crate::credentials::{Credential, CredentialStore};
use crate::error::{ValidationError, WorkflowError};
use crate::interface::{InterfaceCatalog, WifiInterface};
use crate::parser::parse_networks;
use crate::process::CommandRunner;
use crate::roles::{NetworkRoleConfig, RoleConfigStore};
use crate::scan::{ScanExecutor, ScanResult};
use crate::session::{SessionId, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    Scanning,
    Scanned,
    Connecting,
    Connected,
    Failed(String),
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Idle => write!(f, "idle"),
            WorkflowState::Scanning => write!(f, "scanning"),
            WorkflowState::Scanned => write!(f, "scanned"),
            WorkflowState::Connecting => write!(f, "connecting"),
            WorkflowState::Connected => write!(f, "connected"),
            WorkflowState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Everything the operator submits with a connect action.
#[derive(Clone)]
pub struct ConnectRequest {
    /// Interface the operator scanned with.
    pub interface: String,
    pub ssid: String,
    pub secret: String,
    pub uplink: String,
    pub hotspot: String,
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("interface", &self.interface)
            .field("ssid", &self.ssid)
            .field("uplink", &self.uplink)
            .field("hotspot", &self.hotspot)
            .finish_non_exhaustive()
    }
}

pub struct Workflow<R> {
    catalog: InterfaceCatalog,
    scanner: ScanExecutor<R>,
    archive: ScanArchive,
    sessions: SessionStore,
    credentials: CredentialStore,
    roles: RoleConfigStore,
    launcher: ConnectionLauncher<R>,
    states: Mutex<HashMap<SessionId, (WorkflowState, Instant)>>,
    /// Held from saving inputs until the connect script exits.
    connect_lock: tokio::sync::Mutex<()>,
}

impl<R: CommandRunner> Workflow<R> {
    pub fn new(config: &Config, runner: Arc<R>) -> Self {
        let catalog = InterfaceCatalog::new(&config.net_class_dir, &config.wireless_prefix);

        Self {
            scanner: ScanExecutor::new(
                catalog.clone(),
                Arc::clone(&runner),
                config.scan_command.clone(),
                config.scan_timeout(),
            ),
            archive: ScanArchive::new(&config.archive_dir),
            sessions: SessionStore::new(),
            credentials: CredentialStore::new(&config.credential_dir),
            roles: RoleConfigStore::new(&config.role_config_path),
            launcher: ConnectionLauncher::new(
                runner,
                config.connect_command.clone(),
                config.connect_timeout(),
            ),
            catalog,
            states: Mutex::new(HashMap::new()),
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn interfaces(&self) -> Vec<WifiInterface> {
        self.catalog.list_wireless_interfaces()
    }

    /// All network devices, as candidates for the uplink/hotspot roles.
    pub fn devices(&self) -> Vec<String> {
        self.catalog.list_network_interfaces()
    }

    pub fn saved_roles(&self) -> Option<NetworkRoleConfig> {
        self.roles.load().unwrap_or_else(|e| {
            warn!("Ignoring saved role configuration: {}", e);
            None
        })
    }

    /// The session's state. Reading counts as activity for eviction.
    pub fn state(&self, session: &SessionId) -> WorkflowState {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        match states.get_mut(session) {
            Some((state, last_used)) => {
                *last_used = Instant::now();
                state.clone()
            }
            None => WorkflowState::default(),
        }
    }

    pub fn last_scan(&self, session: &SessionId) -> Option<Arc<ScanResult>> {
        self.sessions.get(session)
    }

    /// Back to `Idle`, dropping the session's scan.
    pub fn reset(&self, session: &SessionId) {
        self.sessions.remove(session);
        self.set_state(session, WorkflowState::Idle);
    }

    /// Forgets scans and states neither updated nor read for `ttl`.
    pub fn evict_expired(&self, ttl: Duration) {
        let evicted = self.sessions.evict_older_than(ttl);
        if evicted > 0 {
            info!("Evicted {} expired scan(s)", evicted);
        }
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, (_, updated)| updated.elapsed() <= ttl);
    }

    /// Scans with `interface` and makes the result the session's current scan.
    pub async fn scan(
        &self,
        session: &SessionId,
        interface: &str,
    ) -> Result<Arc<ScanResult>, WorkflowError> {
        self.reset(session);
        self.set_state(session, WorkflowState::Scanning);

        let raw = match self.scanner.scan(interface).await {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(session, e.into())),
        };

        let networks = parse_networks(&raw);
        let raw_output_ref = match self.archive.archive(interface, &raw) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not archive scan output: {}", e);
                None
            }
        };

        let result = Arc::new(ScanResult {
            interface: interface.to_string(),
            timestamp: Utc::now(),
            networks,
            raw_output_ref,
        });
        self.sessions.put(session.clone(), Arc::clone(&result));
        self.set_state(session, WorkflowState::Scanned);

        info!(
            "Scan on {} found {} network(s)",
            result.interface,
            result.networks.len()
        );
        Ok(result)
    }

    /// Saves the credential and role configuration, then runs the connect script.
    ///
    /// Connects from different sessions are serialized, so only one connect
    /// script reconfigures the interfaces at a time.
    pub async fn connect(
        &self,
        session: &SessionId,
        request: &ConnectRequest,
    ) -> Result<ConnectionAttempt, WorkflowError> {
        let roles = match self.validate(session, request) {
            Ok(roles) => roles,
            Err(e) => return Err(self.fail(session, e.into())),
        };
        self.set_state(session, WorkflowState::Connecting);

        let mut attempt = ConnectionAttempt::new(&request.ssid, roles);
        let _guard = self.connect_lock.lock().await;
        info!("Connection attempt {}", attempt);

        let credential = Credential::new(&request.ssid, &request.secret);
        let credential_path = match self.credentials.save(&credential) {
            Ok(path) => path,
            Err(e) => {
                let err = WorkflowError::CredentialSave(e);
                return Err(self.fail_attempt(session, attempt, err));
            }
        };
        attempt.credential_path = Some(credential_path.clone());

        if let Err(e) = self.roles.save(&attempt.roles) {
            return Err(self.fail_attempt(session, attempt, WorkflowError::RoleConfigSave(e)));
        }

        if let Err(e) = self.launcher.launch(&attempt.roles, &credential_path).await {
            return Err(self.fail_attempt(session, attempt, e.into()));
        }

        attempt.outcome = AttemptOutcome::Succeeded;
        info!("Connection attempt {}", attempt);
        self.set_state(session, WorkflowState::Connected);
        Ok(attempt)
    }

    fn validate(
        &self,
        session: &SessionId,
        request: &ConnectRequest,
    ) -> Result<NetworkRoleConfig, ValidationError> {
        require_text("SSID", &request.ssid)?;
        require_text("Password", &request.secret)?;

        let scan = self.sessions.get(session).ok_or(ValidationError::NoScan)?;
        if scan.interface != request.interface {
            return Err(ValidationError::InterfaceMismatch {
                scanned: scan.interface.clone(),
                selected: request.interface.clone(),
            });
        }
        if !scan.contains(&request.ssid) {
            return Err(ValidationError::NetworkNotScanned {
                ssid: request.ssid.clone(),
                interface: scan.interface.clone(),
            });
        }

        if request.uplink == request.hotspot {
            return Err(ValidationError::SameInterface(request.uplink.clone()));
        }
        self.catalog.require_device(&request.uplink)?;
        self.catalog.require_device(&request.hotspot)?;

        Ok(NetworkRoleConfig {
            uplink_interface: request.uplink.clone(),
            hotspot_interface: request.hotspot.clone(),
        })
    }

    fn set_state(&self, session: &SessionId, state: WorkflowState) {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.clone(), (state, Instant::now()));
    }

    fn fail(&self, session: &SessionId, err: WorkflowError) -> WorkflowError {
        error!("Session {}: {}", session, err);
        self.set_state(session, WorkflowState::Failed(err.to_string()));
        err
    }

    fn fail_attempt(
        &self,
        session: &SessionId,
        mut attempt: ConnectionAttempt,
        err: WorkflowError,
    ) -> WorkflowError {
        attempt.outcome = AttemptOutcome::Failed(err.to_string());
        info!("Connection attempt {}", attempt);
        self.fail(session, err)
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if value.contains(['\n', '\r', '\0']) {
        return Err(ValidationError::ControlCharacter(field));
    }
    Ok(())
}
