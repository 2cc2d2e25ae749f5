use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Operator input rejected before any process runs or any file is written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Interface '{0}' is not an available wireless interface")]
    UnknownInterface(String),

    #[error("Interface '{0}' is not a network device on this host")]
    UnknownDevice(String),

    #[error("No scan in this session, scan for networks first")]
    NoScan,

    #[error("Last scan was on '{scanned}', not '{selected}'")]
    InterfaceMismatch { scanned: String, selected: String },

    #[error("Network '{ssid}' was not found in the last scan on '{interface}'")]
    NetworkNotScanned { ssid: String, interface: String },

    #[error("Uplink and hotspot must be different interfaces (both '{0}')")]
    SameInterface(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must not contain line breaks or NUL characters")]
    ControlCharacter(&'static str),
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Scan on '{interface}' timed out after {after:?}")]
    Timeout { interface: String, after: Duration },

    #[error("Failed to execute scan command: {0}")]
    ExecutionFailed(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed record {}: {source}", .path.display())]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Connect script exited with code {code}: {stderr}")]
    ScriptFailed { code: i32, stderr: String },

    #[error("Connect script was terminated (signal {signal:?})")]
    Terminated { signal: Option<i32> },

    #[error("Connect script timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to execute connect script: {0}")]
    ExecutionFailed(String),
}

/// Classification of a [`WorkflowError`] for operator-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    ExternalProcess,
    Persistence,
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Invalid selection: {0}")]
    Validation(ValidationError),

    #[error("Scan failed: {0}")]
    Scan(ScanError),

    #[error("Saving credentials failed: {0}")]
    CredentialSave(StoreError),

    #[error("Saving role configuration failed: {0}")]
    RoleConfigSave(StoreError),

    #[error("Connect failed: {0}")]
    Launch(LaunchError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::Scan(_) | WorkflowError::Launch(_) => ErrorKind::ExternalProcess,
            WorkflowError::CredentialSave(_) | WorkflowError::RoleConfigSave(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

impl From<ValidationError> for WorkflowError {
    fn from(err: ValidationError) -> Self {
        WorkflowError::Validation(err)
    }
}

impl From<ScanError> for WorkflowError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Validation(e) => WorkflowError::Validation(e),
            other => WorkflowError::Scan(other),
        }
    }
}

impl From<LaunchError> for WorkflowError {
    fn from(err: LaunchError) -> Self {
        WorkflowError::Launch(err)
    }
}
