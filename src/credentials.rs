use std::fmt;
use std::path::PathBuf;

use log::info;

use crate::error::StoreError;
use crate::persist::{ensure_private_dir, write_atomic};

/// An SSID together with its secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub ssid: String,
    pub secret: String,
}

impl Credential {
    pub fn new(ssid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            secret: secret.into(),
        }
    }

    /// File contents read by the connect script: SSID line, then secret line.
    pub fn to_file_contents(&self) -> String {
        format!("{}\n{}\n", self.ssid, self.secret)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("ssid", &self.ssid)
            .field("secret", &"********")
            .finish()
    }
}

/// One file per SSID in an owner-only directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, ssid: &str) -> PathBuf {
        self.dir.join(file_name_for(ssid))
    }

    /// Writes the credential file, replacing an earlier one for the same SSID.
    pub fn save(&self, credential: &Credential) -> Result<PathBuf, StoreError> {
        ensure_private_dir(&self.dir)?;

        let path = self.path_for(&credential.ssid);
        write_atomic(&path, credential.to_file_contents().as_bytes(), 0o600)?;

        info!("Saved credentials for '{}' to {}", credential.ssid, path.display());
        Ok(path)
    }
}

/// Maps an SSID to a file name that stays inside the credential directory.
///
/// `/`, `%` and NUL are percent-escaped, as is a leading `.` (so `..` and
/// hidden names cannot occur). Every other character is kept as is.
fn file_name_for(ssid: &str) -> String {
    let mut name = String::with_capacity(ssid.len());
    for (i, c) in ssid.chars().enumerate() {
        match c {
            '/' | '%' | '\0' => name.push_str(&format!("%{:02X}", c as u32)),
            '.' if i == 0 => name.push_str("%2E"),
            _ => name.push(c),
        }
    }
    name
}
