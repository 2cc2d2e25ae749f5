use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::error::StoreError;

/// Keeps the raw output of every scan as `<root>/<interface>/<timestamp>-<seq>.txt`.
///
/// The timestamp has microsecond resolution and the sequence number is unique
/// per archive instance, so rapid repeated scans never share a file name.
#[derive(Debug)]
pub struct ScanArchive {
    root: PathBuf,
    sequence: AtomicU64,
}

impl ScanArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Writes `raw` to a new file and returns its path. Existing files are never touched.
    pub fn archive(&self, interface: &str, raw: &str) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(interface);
        fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("{stamp}-{seq:06}.txt"));

        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
            file.write_all(raw.as_bytes())?;
            file.sync_all()
        };
        write().map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}
