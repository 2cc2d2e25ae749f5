use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::scan::ScanResult;

/// Opaque identifier of one operator session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// A fresh random identifier.
    pub fn generate() -> Self {
        SessionId(Uuid::new_v4().to_string())
    }

    /// Accepts only identifiers this crate could have generated.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value)
            .ok()
            .map(|id| SessionId(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Entry {
    scan: Arc<ScanResult>,
    last_used: Instant,
}

/// Most recent scan per session.
///
/// Results are stored behind an `Arc` and swapped whole under the lock, so a
/// reader sees either the previous result or the new one.
#[derive(Default)]
pub struct SessionStore {
    scans: RwLock<HashMap<SessionId, Entry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever the session held before.
    pub fn put(&self, session: SessionId, scan: Arc<ScanResult>) {
        let entry = Entry {
            scan,
            last_used: Instant::now(),
        };
        self.scans
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session, entry);
    }

    /// The session's scan. Reading counts as activity for eviction.
    pub fn get(&self, session: &SessionId) -> Option<Arc<ScanResult>> {
        let mut scans = self.scans.write().unwrap_or_else(|e| e.into_inner());
        let entry = scans.get_mut(session)?;
        entry.last_used = Instant::now();
        Some(Arc::clone(&entry.scan))
    }

    pub fn remove(&self, session: &SessionId) -> Option<Arc<ScanResult>> {
        self.scans
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session)
            .map(|entry| entry.scan)
    }

    /// Drops results neither stored nor read within `ttl`, returning how many were dropped.
    pub fn evict_older_than(&self, ttl: Duration) -> usize {
        let mut scans = self.scans.write().unwrap_or_else(|e| e.into_inner());
        let before = scans.len();
        scans.retain(|_, entry| entry.last_used.elapsed() <= ttl);
        before - scans.len()
    }

    pub fn len(&self) -> usize {
        self.scans.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn scan(interface: &str, networks: &[&str]) -> Arc<ScanResult> {
        Arc::new(ScanResult {
            interface: interface.to_string(),
            timestamp: Utc::now(),
            networks: networks.iter().map(|s| s.to_string()).collect(),
            raw_output_ref: None,
        })
    }

    #[test]
    fn absent_before_first_put() {
        let store = SessionStore::new();
        assert!(store.get(&SessionId::generate()).is_none());
    }

    #[test]
    fn last_put_wins() {
        let store = SessionStore::new();
        let session = SessionId::generate();
        let first = scan("wlan0", &["Home"]);
        let second = scan("wlan1", &["Cafe"]);

        store.put(session.clone(), Arc::clone(&first));
        assert_eq!(store.get(&session), Some(first));

        store.put(session.clone(), Arc::clone(&second));
        assert_eq!(store.get(&session), Some(second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new();
        let a = SessionId::generate();
        let b = SessionId::generate();

        store.put(a.clone(), scan("wlan0", &["Home"]));
        assert!(store.get(&b).is_none());

        store.remove(&a);
        assert!(store.is_empty());
    }

    #[test]
    fn eviction_drops_stale_entries() {
        let store = SessionStore::new();
        store.put(SessionId::generate(), scan("wlan0", &[]));

        assert_eq!(store.evict_older_than(Duration::from_secs(60)), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.evict_older_than(Duration::from_millis(1)), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn reading_keeps_a_session_alive() {
        let store = SessionStore::new();
        let session = SessionId::generate();
        store.put(session.clone(), scan("wlan0", &["Home"]));

        std::thread::sleep(Duration::from_millis(60));
        assert!(store.get(&session).is_some());
        assert_eq!(store.evict_older_than(Duration::from_millis(40)), 0);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(store.evict_older_than(Duration::from_millis(40)), 1);
        assert!(store.get(&session).is_none());
    }

    #[test]
    fn concurrent_readers_see_whole_results() {
        let store = Arc::new(SessionStore::new());
        let session = SessionId::generate();
        store.put(session.clone(), scan("wlan0", &["a", "b"]));

        let writer = {
            let store = Arc::clone(&store);
            let session = session.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    store.put(session.clone(), scan("wlan1", &["c", "d", "e"]));
                    store.put(session.clone(), scan("wlan0", &["a", "b"]));
                }
            })
        };

        for _ in 0..200 {
            let seen = store.get(&session).unwrap();
            match seen.interface.as_str() {
                "wlan0" => assert_eq!(seen.networks, vec!["a", "b"]),
                _ => assert_eq!(seen.networks, vec!["c", "d", "e"]),
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn parse_accepts_only_uuids() {
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(id.as_str()), Some(id));
        assert!(SessionId::parse("../../etc/passwd").is_none());
    }
}
