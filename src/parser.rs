//! Extracts network names from raw scan output.
//!
//! The scan tool prints free-form text; the only lines of interest look like
//!
//! ```text
//!                     ESSID:"Home Network"
//! ```
//!
//! Anything that does not fit is skipped rather than reported.

use std::collections::HashSet;

/// Marker preceding the quoted network name on a scan output line.
pub const ESSID_MARKER: &str = "ESSID:";

/// Returns the network names in `raw`, first occurrence first, without duplicates.
///
/// ```
/// use wifi_switcher::parser::parse_networks;
///
/// let raw = "Cell 01\n  ESSID:\"Home\"\nCell 02\n  ESSID:\"Cafe\"\n  ESSID:\"Home\"\n";
/// assert_eq!(parse_networks(raw), vec!["Home", "Cafe"]);
/// ```
pub fn parse_networks(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut networks = Vec::new();

    for line in raw.lines() {
        let Some(pos) = line.find(ESSID_MARKER) else {
            continue;
        };
        let Some(ssid) = quoted_field(&line[pos + ESSID_MARKER.len()..]) else {
            continue;
        };
        if is_hidden(ssid) {
            continue;
        }
        if seen.insert(ssid) {
            networks.push(ssid.to_string());
        }
    }

    networks
}

/// The text between an opening quote right after the marker and the last quote on the line.
fn quoted_field(rest: &str) -> Option<&str> {
    let inner = rest.trim_start().strip_prefix('"')?;
    let end = inner.rfind('"')?;
    Some(&inner[..end])
}

// Hidden networks show up as "" or as a run of escaped NUL bytes
fn is_hidden(ssid: &str) -> bool {
    ssid.is_empty() || ssid.split("\\x00").all(str::is_empty)
}
