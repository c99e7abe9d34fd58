//! Heuristic parsing of raw network-status text.
//!
//! The status query prints every interface's properties as one flat stream
//! of `GENERAL.CONNECTION:` and `IP4.ADDRESS[n]:` lines with no record
//! boundaries. "Which interface am I looking at" can only be tracked from
//! line order, so the connection label is carried as running state across
//! lines. The result is a best guess: with several active interfaces the
//! heuristics can pick a plausible-but-wrong pair, which is a known accuracy
//! limitation rather than an error.

use crate::traits::{NetworkStatus, UNKNOWN};

/// Generic label reported whenever a wired interface holds an address.
pub const WIRED_LABEL: &str = "wired network";

const CONNECTION_KEY: &str = "GENERAL.CONNECTION:";
const ADDRESS_KEY: &str = "IP4.ADDRESS";
const WIRED_CONNECTION: &str = "Wired connection";
const LOOPBACK: &str = "127.0.0.1";

/// Derive the best-guess `(connection, ip-address)` pair from raw status
/// output. Single pass; last non-empty connection label wins, last non-wired
/// address wins, but the first wired address trumps both.
pub fn parse_network_status(raw: &str) -> NetworkStatus {
    let mut label = UNKNOWN.to_string();
    let mut address = UNKNOWN.to_string();
    let mut wired_address: Option<String> = None;

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.contains(CONNECTION_KEY) {
            let Some((_, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if !value.is_empty() {
                label = value.to_string();
            }
        } else if line.contains(ADDRESS_KEY) {
            let Some((_, value)) = line.split_once(':') else {
                continue;
            };
            // Strip the CIDR prefix length; a value without '/' is taken
            // whole.
            let value = value.trim();
            let addr = value.split_once('/').map_or(value, |(a, _)| a);
            if addr == LOOPBACK {
                continue;
            }
            if label.contains(WIRED_CONNECTION) {
                if wired_address.is_none() {
                    wired_address = Some(addr.to_string());
                }
            } else {
                address = addr.to_string();
            }
        }
    }

    if let Some(wired) = wired_address {
        tracing::debug!("wired interface holds {}, preferring it over wireless", wired);
        return NetworkStatus {
            connection: WIRED_LABEL.to_string(),
            ip_address: wired,
        };
    }
    if label != UNKNOWN {
        return NetworkStatus {
            connection: label,
            ip_address: address,
        };
    }
    NetworkStatus::unknown()
}

/// Split scan output into the network-name list: one SSID per non-empty line.
pub fn parse_ssid_list(raw: &str) -> Vec<String> {
    raw.trim()
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
