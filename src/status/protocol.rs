//! Quake 3 out-of-band status protocol
//!
//! A status request is the connectionless header `FF FF FF FF` followed by
//! `getstatus\n`. The reply carries `statusResponse\n`, one backslash-separated
//! info string, then one `<score> <ping> "<name>"` line per player.

use crate::error::SidecarError;
use crate::types::{PlayerSnapshot, StatusSnapshot};
use std::collections::BTreeMap;

/// Connectionless packet marker
pub const OOB_HEADER: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

const STATUS_REQUEST: &[u8] = b"getstatus\n";
const STATUS_RESPONSE: &[u8] = b"statusResponse";
const MAP_NAME_KEY: &str = "mapname";

/// Build the datagram sent to the server
pub fn encode_status_request() -> Vec<u8> {
    let mut packet = Vec::with_capacity(OOB_HEADER.len() + STATUS_REQUEST.len());
    packet.extend_from_slice(&OOB_HEADER);
    packet.extend_from_slice(STATUS_REQUEST);
    packet
}

/// Parse one status reply datagram
pub fn parse_status_response(payload: &[u8]) -> Result<StatusSnapshot, SidecarError> {
    let body = payload
        .strip_prefix(&OOB_HEADER[..])
        .ok_or_else(|| SidecarError::malformed("missing connectionless header"))?;
    let body = body
        .strip_prefix(STATUS_RESPONSE)
        .ok_or_else(|| SidecarError::malformed("not a statusResponse packet"))?;

    // Names may carry arbitrary bytes. Invalid UTF-8 is replaced with U+FFFD,
    // so names differing only in such bytes collapse to one player.
    let text = String::from_utf8_lossy(body);
    let mut lines = text.split('\n');

    // Remainder of the "statusResponse" line; some servers pad it with '\r'.
    match lines.next() {
        Some(rest) if rest.trim().is_empty() => {}
        _ => return Err(SidecarError::malformed("unexpected data after response tag")),
    }

    let info_line = lines
        .next()
        .ok_or_else(|| SidecarError::malformed("missing server info string"))?;
    let mut server_info = parse_info_string(info_line)?;
    let map_name = server_info.remove(MAP_NAME_KEY).unwrap_or_default();

    let players = lines
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(parse_player_line)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StatusSnapshot {
        map_name,
        players,
        server_info,
    })
}

fn parse_info_string(line: &str) -> Result<BTreeMap<String, String>, SidecarError> {
    let line = line.trim_end_matches('\r');
    let mut info = BTreeMap::new();
    if line.is_empty() {
        return Ok(info);
    }

    let fields = line
        .strip_prefix('\\')
        .ok_or_else(|| SidecarError::malformed("info string must start with '\\'"))?;
    let parts: Vec<&str> = fields.split('\\').collect();
    if parts.len() % 2 != 0 {
        return Err(SidecarError::malformed(format!(
            "info string has a key without value ({} fields)",
            parts.len()
        )));
    }

    for pair in parts.chunks(2) {
        info.insert(pair[0].to_string(), pair[1].to_string());
    }
    Ok(info)
}

fn parse_player_line(line: &str) -> Result<PlayerSnapshot, SidecarError> {
    let bad = |what: &str| SidecarError::malformed(format!("{} in player line {:?}", what, line));

    let mut fields = line.splitn(3, ' ');
    let score = fields
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| bad("invalid score"))?;
    let ping = fields
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| bad("invalid ping"))?;
    let name = fields
        .next()
        .and_then(|s| s.strip_prefix('"'))
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| bad("unquoted name"))?;

    Ok(PlayerSnapshot::new(name, score, ping))
}
