//! The last-known status of a single client workstation.
//!
//! One [`PcStatus`] record exists per known client address. A record is
//! created on first discovery or status report and then replaced wholesale on
//! every subsequent report — there is no partial merge. The only field
//! touched outside a full report is `state`, which connection lifecycle
//! events may set (disconnect ⇒ [`PcState::Offline`]) independently of the
//! last reported metrics.
//!
//! Wire payload keys match the client agent's report format (`pc_name`,
//! `ip_address`, `mac_address`, `status`, ...); absent keys fall back to
//! defaults so a sparse report still decodes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Operational state of a workstation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcState {
    /// No live connection, or the client reported itself off.
    #[default]
    Offline,
    /// Connected, no active session.
    Idle,
    /// Connected with an active user session.
    Busy,
    /// Screen locked by the server.
    Locked,
}

/// Last-known status record for one client workstation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PcStatus {
    /// Human-readable machine name, e.g. `"PC-007"`.
    #[serde(rename = "pc_name", default)]
    pub name: String,
    /// The client's network address as observed by the transport.
    #[serde(rename = "ip_address", default)]
    pub address: String,
    /// Hardware identifier reported by the client (MAC address).
    #[serde(rename = "mac_address", default)]
    pub hardware_id: String,
    #[serde(rename = "status", default)]
    pub state: PcState,
    /// 0.0–100.0
    #[serde(default)]
    pub cpu_usage: f64,
    /// 0.0–100.0
    #[serde(default)]
    pub ram_usage: f64,
    /// 0.0–100.0
    #[serde(default)]
    pub disk_usage: f64,
    /// 0.0–100.0
    #[serde(default)]
    pub network_usage: f64,
    #[serde(default)]
    pub current_user: String,
    /// Session start, epoch milliseconds. `None` when no session is active.
    #[serde(rename = "session_start_time", default)]
    pub session_start: Option<u64>,
    #[serde(default)]
    pub uptime_seconds: u64,
    /// Last observed user activity, epoch milliseconds.
    #[serde(default)]
    pub last_activity: Option<u64>,
}

impl PcStatus {
    /// Builds a minimal record for a freshly discovered client.
    pub fn discovered(name: impl Into<String>, address: impl Into<String>, hardware_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            hardware_id: hardware_id.into(),
            state: PcState::Idle,
            ..Self::default()
        }
    }

    /// Decodes a full status record from a message payload.
    ///
    /// Unknown keys are ignored and absent keys take their default values,
    /// so older or sparser client agents still produce a usable record.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(payload.clone()))
    }

    /// Encodes this record as a message payload.
    pub fn to_payload(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // PcStatus always serializes to an object
            _ => Map::new(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
