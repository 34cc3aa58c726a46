// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Monitor wire messages. These are a self-contained snapshot of config and
//! bridge state, independent of the core crate's internal representation,
//! so the monitor sink never depends on `hblink-core`; the caller (the
//! binary) builds a snapshot from live state and hands it to the server.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MonitorMessage {
    #[serde(rename = "CONFIG_REQ")]
    ConfigReq,
    #[serde(rename = "CONFIG_SND")]
    ConfigSnd(ConfigSnapshot),
    #[serde(rename = "BRIDGE_SND")]
    BridgeSnd(BridgeSnapshot),
    #[serde(rename = "BRDG_EVENT")]
    BrdgEvent(CallEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    pub name: String,
    pub role: String,
    pub bind_address: String,
    pub group_hangtime_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSnapshot {
    pub ping_time_secs: u64,
    pub stream_timeout_secs: u64,
    pub endpoints: Vec<EndpointSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    pub endpoint: String,
    pub slot: u8,
    pub talkgroup: u32,
    pub active: bool,
    pub policy: String,
    pub deadline_secs_from_now: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSnapshot {
    pub bridges: Vec<NamedBridgeSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedBridgeSnapshot {
    pub name: String,
    pub memberships: Vec<MembershipSnapshot>,
}

/// One call-start or call-end record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEvent {
    pub endpoint: String,
    pub stream_id: u32,
    pub peer_id: u32,
    pub rf_src: u32,
    pub slot: u8,
    pub dst_id: u32,
    /// `Some` only for call-end events.
    pub duration_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_req_round_trips_through_json() {
        let json = serde_json::to_string(&MonitorMessage::ConfigReq).unwrap();
        let parsed: MonitorMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, MonitorMessage::ConfigReq));
    }

    #[test]
    fn call_event_round_trips_through_json() {
        let event = CallEvent {
            endpoint: "A".into(),
            stream_id: 1,
            peer_id: 0x2A,
            rf_src: 0x00102A,
            slot: 0,
            dst_id: 3120,
            duration_secs: Some(4.2),
        };
        let msg = MonitorMessage::BrdgEvent(event);
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: MonitorMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            MonitorMessage::BrdgEvent(e) => assert_eq!(e.stream_id, 1),
            _ => panic!("expected BRDG_EVENT"),
        }
    }
}
