// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Conversions from live configuration and bridge state into the monitor
//! sink's wire DTOs. Kept here rather than in `hblink-monitor` so that
//! crate stays free of any dependency on `hblink-core`.

use hblink_core::{BridgeTable, EndpointConfig, EndpointRole, SystemConfig};
use hblink_monitor::{BridgeSnapshot, ConfigSnapshot, EndpointSnapshot, MembershipSnapshot, NamedBridgeSnapshot};
use std::time::Instant;

fn role_name(role: &EndpointRole) -> &'static str {
    match role {
        EndpointRole::Master { .. } => "master",
        EndpointRole::Peer { .. } => "peer",
        EndpointRole::OpenBridge { .. } => "openbridge",
    }
}

fn endpoint_snapshot(config: &EndpointConfig) -> EndpointSnapshot {
    EndpointSnapshot {
        name: config.name.clone(),
        role: role_name(&config.role).to_string(),
        bind_address: config.bind_address.to_string(),
        group_hangtime_secs: config.group_hangtime_secs,
    }
}

pub fn config_snapshot(config: &SystemConfig) -> ConfigSnapshot {
    ConfigSnapshot {
        ping_time_secs: config.ping_time_secs,
        stream_timeout_secs: config.stream_timeout_secs,
        endpoints: config.endpoints.iter().map(endpoint_snapshot).collect(),
    }
}

pub fn bridge_snapshot(bridges: &BridgeTable, now: Instant) -> BridgeSnapshot {
    let bridges = bridges
        .bridges()
        .iter()
        .map(|bridge| NamedBridgeSnapshot {
            name: bridge.name.clone(),
            memberships: bridge
                .memberships
                .iter()
                .map(|m| MembershipSnapshot {
                    endpoint: m.endpoint.clone(),
                    slot: match m.slot {
                        hblink_wire::dmrd::Slot::Ts1 => 1,
                        hblink_wire::dmrd::Slot::Ts2 => 2,
                    },
                    talkgroup: m.talkgroup,
                    active: m.active,
                    policy: format!("{:?}", m.policy).to_uppercase(),
                    deadline_secs_from_now: m.deadline.map(|d| d.saturating_duration_since(now).as_secs_f64()),
                })
                .collect(),
        })
        .collect();
    BridgeSnapshot { bridges }
}
