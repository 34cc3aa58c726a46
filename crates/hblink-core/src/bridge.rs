// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge/rule engine: named bridges, memberships, and their
//! activation/deactivation timers and triggers.
//!
//! The whole table is held behind one lock (per the single-event-loop
//! design note); callers take `&mut BridgeTable` for every mutation rather
//! than locking per-membership.

use crate::error::ConfigError;
use hblink_wire::dmrd::Slot;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutPolicy {
    On,
    Off,
    None,
}

/// One endpoint's participation in a bridge.
#[derive(Debug, Clone)]
pub struct Membership {
    pub endpoint: String,
    pub slot: Slot,
    pub talkgroup: u32,
    pub active: bool,
    pub policy: TimeoutPolicy,
    pub deadline: Option<Instant>,
    pub on_triggers: HashSet<u32>,
    pub off_triggers: HashSet<u32>,
    pub reset_triggers: HashSet<u32>,
    pub timeout: Duration,
}

impl Membership {
    pub fn new(endpoint: impl Into<String>, slot: Slot, talkgroup: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            slot,
            talkgroup,
            active: true,
            policy: TimeoutPolicy::None,
            deadline: None,
            on_triggers: HashSet::new(),
            off_triggers: HashSet::new(),
            reset_triggers: HashSet::new(),
            timeout: Duration::from_secs(0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bridge {
    pub name: String,
    pub memberships: Vec<Membership>,
}

#[derive(Debug, Clone, Default)]
pub struct BridgeTable {
    bridges: Vec<Bridge>,
}

impl BridgeTable {
    pub fn new(bridges: Vec<Bridge>) -> Self {
        Self { bridges }
    }

    pub fn bridges(&self) -> &[Bridge] {
        &self.bridges
    }

    /// Initialise membership deadlines at startup: any membership that
    /// starts active with a timeout policy gets `deadline = now + timeout`.
    pub fn arm(&mut self, now: Instant) {
        for bridge in &mut self.bridges {
            for m in &mut bridge.memberships {
                if m.active && m.policy != TimeoutPolicy::None {
                    m.deadline = Some(now + m.timeout);
                }
            }
        }
    }

    /// Run the periodic (60s) rule timer over every membership.
    pub fn rule_timer_tick(&mut self, now: Instant) {
        for bridge in &mut self.bridges {
            for m in &mut bridge.memberships {
                match m.policy {
                    TimeoutPolicy::On if m.active => {
                        if m.deadline.map(|d| d < now).unwrap_or(false) {
                            m.active = false;
                        }
                    }
                    TimeoutPolicy::Off if !m.active => {
                        if m.deadline.map(|d| d < now).unwrap_or(false) {
                            m.active = true;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Apply in-band triggers observed at voice-terminator time on
    /// `endpoint`'s `slot` for destination `dst_id`.
    pub fn on_voice_terminator(&mut self, endpoint: &str, slot: Slot, dst_id: u32, now: Instant) {
        for bridge in &mut self.bridges {
            for m in &mut bridge.memberships {
                if m.endpoint != endpoint || m.slot != slot {
                    continue;
                }

                if dst_id == m.talkgroup
                    && ((m.policy == TimeoutPolicy::On && m.active)
                        || (m.policy == TimeoutPolicy::Off && !m.active))
                {
                    m.deadline = Some(now + m.timeout);
                }

                if m.on_triggers.contains(&dst_id) || m.reset_triggers.contains(&dst_id) {
                    if m.on_triggers.contains(&dst_id) && !m.active {
                        m.active = true;
                        m.deadline = Some(now + m.timeout);
                        if m.policy == TimeoutPolicy::Off {
                            m.deadline = Some(now);
                        }
                    } else if m.active && m.policy == TimeoutPolicy::On {
                        m.deadline = Some(now + m.timeout);
                    }
                }

                if m.off_triggers.contains(&dst_id) && m.active {
                    m.active = false;
                    if m.policy == TimeoutPolicy::On {
                        m.deadline = Some(now);
                    }
                }
                if !m.active && m.policy == TimeoutPolicy::Off {
                    m.deadline = Some(now + m.timeout);
                }
            }
        }
    }

    /// For an incoming group-voice DMRD from `src_endpoint` on `slot` bound
    /// for `dst_id`, return every other active membership that should
    /// receive it, paired with the bridge name it came through.
    pub fn targets_for(
        &self,
        src_endpoint: &str,
        slot: Slot,
        dst_id: u32,
    ) -> Vec<(&str, &Membership)> {
        let mut targets = Vec::new();
        for bridge in &self.bridges {
            let source_is_member = bridge.memberships.iter().any(|m| {
                m.endpoint == src_endpoint && m.slot == slot && m.talkgroup == dst_id && m.active
            });
            if !source_is_member {
                continue;
            }
            for m in &bridge.memberships {
                if m.endpoint != src_endpoint && m.active {
                    targets.push((bridge.name.as_str(), m));
                }
            }
        }
        targets
    }

    /// Reject any bridge that names an endpoint outside `known_endpoints`,
    /// so a typo in a rules file fails at startup instead of silently
    /// dropping calls at runtime.
    pub fn validate_endpoints(&self, known_endpoints: &HashSet<&str>) -> Result<(), ConfigError> {
        for bridge in &self.bridges {
            for m in &bridge.memberships {
                if !known_endpoints.contains(m.endpoint.as_str()) {
                    return Err(ConfigError::UnknownEndpoint {
                        bridge: bridge.name.clone(),
                        endpoint: m.endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
