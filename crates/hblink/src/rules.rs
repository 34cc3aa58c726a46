// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge/rule file loading. Kept separate from `SystemConfig` because
//! deployments typically edit the talkgroup routing table far more often
//! than the endpoint list, and `Membership`'s runtime fields (`deadline`)
//! aren't meant to round-trip through a config file.

use crate::error::StartupError;
use hblink_core::{Bridge, Membership, TimeoutPolicy};
use hblink_wire::dmrd::Slot;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    bridge: Vec<BridgeDef>,
}

#[derive(Debug, Deserialize)]
struct BridgeDef {
    name: String,
    #[serde(default)]
    membership: Vec<MembershipDef>,
}

#[derive(Debug, Deserialize)]
struct MembershipDef {
    endpoint: String,
    slot: u8,
    talkgroup: u32,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    policy: PolicyDef,
    #[serde(default)]
    timeout_secs: u64,
    #[serde(default)]
    on_triggers: Vec<u32>,
    #[serde(default)]
    off_triggers: Vec<u32>,
    #[serde(default)]
    reset_triggers: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum PolicyDef {
    On,
    Off,
    None,
}

impl Default for PolicyDef {
    fn default() -> Self {
        PolicyDef::None
    }
}

fn default_true() -> bool {
    true
}

/// Load bridges from a TOML rules file. Does not validate membership
/// endpoints against the running configuration; call
/// `BridgeTable::validate_endpoints` for that.
pub fn load_bridges(path: &Path) -> Result<Vec<Bridge>, StartupError> {
    let content = std::fs::read_to_string(path)?;
    let file: RulesFile = toml::from_str(&content)?;

    Ok(file
        .bridge
        .into_iter()
        .map(|b| Bridge {
            name: b.name,
            memberships: b.membership.into_iter().map(to_membership).collect(),
        })
        .collect())
}

fn to_membership(m: MembershipDef) -> Membership {
    let slot = if m.slot == 2 { Slot::Ts2 } else { Slot::Ts1 };
    let mut membership = Membership::new(m.endpoint, slot, m.talkgroup);
    membership.active = m.active;
    membership.policy = match m.policy {
        PolicyDef::On => TimeoutPolicy::On,
        PolicyDef::Off => TimeoutPolicy::Off,
        PolicyDef::None => TimeoutPolicy::None,
    };
    membership.timeout = std::time::Duration::from_secs(m.timeout_secs);
    membership.on_triggers = m.on_triggers.into_iter().collect();
    membership.off_triggers = m.off_triggers.into_iter().collect();
    membership.reset_triggers = m.reset_triggers.into_iter().collect();
    membership
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(
            &path,
            r#"
            [[bridge]]
            name = "TAC310"

            [[bridge.membership]]
            endpoint = "MASTER-1"
            slot = 1
            talkgroup = 3120

            [[bridge.membership]]
            endpoint = "OB-1"
            slot = 2
            talkgroup = 3120
            active = false
            policy = "ON"
            timeout_secs = 300
            on_triggers = [3100]
            "#,
        )
        .unwrap();

        let bridges = load_bridges(&path).unwrap();
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].name, "TAC310");
        assert_eq!(bridges[0].memberships.len(), 2);

        let second = &bridges[0].memberships[1];
        assert_eq!(second.slot, Slot::Ts2);
        assert!(!second.active);
        assert_eq!(second.policy, TimeoutPolicy::On);
        assert!(second.on_triggers.contains(&3100));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_bridges(Path::new("/nonexistent/rules.toml")).unwrap_err();
        assert!(matches!(err, StartupError::Io(_)));
    }
}
