// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registration ACL: permit/deny repeater ids by range.
//!
//! Rules are evaluated in order; the first matching rule wins. If no rule
//! matches, the ACL's default action applies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclAction {
    Permit,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclRule {
    pub action: AclAction,
    pub start: u32,
    pub end: u32,
}

impl AclRule {
    fn matches(&self, peer_id: u32) -> bool {
        (self.start..=self.end).contains(&peer_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acl {
    #[serde(default)]
    pub rules: Vec<AclRule>,
    #[serde(default = "default_permit")]
    pub default_action: AclAction,
}

fn default_permit() -> AclAction {
    AclAction::Permit
}

impl Default for Acl {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default_action: AclAction::Permit,
        }
    }
}

impl Acl {
    pub fn permits(&self, peer_id: u32) -> bool {
        for rule in &self.rules {
            if rule.matches(peer_id) {
                return rule.action == AclAction::Permit;
            }
        }
        self.default_action == AclAction::Permit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_acl_permits_everyone() {
        let acl = Acl::default();
        assert!(acl.permits(1));
        assert!(acl.permits(u32::MAX));
    }

    #[test]
    fn first_matching_rule_wins() {
        let acl = Acl {
            rules: vec![
                AclRule { action: AclAction::Deny, start: 100, end: 200 },
                AclRule { action: AclAction::Permit, start: 0, end: u32::MAX },
            ],
            default_action: AclAction::Permit,
        };
        assert!(!acl.permits(150));
        assert!(acl.permits(50));
    }

    #[test]
    fn default_action_applies_when_no_rule_matches() {
        let acl = Acl {
            rules: vec![AclRule { action: AclAction::Permit, start: 0, end: 10 }],
            default_action: AclAction::Deny,
        };
        assert!(acl.permits(5));
        assert!(!acl.permits(11));
    }
}
