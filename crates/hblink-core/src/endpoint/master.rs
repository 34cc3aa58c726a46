// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MASTER-role endpoint: the repeater-dialect login/challenge/config state
//! machine, as seen from the side that accepts repeaters.

use crate::acl::Acl;
use crate::crypto::{challenge_hash, constant_time_eq, random_salt};
use hblink_wire::control::{self, RepeaterDescription};
use hblink_wire::dmrd::{self, DmrdFields, PAYLOAD_LEN};
use hblink_wire::opcode::{self, Opcode};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    ChallengeSent,
    WaitingConfig,
    Yes,
}

#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub radio_id: u32,
    pub address: SocketAddr,
    pub state: PeerState,
    pub salt: u32,
    pub last_ping: Instant,
    pub missed_pings: u32,
    pub description: Option<RepeaterDescription>,
}

/// What happened as a result of feeding the master one datagram.
pub enum MasterEvent {
    /// Send this PDU back to the source address.
    Reply(Vec<u8>),
    /// A DMRD arrived from an authenticated peer; hand it to the router.
    /// `repeat_to` lists other attached peers' addresses to echo the raw
    /// datagram to when REPEAT is enabled.
    Dmrd {
        fields: DmrdFields,
        payload: [u8; PAYLOAD_LEN],
        repeat_to: Vec<SocketAddr>,
    },
    /// Nothing to send; the datagram was ignored or dropped.
    None,
}

pub struct MasterEndpoint {
    pub name: String,
    passphrase: String,
    repeat: bool,
    acl: Acl,
    peers: HashMap<u32, PeerRecord>,
}

impl MasterEndpoint {
    pub fn new(name: impl Into<String>, passphrase: impl Into<String>, repeat: bool, acl: Acl) -> Self {
        Self {
            name: name.into(),
            passphrase: passphrase.into(),
            repeat,
            acl,
            peers: HashMap::new(),
        }
    }

    pub fn peer(&self, radio_id: u32) -> Option<&PeerRecord> {
        self.peers.get(&radio_id)
    }

    pub fn peer_mut(&mut self, radio_id: u32) -> Option<&mut PeerRecord> {
        self.peers.get_mut(&radio_id)
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values()
    }

    /// Dispatch one datagram received from `src`.
    pub fn handle_datagram(&mut self, src: SocketAddr, buf: &[u8], now: Instant) -> MasterEvent {
        let Ok((op, _)) = opcode::detect(buf) else {
            return MasterEvent::None;
        };

        match op {
            Opcode::Rptl => self.handle_rptl(src, buf),
            Opcode::Rptk => self.handle_rptk(src, buf, now),
            Opcode::Rptc => self.handle_rptc(src, buf),
            Opcode::Rptcl => self.handle_rptcl(buf),
            Opcode::RptPing => self.handle_rptping(src, buf, now),
            Opcode::Dmrd => self.handle_dmrd(src, buf),
            _ => MasterEvent::None,
        }
    }

    fn handle_rptl(&mut self, src: SocketAddr, buf: &[u8]) -> MasterEvent {
        let Ok(radio_id) = control::parse_rptl(buf) else {
            return MasterEvent::None;
        };

        if !self.acl.permits(radio_id) {
            warn!(radio_id, "RPTL rejected by ACL");
            return MasterEvent::Reply(control::build_mstnak(radio_id));
        }

        let salt = random_salt();
        self.peers.insert(
            radio_id,
            PeerRecord {
                radio_id,
                address: src,
                state: PeerState::ChallengeSent,
                salt,
                last_ping: Instant::now(),
                missed_pings: 0,
                description: None,
            },
        );
        info!(radio_id, %src, "RPTL accepted, challenge sent");
        MasterEvent::Reply(control::build_rptack(salt))
    }

    fn handle_rptk(&mut self, src: SocketAddr, buf: &[u8], now: Instant) -> MasterEvent {
        let Ok((radio_id, hash)) = control::parse_rptk(buf) else {
            return MasterEvent::None;
        };

        let matches = self
            .peers
            .get(&radio_id)
            .map(|p| p.state == PeerState::ChallengeSent && p.address == src)
            .unwrap_or(false);
        if !matches {
            return MasterEvent::Reply(control::build_mstnak(radio_id));
        }

        let salt = self.peers[&radio_id].salt;
        let expected = challenge_hash(salt, self.passphrase.as_bytes());
        if constant_time_eq(&expected, &hash) {
            let peer = self.peers.get_mut(&radio_id).unwrap();
            peer.state = PeerState::WaitingConfig;
            peer.last_ping = now;
            MasterEvent::Reply(control::build_rptack(radio_id))
        } else {
            warn!(radio_id, "RPTK hash mismatch");
            self.peers.remove(&radio_id);
            MasterEvent::Reply(control::build_mstnak(radio_id))
        }
    }

    fn handle_rptc(&mut self, src: SocketAddr, buf: &[u8]) -> MasterEvent {
        let Ok((radio_id, desc)) = control::parse_rptc(buf) else {
            return MasterEvent::None;
        };

        let ready = self
            .peers
            .get(&radio_id)
            .map(|p| p.state == PeerState::WaitingConfig && p.address == src)
            .unwrap_or(false);
        if !ready {
            return MasterEvent::Reply(control::build_mstnak(radio_id));
        }

        let peer = self.peers.get_mut(&radio_id).unwrap();
        peer.description = Some(desc);
        peer.state = PeerState::Yes;
        info!(radio_id, "repeater configured, session up");
        MasterEvent::Reply(control::build_rptack(radio_id))
    }

    fn handle_rptcl(&mut self, buf: &[u8]) -> MasterEvent {
        let Ok(radio_id) = control::parse_rptcl(buf) else {
            return MasterEvent::None;
        };
        self.peers.remove(&radio_id);
        info!(radio_id, "RPTCL, peer deregistered");
        MasterEvent::Reply(control::build_mstnak(radio_id))
    }

    fn handle_rptping(&mut self, src: SocketAddr, buf: &[u8], now: Instant) -> MasterEvent {
        let Ok(radio_id) = control::parse_rptping(buf) else {
            return MasterEvent::None;
        };
        match self.peers.get_mut(&radio_id) {
            Some(peer) if peer.state == PeerState::Yes && peer.address == src => {
                peer.last_ping = now;
                peer.missed_pings = 0;
                MasterEvent::Reply(control::build_mstpong(radio_id))
            }
            _ => MasterEvent::None,
        }
    }

    fn handle_dmrd(&mut self, src: SocketAddr, buf: &[u8]) -> MasterEvent {
        let authenticated_peer_id = self
            .peers
            .values()
            .find(|p| p.state == PeerState::Yes && p.address == src)
            .map(|p| p.radio_id);
        let Some(peer_id) = authenticated_peer_id else {
            return MasterEvent::None;
        };

        let Ok((fields, payload)) = dmrd::parse(buf) else {
            return MasterEvent::None;
        };

        let repeat_to = if self.repeat {
            self.peers
                .values()
                .filter(|p| p.radio_id != peer_id && p.state == PeerState::Yes)
                .map(|p| p.address)
                .collect()
        } else {
            Vec::new()
        };

        MasterEvent::Dmrd {
            fields,
            payload,
            repeat_to,
        }
    }

    /// Remove every peer that has missed too many pings; returns the
    /// removed radio ids for logging by the caller.
    pub fn expire_peers(&mut self, now: Instant, ping_time: Duration, max_missed: u32) -> Vec<u32> {
        let max_silence = ping_time * max_missed;
        let expired: Vec<u32> = self
            .peers
            .values()
            .filter(|p| now.duration_since(p.last_ping) > max_silence)
            .map(|p| p.radio_id)
            .collect();
        for radio_id in &expired {
            self.peers.remove(radio_id);
        }
        expired
    }
}
