// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PEER-role endpoint: the repeater-dialect outbound login/challenge/config
//! state machine, as seen from the repeater that dials in to a master.

use crate::crypto::challenge_hash;
use hblink_wire::control::{self, RepeaterDescription};
use hblink_wire::dmrd::{self, DmrdFields, PAYLOAD_LEN};
use hblink_wire::opcode::{self, Opcode};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfState {
    No,
    RptlSent,
    Authenticated,
    ConfigSent,
    OptionsSent,
    Yes,
}

pub enum PeerEvent {
    Send(Vec<u8>),
    Dmrd {
        fields: DmrdFields,
        payload: [u8; PAYLOAD_LEN],
    },
    None,
}

pub struct PeerEndpoint {
    pub name: String,
    pub radio_id: u32,
    passphrase: String,
    description: RepeaterDescription,
    options: Option<Vec<u8>>,
    loose_peer_id_check: bool,
    state: SelfState,
    outstanding_pings: u32,
}

impl PeerEndpoint {
    pub fn new(
        name: impl Into<String>,
        radio_id: u32,
        passphrase: impl Into<String>,
        description: RepeaterDescription,
        options: Option<Vec<u8>>,
        loose_peer_id_check: bool,
    ) -> Self {
        Self {
            name: name.into(),
            radio_id,
            passphrase: passphrase.into(),
            description,
            options,
            loose_peer_id_check,
            state: SelfState::No,
            outstanding_pings: 0,
        }
    }

    pub fn state(&self) -> SelfState {
        self.state
    }

    /// Maintenance tick: decide whether to (re)login or ping the master.
    pub fn tick(&mut self, max_missed: u32) -> Vec<u8> {
        if self.state != SelfState::Yes || self.outstanding_pings >= max_missed {
            self.outstanding_pings = 0;
            self.state = SelfState::RptlSent;
            control::build_rptl(self.radio_id)
        } else {
            self.outstanding_pings += 1;
            control::build_rptping(self.radio_id)
        }
    }

    fn accepts_peer_id(&self, candidate: u32) -> bool {
        self.loose_peer_id_check || candidate == self.radio_id
    }

    pub fn handle_datagram(&mut self, buf: &[u8]) -> PeerEvent {
        let Ok((op, _)) = opcode::detect(buf) else {
            return PeerEvent::None;
        };

        match op {
            Opcode::Rptack => self.handle_rptack(buf),
            Opcode::Mstpong => self.handle_mstpong(buf),
            Opcode::Mstnak | Opcode::Mstcl => {
                self.state = SelfState::No;
                PeerEvent::None
            }
            Opcode::Dmrd => self.handle_dmrd(buf),
            _ => PeerEvent::None,
        }
    }

    fn handle_rptack(&mut self, buf: &[u8]) -> PeerEvent {
        let Ok(field) = control::parse_rptack(buf) else {
            return PeerEvent::None;
        };

        match self.state {
            SelfState::RptlSent => {
                let salt = field;
                let hash = challenge_hash(salt, self.passphrase.as_bytes());
                self.state = SelfState::Authenticated;
                PeerEvent::Send(control::build_rptk(self.radio_id, &hash))
            }
            SelfState::Authenticated if self.accepts_peer_id(field) => {
                self.state = SelfState::ConfigSent;
                PeerEvent::Send(control::build_rptc(self.radio_id, &self.description))
            }
            SelfState::ConfigSent if self.accepts_peer_id(field) => {
                if let Some(options) = &self.options {
                    self.state = SelfState::OptionsSent;
                    PeerEvent::Send(control::build_rpto(self.radio_id, options))
                } else {
                    self.state = SelfState::Yes;
                    info!(radio_id = self.radio_id, "peer session up");
                    PeerEvent::None
                }
            }
            SelfState::OptionsSent if self.accepts_peer_id(field) => {
                self.state = SelfState::Yes;
                info!(radio_id = self.radio_id, "peer session up");
                PeerEvent::None
            }
            _ => PeerEvent::None,
        }
    }

    fn handle_mstpong(&mut self, buf: &[u8]) -> PeerEvent {
        if let Ok(field) = control::parse_mstpong(buf) {
            if self.accepts_peer_id(field) {
                self.outstanding_pings = 0;
            }
        }
        PeerEvent::None
    }

    fn handle_dmrd(&mut self, buf: &[u8]) -> PeerEvent {
        if self.state != SelfState::Yes {
            return PeerEvent::None;
        }
        match dmrd::parse(buf) {
            Ok((fields, payload)) => PeerEvent::Dmrd { fields, payload },
            Err(_) => PeerEvent::None,
        }
    }
}
