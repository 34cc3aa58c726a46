// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OPENBRIDGE-role endpoint: no handshake, HMAC-SHA1-authenticated DMRD
//! exchange with a single fixed peer.

use crate::crypto::{constant_time_eq, hmac_sha1};
use hblink_wire::dmrd::{self, DmrdFields, MASTER_PEER_LEN, OPENBRIDGE_LEN, PAYLOAD_LEN};
use std::net::SocketAddr;
use tracing::warn;

pub struct OpenBridgeEndpoint {
    pub name: String,
    pub network_id: u32,
    pub target_address: SocketAddr,
    hmac_key: Vec<u8>,
}

pub enum OpenBridgeEvent {
    Dmrd {
        fields: DmrdFields,
        payload: [u8; PAYLOAD_LEN],
    },
    /// Authentication failed or the source didn't match; drop silently.
    Dropped,
}

impl OpenBridgeEndpoint {
    pub fn new(name: impl Into<String>, network_id: u32, target_address: SocketAddr, hmac_key: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            network_id,
            target_address,
            hmac_key,
        }
    }

    pub fn handle_datagram(&self, src: SocketAddr, buf: &[u8]) -> OpenBridgeEvent {
        if src != self.target_address {
            return OpenBridgeEvent::Dropped;
        }
        if buf.len() != OPENBRIDGE_LEN {
            return OpenBridgeEvent::Dropped;
        }

        let (body, tag) = buf.split_at(MASTER_PEER_LEN);
        let expected = hmac_sha1(&self.hmac_key, body);
        if !constant_time_eq(&expected, tag) {
            warn!(name = %self.name, "OpenBridge HMAC mismatch, dropping");
            return OpenBridgeEvent::Dropped;
        }

        match dmrd::parse(body) {
            Ok((fields, payload)) => OpenBridgeEvent::Dmrd { fields, payload },
            Err(_) => OpenBridgeEvent::Dropped,
        }
    }

    /// Build the authenticated 73-byte outbound datagram for this target.
    pub fn build_outgoing(&self, fields: &DmrdFields, payload: &[u8; PAYLOAD_LEN]) -> Vec<u8> {
        let body = dmrd::build(fields, payload);
        let tag = hmac_sha1(&self.hmac_key, &body);
        let mut out = Vec::with_capacity(OPENBRIDGE_LEN);
        out.extend_from_slice(&body);
        out.extend_from_slice(&tag);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hblink_wire::dmrd::{CallType, FrameType, Slot};

    fn target() -> SocketAddr {
        "10.0.0.1:62044".parse().unwrap()
    }

    fn sample_fields() -> DmrdFields {
        DmrdFields {
            sequence: 1,
            rf_src: 0x00102A,
            dst_id: 0x000C30,
            peer_id: 1,
            slot: Slot::Ts1,
            call_type: CallType::Group,
            frame_type: FrameType::Voice,
            dtype_vseq: 0,
            stream_id: 1,
        }
    }

    #[test]
    fn round_trips_an_authenticated_datagram() {
        let endpoint = OpenBridgeEndpoint::new("OB1", 1, target(), b"key".to_vec());
        let datagram = endpoint.build_outgoing(&sample_fields(), &[0xAB; PAYLOAD_LEN]);
        assert_eq!(datagram.len(), OPENBRIDGE_LEN);

        match endpoint.handle_datagram(target(), &datagram) {
            OpenBridgeEvent::Dmrd { fields, payload } => {
                assert_eq!(fields, sample_fields());
                assert_eq!(payload, [0xAB; PAYLOAD_LEN]);
            }
            OpenBridgeEvent::Dropped => panic!("expected a valid DMRD"),
        }
    }

    #[test]
    fn wrong_source_address_is_dropped() {
        let endpoint = OpenBridgeEndpoint::new("OB1", 1, target(), b"key".to_vec());
        let datagram = endpoint.build_outgoing(&sample_fields(), &[0u8; PAYLOAD_LEN]);
        let other: SocketAddr = "10.0.0.2:1".parse().unwrap();
        assert!(matches!(
            endpoint.handle_datagram(other, &datagram),
            OpenBridgeEvent::Dropped
        ));
    }

    #[test]
    fn tampered_body_fails_hmac_check() {
        let endpoint = OpenBridgeEndpoint::new("OB1", 1, target(), b"key".to_vec());
        let mut datagram = endpoint.build_outgoing(&sample_fields(), &[0u8; PAYLOAD_LEN]);
        datagram[10] ^= 0xff;
        assert!(matches!(
            endpoint.handle_datagram(target(), &datagram),
            OpenBridgeEvent::Dropped
        ));
    }
}
