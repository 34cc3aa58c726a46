// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control PDU parsing and construction.
//!
//! HBP control messages are `opcode|fields` with fixed-width binary fields
//! glued directly onto the opcode tag (no literal `|` byte on the wire; the
//! pipe notation in the protocol's own documentation is descriptive, not a
//! delimiter). Every field here is big-endian.

use crate::error::{WireError, WireResult};

const PEER_ID_LEN: usize = 4;
const HASH_LEN: usize = 32;

/// The fixed-width repeater self-description carried in `RPTC`.
pub const RPTC_DESC_LEN: usize = 8 + 9 + 9 + 2 + 2 + 8 + 9 + 3 + 20 + 19 + 1 + 124 + 40 + 40;

fn take<'a>(buf: &'a [u8], opcode: &'static str, offset: usize, len: usize) -> WireResult<&'a [u8]> {
    if buf.len() < offset + len {
        return Err(WireError::TruncatedPdu {
            opcode,
            expected: offset + len,
            actual: buf.len(),
        });
    }
    Ok(&buf[offset..offset + len])
}

/// `RPTL|peer_id`
pub fn parse_rptl(buf: &[u8]) -> WireResult<u32> {
    let field = take(buf, "RPTL", 4, PEER_ID_LEN)?;
    Ok(u32::from_be_bytes(field.try_into().unwrap()))
}

pub fn build_rptl(peer_id: u32) -> Vec<u8> {
    let mut out = b"RPTL".to_vec();
    out.extend_from_slice(&peer_id.to_be_bytes());
    out
}

/// `RPTACK|salt` (master -> peer, login) or `RPTACK|peer_id` (every other
/// handshake step). Both are a 4-byte big-endian field; callers interpret
/// the meaning based on which state they are in.
pub fn parse_rptack(buf: &[u8]) -> WireResult<u32> {
    let field = take(buf, "RPTACK", 6, PEER_ID_LEN)?;
    Ok(u32::from_be_bytes(field.try_into().unwrap()))
}

pub fn build_rptack(field: u32) -> Vec<u8> {
    let mut out = b"RPTACK".to_vec();
    out.extend_from_slice(&field.to_be_bytes());
    out
}

/// `RPTK|peer_id|hash`
pub fn parse_rptk(buf: &[u8]) -> WireResult<(u32, [u8; HASH_LEN])> {
    let peer_id = take(buf, "RPTK", 4, PEER_ID_LEN)?;
    let hash = take(buf, "RPTK", 4 + PEER_ID_LEN, HASH_LEN)?;
    Ok((
        u32::from_be_bytes(peer_id.try_into().unwrap()),
        hash.try_into().unwrap(),
    ))
}

pub fn build_rptk(peer_id: u32, hash: &[u8; HASH_LEN]) -> Vec<u8> {
    let mut out = b"RPTK".to_vec();
    out.extend_from_slice(&peer_id.to_be_bytes());
    out.extend_from_slice(hash);
    out
}

/// The repeater self-description carried by `RPTC`, as fixed-width ASCII
/// fields per the wire layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeaterDescription {
    pub callsign: [u8; 8],
    pub rx_freq: [u8; 9],
    pub tx_freq: [u8; 9],
    pub tx_power: [u8; 2],
    pub colour_code: [u8; 2],
    pub latitude: [u8; 8],
    pub longitude: [u8; 9],
    pub height: [u8; 3],
    pub location: [u8; 20],
    pub description: [u8; 19],
    pub slots: u8,
    pub url: [u8; 124],
    pub software_id: [u8; 40],
    pub package_id: [u8; 40],
}

/// `RPTC|peer_id|<self-description>`
pub fn parse_rptc(buf: &[u8]) -> WireResult<(u32, RepeaterDescription)> {
    let peer_id = take(buf, "RPTC", 4, PEER_ID_LEN)?;
    let body = take(buf, "RPTC", 4 + PEER_ID_LEN, RPTC_DESC_LEN)?;

    let mut off = 0;
    macro_rules! field {
        ($n:expr) => {{
            let s = &body[off..off + $n];
            off += $n;
            s
        }};
    }

    let callsign: [u8; 8] = field!(8).try_into().unwrap();
    let rx_freq: [u8; 9] = field!(9).try_into().unwrap();
    let tx_freq: [u8; 9] = field!(9).try_into().unwrap();
    let tx_power: [u8; 2] = field!(2).try_into().unwrap();
    let colour_code: [u8; 2] = field!(2).try_into().unwrap();
    let latitude: [u8; 8] = field!(8).try_into().unwrap();
    let longitude: [u8; 9] = field!(9).try_into().unwrap();
    let height: [u8; 3] = field!(3).try_into().unwrap();
    let location: [u8; 20] = field!(20).try_into().unwrap();
    let description: [u8; 19] = field!(19).try_into().unwrap();
    let slots = field!(1)[0];
    let url: [u8; 124] = field!(124).try_into().unwrap();
    let software_id: [u8; 40] = field!(40).try_into().unwrap();
    let package_id: [u8; 40] = field!(40).try_into().unwrap();

    Ok((
        u32::from_be_bytes(peer_id.try_into().unwrap()),
        RepeaterDescription {
            callsign,
            rx_freq,
            tx_freq,
            tx_power,
            colour_code,
            latitude,
            longitude,
            height,
            location,
            description,
            slots,
            url,
            software_id,
            package_id,
        },
    ))
}

pub fn build_rptc(peer_id: u32, desc: &RepeaterDescription) -> Vec<u8> {
    let mut out = b"RPTC".to_vec();
    out.extend_from_slice(&peer_id.to_be_bytes());
    out.extend_from_slice(&desc.callsign);
    out.extend_from_slice(&desc.rx_freq);
    out.extend_from_slice(&desc.tx_freq);
    out.extend_from_slice(&desc.tx_power);
    out.extend_from_slice(&desc.colour_code);
    out.extend_from_slice(&desc.latitude);
    out.extend_from_slice(&desc.longitude);
    out.extend_from_slice(&desc.height);
    out.extend_from_slice(&desc.location);
    out.extend_from_slice(&desc.description);
    out.push(desc.slots);
    out.extend_from_slice(&desc.url);
    out.extend_from_slice(&desc.software_id);
    out.extend_from_slice(&desc.package_id);
    out
}

/// `RPTCL|peer_id`
pub fn parse_rptcl(buf: &[u8]) -> WireResult<u32> {
    let field = take(buf, "RPTCL", 5, PEER_ID_LEN)?;
    Ok(u32::from_be_bytes(field.try_into().unwrap()))
}

pub fn build_rptcl(peer_id: u32) -> Vec<u8> {
    let mut out = b"RPTCL".to_vec();
    out.extend_from_slice(&peer_id.to_be_bytes());
    out
}

/// `RPTPING|peer_id`
pub fn parse_rptping(buf: &[u8]) -> WireResult<u32> {
    let field = take(buf, "RPTPING", 7, PEER_ID_LEN)?;
    Ok(u32::from_be_bytes(field.try_into().unwrap()))
}

pub fn build_rptping(peer_id: u32) -> Vec<u8> {
    let mut out = b"RPTPING".to_vec();
    out.extend_from_slice(&peer_id.to_be_bytes());
    out
}

/// `MSTPONG|peer_id`
pub fn parse_mstpong(buf: &[u8]) -> WireResult<u32> {
    let field = take(buf, "MSTPONG", 7, PEER_ID_LEN)?;
    Ok(u32::from_be_bytes(field.try_into().unwrap()))
}

pub fn build_mstpong(peer_id: u32) -> Vec<u8> {
    let mut out = b"MSTPONG".to_vec();
    out.extend_from_slice(&peer_id.to_be_bytes());
    out
}

/// `RPTO|peer_id|options` (options is a variable-length ASCII string).
pub fn parse_rpto(buf: &[u8]) -> WireResult<(u32, Vec<u8>)> {
    let peer_id = take(buf, "RPTO", 4, PEER_ID_LEN)?;
    let options = buf.get(4 + PEER_ID_LEN..).unwrap_or(&[]).to_vec();
    Ok((u32::from_be_bytes(peer_id.try_into().unwrap()), options))
}

pub fn build_rpto(peer_id: u32, options: &[u8]) -> Vec<u8> {
    let mut out = b"RPTO".to_vec();
    out.extend_from_slice(&peer_id.to_be_bytes());
    out.extend_from_slice(options);
    out
}

/// `MSTNAK|peer_id`
pub fn parse_mstnak(buf: &[u8]) -> WireResult<u32> {
    let field = take(buf, "MSTNAK", 6, PEER_ID_LEN)?;
    Ok(u32::from_be_bytes(field.try_into().unwrap()))
}

pub fn build_mstnak(peer_id: u32) -> Vec<u8> {
    let mut out = b"MSTNAK".to_vec();
    out.extend_from_slice(&peer_id.to_be_bytes());
    out
}

/// `MSTCL|peer_id` (server broadcast on shutdown)
pub fn parse_mstcl(buf: &[u8]) -> WireResult<u32> {
    let field = take(buf, "MSTCL", 5, PEER_ID_LEN)?;
    Ok(u32::from_be_bytes(field.try_into().unwrap()))
}

pub fn build_mstcl(peer_id: u32) -> Vec<u8> {
    let mut out = b"MSTCL".to_vec();
    out.extend_from_slice(&peer_id.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rptl_round_trips() {
        let pdu = build_rptl(0x2A);
        assert_eq!(parse_rptl(&pdu).unwrap(), 0x2A);
    }

    #[test]
    fn rptk_round_trips_with_hash() {
        let hash = [0x11u8; 32];
        let pdu = build_rptk(0x2A, &hash);
        let (peer_id, parsed_hash) = parse_rptk(&pdu).unwrap();
        assert_eq!(peer_id, 0x2A);
        assert_eq!(parsed_hash, hash);
    }

    #[test]
    fn rptc_round_trips_full_description() {
        let desc = RepeaterDescription {
            callsign: *b"W1AW0000",
            rx_freq: *b"449000000",
            tx_freq: *b"444000000",
            tx_power: *b"25",
            colour_code: *b"01",
            latitude: *b"41.71400",
            longitude: *b"-72.72700",
            height: *b"075",
            location: [b' '; 20],
            description: [b' '; 19],
            slots: 3,
            url: [b' '; 124],
            software_id: [b' '; 40],
            package_id: [b' '; 40],
        };
        let pdu = build_rptc(0x2A, &desc);
        let (peer_id, parsed) = parse_rptc(&pdu).unwrap();
        assert_eq!(peer_id, 0x2A);
        assert_eq!(parsed, desc);
    }

    #[test]
    fn rpto_carries_variable_length_options() {
        let pdu = build_rpto(0x2A, b"Interlink=1");
        let (peer_id, options) = parse_rpto(&pdu).unwrap();
        assert_eq!(peer_id, 0x2A);
        assert_eq!(options, b"Interlink=1");
    }

    #[test]
    fn short_pdus_are_rejected() {
        assert!(matches!(
            parse_rptl(b"RPTL"),
            Err(WireError::TruncatedPdu { opcode: "RPTL", .. })
        ));
        assert!(matches!(
            parse_rptk(b"RPTK|||"),
            Err(WireError::TruncatedPdu { opcode: "RPTK", .. })
        ));
    }

    #[test]
    fn ping_and_pong_round_trip() {
        let ping = build_rptping(7);
        assert_eq!(parse_rptping(&ping).unwrap(), 7);
        let pong = build_mstpong(7);
        assert_eq!(parse_mstpong(&pong).unwrap(), 7);
    }
}
