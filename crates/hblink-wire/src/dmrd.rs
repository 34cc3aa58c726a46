// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DMRD datagram parsing and construction.
//!
//! ```text
//! offset  len  field
//! 0       4    "DMRD"
//! 4       1    sequence
//! 5       3    rf_src        (24-bit BE radio id)
//! 8       3    dst_id        (24-bit BE talkgroup/unit id)
//! 11      4    peer_id       (32-bit BE)
//! 15      1    slot/call_type/frame_type/dtype_vseq, bit-packed
//! 16      4    stream_id     (32-bit BE)
//! 20      33   DMR payload (BPTC-interleaved, packed)
//! 53      20   (OpenBridge only) HMAC-SHA1 of bytes 0..53
//! ```

use crate::error::{WireError, WireResult};

pub const MASTER_PEER_LEN: usize = 53;
pub const OPENBRIDGE_LEN: usize = 73;
pub const PAYLOAD_LEN: usize = 33;

/// DMR time-slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Ts1,
    Ts2,
}

impl Slot {
    fn from_bit(bit: bool) -> Self {
        if bit {
            Self::Ts2
        } else {
            Self::Ts1
        }
    }

    fn to_bit(self) -> bool {
        matches!(self, Self::Ts2)
    }

    /// The other slot; used nowhere in arbitration logic but convenient for
    /// tests and for slot-crossing rewrites.
    pub fn other(self) -> Self {
        match self {
            Self::Ts1 => Self::Ts2,
            Self::Ts2 => Self::Ts1,
        }
    }
}

/// Group-addressed or unit-addressed (private) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Group,
    Unit,
}

impl CallType {
    fn from_bit(bit: bool) -> Self {
        if bit {
            Self::Unit
        } else {
            Self::Group
        }
    }

    fn to_bit(self) -> bool {
        matches!(self, Self::Unit)
    }
}

/// The two-bit frame-type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Voice,
    VoiceSync,
    DataSync,
}

impl FrameType {
    fn from_bits(bits: u8) -> WireResult<Self> {
        match bits {
            0b00 => Ok(Self::Voice),
            0b01 => Ok(Self::VoiceSync),
            0b10 => Ok(Self::DataSync),
            other => Err(WireError::TruncatedPdu {
                opcode: "DMRD",
                expected: other as usize,
                actual: 0,
            }),
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            Self::Voice => 0b00,
            Self::VoiceSync => 0b01,
            Self::DataSync => 0b10,
        }
    }
}

/// `dtype_vseq` values meaningful for `data_sync` frames.
pub const VOICE_HEADER: u8 = 1;
pub const VOICE_TERMINATOR: u8 = 2;

/// The decoded, non-payload fields of a DMRD datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmrdFields {
    pub sequence: u8,
    pub rf_src: u32,
    pub dst_id: u32,
    pub peer_id: u32,
    pub slot: Slot,
    pub call_type: CallType,
    pub frame_type: FrameType,
    pub dtype_vseq: u8,
    pub stream_id: u32,
}

fn read_u24(buf: &[u8]) -> u32 {
    (buf[0] as u32) << 16 | (buf[1] as u32) << 8 | buf[2] as u32
}

fn write_u24(v: u32, out: &mut [u8]) {
    out[0] = (v >> 16) as u8;
    out[1] = (v >> 8) as u8;
    out[2] = v as u8;
}

/// Parse a DMRD datagram's fixed header, returning the decoded fields and a
/// copy of the 33-byte payload. Accepts either the 53-byte repeater-dialect
/// length or the 73-byte OpenBridge length (the trailing HMAC is ignored
/// here; endpoints verify it before calling this).
pub fn parse(buf: &[u8]) -> WireResult<(DmrdFields, [u8; PAYLOAD_LEN])> {
    if buf.len() < MASTER_PEER_LEN {
        return Err(WireError::TruncatedPdu {
            opcode: "DMRD",
            expected: MASTER_PEER_LEN,
            actual: buf.len(),
        });
    }
    if &buf[0..4] != b"DMRD" {
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&buf[0..4]);
        return Err(WireError::UnknownOpcode(prefix));
    }

    let bits = buf[15];
    let slot = Slot::from_bit(bits & 0x80 != 0);
    let call_type = CallType::from_bit(bits & 0x40 != 0);
    let frame_type = FrameType::from_bits((bits >> 4) & 0x03)?;
    let dtype_vseq = bits & 0x0f;

    let fields = DmrdFields {
        sequence: buf[4],
        rf_src: read_u24(&buf[5..8]),
        dst_id: read_u24(&buf[8..11]),
        peer_id: u32::from_be_bytes([buf[11], buf[12], buf[13], buf[14]]),
        slot,
        call_type,
        frame_type,
        dtype_vseq,
        stream_id: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
    };

    let mut payload = [0u8; PAYLOAD_LEN];
    payload.copy_from_slice(&buf[20..53]);
    Ok((fields, payload))
}

/// Build a 53-byte repeater-dialect DMRD datagram.
pub fn build(fields: &DmrdFields, payload: &[u8; PAYLOAD_LEN]) -> [u8; MASTER_PEER_LEN] {
    let mut out = [0u8; MASTER_PEER_LEN];
    out[0..4].copy_from_slice(b"DMRD");
    out[4] = fields.sequence;
    write_u24(fields.rf_src, &mut out[5..8]);
    write_u24(fields.dst_id, &mut out[8..11]);
    out[11..15].copy_from_slice(&fields.peer_id.to_be_bytes());

    let mut bits = fields.dtype_vseq & 0x0f;
    bits |= fields.frame_type.to_bits() << 4;
    if fields.call_type.to_bit() {
        bits |= 0x40;
    }
    if fields.slot.to_bit() {
        bits |= 0x80;
    }
    out[15] = bits;

    out[16..20].copy_from_slice(&fields.stream_id.to_be_bytes());
    out[20..53].copy_from_slice(payload);
    out
}

/// Rewrite the header of a forwarded frame in place: substitute the
/// destination talkgroup, optionally flip the slot bit, and leave
/// sequence/rf_src/peer_id/stream_id untouched. This mirrors the router's
/// byte-copy-and-substitute table: bytes 0..8 and 11..15 and 16..20 pass
/// through; only bytes 8..11 (dst_id) and byte 15's slot bit change.
pub fn rewrite_for_target(
    fields: &DmrdFields,
    new_dst_id: u32,
    flip_slot: bool,
) -> DmrdFields {
    DmrdFields {
        dst_id: new_dst_id,
        slot: if flip_slot { fields.slot.other() } else { fields.slot },
        ..*fields
    }
}

/// Clear the slot bit, as required when forwarding to an OpenBridge target
/// (OpenBridge has no time-slot concept).
pub fn rewrite_for_openbridge(fields: &DmrdFields, new_dst_id: u32) -> DmrdFields {
    DmrdFields {
        dst_id: new_dst_id,
        slot: Slot::Ts1,
        ..*fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> DmrdFields {
        DmrdFields {
            sequence: 7,
            rf_src: 0x00102A,
            dst_id: 0x000C30,
            peer_id: 0x0000002A,
            slot: Slot::Ts1,
            call_type: CallType::Group,
            frame_type: FrameType::DataSync,
            dtype_vseq: VOICE_HEADER,
            stream_id: 0xDEADBEEF,
        }
    }

    #[test]
    fn round_trips_through_build_and_parse() {
        let fields = sample_fields();
        let payload = [0x42u8; PAYLOAD_LEN];
        let datagram = build(&fields, &payload);
        let (parsed, parsed_payload) = parse(&datagram).unwrap();
        assert_eq!(parsed, fields);
        assert_eq!(parsed_payload, payload);
    }

    #[test]
    fn rejects_short_buffers() {
        let err = parse(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, WireError::TruncatedPdu { .. }));
    }

    #[test]
    fn rejects_wrong_opcode() {
        let mut datagram = build(&sample_fields(), &[0u8; PAYLOAD_LEN]);
        datagram[0] = b'X';
        assert!(matches!(parse(&datagram), Err(WireError::UnknownOpcode(_))));
    }

    #[test]
    fn dst_id_rewrite_preserves_every_other_field() {
        let fields = sample_fields();
        let rewritten = rewrite_for_target(&fields, 3120, false);
        assert_eq!(rewritten.dst_id, 3120);
        assert_eq!(rewritten.slot, fields.slot);
        assert_eq!(rewritten.stream_id, fields.stream_id);
        assert_eq!(rewritten.peer_id, fields.peer_id);
    }

    #[test]
    fn slot_flip_crosses_timeslots() {
        let fields = sample_fields();
        let rewritten = rewrite_for_target(&fields, fields.dst_id, true);
        assert_eq!(rewritten.slot, Slot::Ts2);
    }

    #[test]
    fn openbridge_rewrite_always_clears_slot_bit() {
        let mut fields = sample_fields();
        fields.slot = Slot::Ts2;
        let rewritten = rewrite_for_openbridge(&fields, 9);
        assert_eq!(rewritten.slot, Slot::Ts1);
        assert_eq!(rewritten.dst_id, 9);
    }

    #[test]
    fn bit_packing_matches_the_documented_layout() {
        let mut fields = sample_fields();
        fields.slot = Slot::Ts2;
        fields.call_type = CallType::Unit;
        fields.frame_type = FrameType::VoiceSync;
        fields.dtype_vseq = 5;
        let datagram = build(&fields, &[0u8; PAYLOAD_LEN]);
        assert_eq!(datagram[15], 0b1101_0101);
    }
}
