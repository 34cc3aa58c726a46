// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HBP opcode detection.
//!
//! Opcodes are variable-length ASCII prefixes, not a fixed 4-byte tag, so
//! detection must try the longest known prefixes first (`RPTCL` must not be
//! mistaken for `RPTC`).

use crate::error::{WireError, WireResult};

/// Every control and data opcode this system understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Dmrd,
    Rptl,
    Rptk,
    Rptc,
    Rptcl,
    RptPing,
    Rpto,
    Rptack,
    Mstnak,
    Mstpong,
    Mstcl,
}

impl Opcode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dmrd => "DMRD",
            Self::Rptl => "RPTL",
            Self::Rptk => "RPTK",
            Self::Rptc => "RPTC",
            Self::Rptcl => "RPTCL",
            Self::RptPing => "RPTPING",
            Self::Rpto => "RPTO",
            Self::Rptack => "RPTACK",
            Self::Mstnak => "MSTNAK",
            Self::Mstpong => "MSTPONG",
            Self::Mstcl => "MSTCL",
        }
    }

    fn tag(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

/// Opcodes ordered so that every prefix collision (`RPTC`/`RPTCL`) is
/// resolved by trying the longer tag first.
const ALL: [Opcode; 11] = [
    Opcode::RptPing,
    Opcode::Mstpong,
    Opcode::Rptack,
    Opcode::Mstnak,
    Opcode::Rptcl,
    Opcode::Mstcl,
    Opcode::Dmrd,
    Opcode::Rptl,
    Opcode::Rptk,
    Opcode::Rptc,
    Opcode::Rpto,
];

/// Detect the opcode prefixing a datagram, returning the opcode and the
/// number of bytes its tag occupies.
pub fn detect(buf: &[u8]) -> WireResult<(Opcode, usize)> {
    for op in ALL {
        let tag = op.tag();
        if buf.len() >= tag.len() && &buf[..tag.len()] == tag {
            return Ok((op, tag.len()));
        }
    }
    let mut prefix = [0u8; 4];
    let n = buf.len().min(4);
    prefix[..n].copy_from_slice(&buf[..n]);
    if buf.len() < 4 {
        return Err(WireError::TooShort(buf.len()));
    }
    Err(WireError::UnknownOpcode(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinguishes_rptc_from_rptcl() {
        let (op, len) = detect(b"RPTC|whatever").unwrap();
        assert_eq!(op, Opcode::Rptc);
        assert_eq!(len, 4);

        let (op, len) = detect(b"RPTCL|whatever").unwrap();
        assert_eq!(op, Opcode::Rptcl);
        assert_eq!(len, 5);
    }

    #[test]
    fn detects_dmrd() {
        let (op, len) = detect(b"DMRD|rest").unwrap();
        assert_eq!(op, Opcode::Dmrd);
        assert_eq!(len, 4);
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        assert!(detect(b"ZZZZblah").is_err());
    }

    #[test]
    fn too_short_is_an_error() {
        assert_eq!(detect(b"AB"), Err(WireError::TooShort(2)));
    }
}
