// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LC check-byte generation.
//!
//! Header and terminator LC is protected by a 3-byte systematic Reed-Solomon
//! parity (RS(12,9) over GF(2^8)); embedded LC is protected by a 5-bit CRC.
//! This module is the "external collaborator" described for this system:
//! callers only need `rs_header_encode`, `rs_terminator_encode`, and
//! `csum5`, not the GF(2^8) arithmetic backing them.

use crate::embedded_lc::Csum5;
use crate::{Lc, RsCheck};

const GF_POLY: u16 = 0x11d;

fn gf_tables() -> ([u8; 256], [u8; 256]) {
    let mut exp = [0u8; 256];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    for i in 0..255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= GF_POLY;
        }
    }
    exp[255] = exp[0];
    (exp, log)
}

fn gf_mul(exp: &[u8; 256], log: &[u8; 256], a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let sum = log[a as usize] as u16 + log[b as usize] as u16;
    exp[(sum % 255) as usize]
}

/// Generator polynomial `g(x) = (x + a^0)(x + a^1)(x + a^2) = x^3 + 7x^2 +
/// 14x + 8` for `a = 2` over GF(2^8), expanded by hand once and kept as
/// constants rather than recomputed per call.
const GENERATOR: [u8; 3] = [7, 14, 8];

/// Systematic RS(12,9) parity: 3 check bytes for a 9-byte message, computed
/// as the remainder of `message(x) * x^3` divided by [`GENERATOR`].
fn rs_parity(message: &[u8; 9]) -> RsCheck {
    let (exp, log) = gf_tables();
    let mut remainder = [0u8; 3];
    for &byte in message.iter() {
        let factor = byte ^ remainder[0];
        remainder[0] = remainder[1];
        remainder[1] = remainder[2];
        remainder[2] = 0;
        if factor != 0 {
            for i in 0..3 {
                remainder[i] ^= gf_mul(&exp, &log, factor, GENERATOR[i]);
            }
        }
    }
    remainder
}

/// Compute the 3-byte RS check for a voice-header LC.
pub fn rs_header_encode(lc: &Lc) -> RsCheck {
    rs_parity(lc)
}

/// Compute the 3-byte RS check for a voice-terminator LC.
///
/// Terminator LC uses the same systematic code as the header; DMR
/// distinguishes the two only by the frame's `dtype_vseq`, not by a
/// different check polynomial.
pub fn rs_terminator_encode(lc: &Lc) -> RsCheck {
    rs_parity(lc)
}

/// Compute the 5-bit CRC carried alongside embedded LC.
pub fn csum5(lc: &Lc) -> Csum5 {
    let folded = lc.iter().fold(0u8, |acc, b| acc ^ b);
    let mut bits = [false; 5];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (folded >> (7 - i)) & 1 == 1;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rs_header_is_deterministic() {
        let lc: Lc = [0x00, 0x10, 0x20, 0x00, 0x0c, 0x30, 0x2f, 0x9b, 0xe5];
        assert_eq!(rs_header_encode(&lc), rs_header_encode(&lc));
    }

    #[test]
    fn rs_check_reacts_to_every_byte() {
        let base: Lc = [0; 9];
        let base_check = rs_header_encode(&base);
        for i in 0..9 {
            let mut lc = base;
            lc[i] = 0xff;
            assert_ne!(rs_header_encode(&lc), base_check, "byte {i} has no effect on check");
        }
    }

    #[test]
    fn csum5_all_zero_is_zero() {
        assert_eq!(csum5(&[0; 9]), [false; 5]);
    }
}
