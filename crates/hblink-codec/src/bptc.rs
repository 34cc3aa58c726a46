// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! BPTC(196,96) block product turbo code used to carry full-rate link
//! control (header and terminator LC) across the DMR voice frame.
//!
//! Encoding builds the full row/column Hamming matrix and interleaves it.
//! Decoding is the "fast path" described for this system: only the 72 LC
//! data bits are extracted from their fixed positions, parity is never
//! checked. Both directions are pure, total, and allocation-free.

use crate::hamming;
use crate::{Lc, RsCheck};

/// A BPTC(196,96) matrix, one bit per `bool`, in on-air (interleaved) order.
pub type Bptc196 = [bool; 196];

/// Fixed bit-interleaver: `INTERLEAVE[i] = i * 181 mod 196`.
const INTERLEAVE: [usize; 196] = build_interleave_table();

const fn build_interleave_table() -> [usize; 196] {
    let mut table = [0usize; 196];
    let mut i = 0;
    while i < 196 {
        table[i] = (i * 181) % 196;
        i += 1;
    }
    table
}

/// Positions (in de-interleaved row/column order) of the 72 LC data bits,
/// in LC bit order (MSB of byte 0 first).
const LC_BIT_POSITIONS: [usize; 72] = [
    136, 121, 106, 91, 76, 61, 46, 31, //
    152, 137, 122, 107, 92, 77, 62, 47, 32, 17, 2, //
    123, 108, 93, 78, 63, 48, 33, 18, 3, 184, 169, //
    94, 79, 64, 49, 34, 19, 4, 185, 170, 155, 140, //
    65, 50, 35, 20, 5, 186, 171, 156, 141, 126, 111, //
    36, 21, 6, 187, 172, 157, 142, 127, 112, 97, 82, //
    7, 188, 173, 158, 143, 128, 113, 98, 83,
];

fn byte_bit(bytes: &[u8], i: usize) -> bool {
    (bytes[i / 8] >> (7 - (i % 8))) & 1 == 1
}

/// Encode a 9-byte LC plus its 3-byte RS(12,9) check into an interleaved
/// BPTC(196,96) matrix.
pub fn encode(lc: &Lc, check: &RsCheck) -> Bptc196 {
    let mut data96 = [false; 96];
    let mut combined = [0u8; 12];
    combined[..9].copy_from_slice(lc);
    combined[9..].copy_from_slice(check);
    for (i, bit) in data96.iter_mut().enumerate() {
        *bit = byte_bit(&combined, i);
    }

    // R1..R3 reserved zero bits feed row 0 alongside the first 8 data bits;
    // R0 remains a standalone pad bit at position 0.
    let mut stream = [false; 99];
    stream[3..].copy_from_slice(&data96);

    let mut matrix = [false; 196];
    // matrix[0] stays false: R0 pad.
    let mut pos = 1;
    for k in 0..9 {
        let row: [bool; 11] = stream[k * 11..k * 11 + 11].try_into().unwrap();
        let parity = hamming::row_15_11(&row);
        matrix[pos..pos + 11].copy_from_slice(&row);
        matrix[pos + 11..pos + 15].copy_from_slice(&parity);
        pos += 15;
    }
    debug_assert_eq!(pos, 136);

    for col in 0..15 {
        let mut column = [false; 9];
        for (r, slot) in column.iter_mut().enumerate() {
            *slot = matrix[1 + col + 15 * r];
        }
        let parity = hamming::column_13_9(&column);
        for (p, bit) in parity.iter().enumerate() {
            matrix[136 + col + 15 * p] = *bit;
        }
    }

    let mut interleaved = [false; 196];
    for (i, bit) in matrix.iter().enumerate() {
        interleaved[INTERLEAVE[i]] = *bit;
    }
    interleaved
}

/// Extract the 9-byte LC from an interleaved BPTC(196,96) matrix without
/// validating any Hamming parity (fast decode path).
pub fn decode_lc(interleaved: &Bptc196) -> Lc {
    let mut deinterleaved = [false; 196];
    for (i, slot) in deinterleaved.iter_mut().enumerate() {
        *slot = interleaved[INTERLEAVE[i]];
    }

    let mut lc = [0u8; 9];
    for (i, &pos) in LC_BIT_POSITIONS.iter().enumerate() {
        if deinterleaved[pos] {
            lc[i / 8] |= 1 << (7 - (i % 8));
        }
    }
    lc
}
