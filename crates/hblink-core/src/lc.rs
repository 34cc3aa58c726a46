// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Link-control helpers shared by the tracker and router: late-entry
//! synthesis and the three cached encodings (header, terminator, embedded)
//! derived from a 9-byte LC.

use hblink_codec::{encode_embedded_lc, encode_header_lc, encode_terminator_lc, Bptc196, EmbBurst, Lc};

/// Fixed 3-byte option prefix used when synthesising a late-entry LC: group
/// voice, standard service options, no GPS/reserved bits set.
pub const LC_OPT: [u8; 3] = [0x00, 0x00, 0x00];

/// Build an LC word from a 24-bit talkgroup and a 24-bit source radio id.
/// Used when a stream's voice header was never seen and the first usable
/// burst has to carry a synthesised link-control word instead.
pub fn late_entry_lc(dst_id: u32, rf_src: u32) -> Lc {
    let mut lc = [0u8; 9];
    lc[0..3].copy_from_slice(&LC_OPT);
    lc[3] = (dst_id >> 16) as u8;
    lc[4] = (dst_id >> 8) as u8;
    lc[5] = dst_id as u8;
    lc[6] = (rf_src >> 16) as u8;
    lc[7] = (rf_src >> 8) as u8;
    lc[8] = rf_src as u8;
    lc
}

/// Build an LC word that keeps an existing LC's option/flag byte(s) but
/// replaces destination and source, per the router's "destination LC" rule
/// (`RX_LC[0..2] ‖ t.tgid ‖ rf_src`).
pub fn retarget_lc(source_lc: &Lc, dst_id: u32, rf_src: u32) -> Lc {
    let mut lc = [0u8; 9];
    lc[0..3].copy_from_slice(&source_lc[0..3]);
    lc[3] = (dst_id >> 16) as u8;
    lc[4] = (dst_id >> 8) as u8;
    lc[5] = dst_id as u8;
    lc[6] = (rf_src >> 16) as u8;
    lc[7] = (rf_src >> 8) as u8;
    lc[8] = rf_src as u8;
    lc
}

/// The three cached BPTC/embedded encodings derived from one LC word, kept
/// alongside a tracked stream so the router never re-runs the codec per
/// burst.
#[derive(Debug, Clone)]
pub struct CachedLc {
    pub lc: Lc,
    pub header: Bptc196,
    pub terminator: Bptc196,
    pub embedded: [EmbBurst; 4],
}

impl CachedLc {
    pub fn derive(lc: Lc) -> Self {
        Self {
            header: encode_header_lc(&lc),
            terminator: encode_terminator_lc(&lc),
            embedded: encode_embedded_lc(&lc),
            lc,
        }
    }
}
