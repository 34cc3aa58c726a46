// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Authentication primitives: the repeater-dialect challenge hash, the
//! OpenBridge HMAC, and salt generation.

use ring::{digest, hmac};

/// `sha256(be32(salt) ‖ passphrase)`.
pub fn challenge_hash(salt: u32, passphrase: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(4 + passphrase.len());
    data.extend_from_slice(&salt.to_be_bytes());
    data.extend_from_slice(passphrase);
    let digest = digest::digest(&digest::SHA256, &data);
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_ref());
    out
}

/// Constant-time byte comparison; unequal lengths compare unequal without
/// leaking which byte differed.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && ring::constant_time::verify_slices_are_equal(a, b).is_ok()
}

/// HMAC-SHA1 over `data` under `key`, as used to authenticate OpenBridge
/// datagrams. DMR's HomeBrew Protocol predates HMAC-SHA1's deprecation for
/// new designs; this system interoperates with that existing wire format.
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> [u8; 20] {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key);
    let tag = hmac::sign(&key, data);
    let mut out = [0u8; 20];
    out.copy_from_slice(tag.as_ref());
    out
}

/// A fresh 32-bit login challenge salt.
pub fn random_salt() -> u32 {
    fastrand::u32(..)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_hash_is_deterministic() {
        assert_eq!(
            challenge_hash(0x1234, b"secret"),
            challenge_hash(0x1234, b"secret")
        );
    }

    #[test]
    fn challenge_hash_reacts_to_salt() {
        assert_ne!(challenge_hash(1, b"secret"), challenge_hash(2, b"secret"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatched_lengths() {
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2]));
    }

    #[test]
    fn hmac_sha1_round_trips_for_verification() {
        let tag = hmac_sha1(b"key", b"payload");
        assert_eq!(tag, hmac_sha1(b"key", b"payload"));
        assert_ne!(tag, hmac_sha1(b"key", b"other"));
    }
}
