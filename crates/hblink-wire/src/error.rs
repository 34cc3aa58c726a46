// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire parsing errors.

use thiserror::Error;

/// Errors that can occur while parsing an HBP datagram.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("datagram too short: {0} bytes")]
    TooShort(usize),

    #[error("unrecognized opcode {0:?}")]
    UnknownOpcode([u8; 4]),

    #[error("opcode {opcode} payload too short: expected at least {expected} bytes, got {actual}")]
    TruncatedPdu {
        opcode: &'static str,
        expected: usize,
        actual: usize,
    },
}

pub type WireResult<T> = Result<T, WireError>;
