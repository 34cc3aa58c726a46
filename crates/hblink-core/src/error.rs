// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core error types.

use thiserror::Error;

/// Errors surfaced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("bridge {bridge:?} references unknown endpoint {endpoint:?}")]
    UnknownEndpoint { bridge: String, endpoint: String },
}

/// Errors that can occur while an endpoint or the router is running.
///
/// Per the error-handling design, nothing here is fatal after startup; these
/// are logged and the offending packet or peer is dropped.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("wire error: {0}")]
    Wire(#[from] hblink_wire::WireError),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown peer {0:#010x}")]
    UnknownPeer(u32),

    #[error("authentication failed for peer {0:#010x}")]
    AuthFailed(u32),
}
