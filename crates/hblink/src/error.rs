// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Startup errors. Everything here is fatal: the process prints the error
//! and exits non-zero before any socket is opened.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rules file TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Config(#[from] hblink_core::ConfigError),

    #[error(transparent)]
    Monitor(#[from] hblink_monitor::MonitorError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
