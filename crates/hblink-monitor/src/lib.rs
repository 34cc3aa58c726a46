// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Netstring-framed TCP monitor sink. Publishes configuration and bridge
//! snapshots and per-call lifecycle events to any number of connected
//! observers; accepts `CONFIG_REQ` from clients as a request to replay the
//! current configuration snapshot.

pub mod message;
pub mod netstring;
pub mod server;

pub use message::{BridgeSnapshot, CallEvent, ConfigSnapshot, EndpointSnapshot, MembershipSnapshot, MonitorMessage, NamedBridgeSnapshot};
pub use server::{MonitorError, MonitorHandle, MonitorServer};
