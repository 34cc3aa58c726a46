// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint handles.
//!
//! The router needs to dispatch to any endpoint; each endpoint needs to
//! invoke the router on receive. Rather than give the router a mutable
//! reference into every endpoint's tracker (a cyclic borrow no single
//! owner can hold), each endpoint is reached through a name-keyed map of
//! thin interfaces: `send_system` to hand it an outbound datagram, and a
//! read-only snapshot of its tracker for contention arbitration. Each
//! endpoint otherwise retains sole ownership of its own state.

pub mod master;
pub mod openbridge;
pub mod peer;

use crate::crypto::hmac_sha1;
use crate::tracker::{OpenBridgeTracker, RepeaterTracker};
use hblink_wire::dmrd::{self, DmrdFields, PAYLOAD_LEN};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// An endpoint's tracker, reachable for read-mostly contention checks
/// without giving the router ownership of it.
#[derive(Clone)]
pub enum TrackerHandle {
    Repeater(Arc<RwLock<RepeaterTracker>>),
    OpenBridge(Arc<RwLock<OpenBridgeTracker>>),
}

/// What the router needs to reach one endpoint: a mailbox for outbound
/// datagrams and a handle to its tracker. `hmac_key` is `Some` only for
/// OpenBridge targets, which need a fresh authentication tag appended to
/// every outgoing frame.
#[derive(Clone)]
pub struct EndpointHandle {
    name: String,
    outbound: mpsc::Sender<Vec<u8>>,
    tracker: TrackerHandle,
    hmac_key: Option<Vec<u8>>,
    group_hangtime: std::time::Duration,
}

impl EndpointHandle {
    pub fn new(name: impl Into<String>, outbound: mpsc::Sender<Vec<u8>>, tracker: TrackerHandle) -> Self {
        Self {
            name: name.into(),
            outbound,
            tracker,
            hmac_key: None,
            group_hangtime: std::time::Duration::from_secs(5),
        }
    }

    pub fn with_hmac_key(mut self, key: Vec<u8>) -> Self {
        self.hmac_key = Some(key);
        self
    }

    pub fn with_group_hangtime(mut self, hangtime: std::time::Duration) -> Self {
        self.group_hangtime = hangtime;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracker(&self) -> &TrackerHandle {
        &self.tracker
    }

    pub fn group_hangtime(&self) -> std::time::Duration {
        self.group_hangtime
    }

    /// Hand a fully-built outbound datagram to the endpoint's own send
    /// loop. Never blocks the router on a slow or wedged endpoint for long:
    /// the mailbox has bounded capacity and a full mailbox simply drops the
    /// packet, matching the UDP-loss-is-expected error model.
    pub async fn send_system(&self, datagram: Vec<u8>) -> bool {
        self.outbound.try_send(datagram).is_ok()
    }

    /// Build and hand off a DMRD datagram, appending a fresh HMAC-SHA1 tag
    /// when this handle targets an OpenBridge endpoint.
    pub async fn send_dmrd(&self, fields: &DmrdFields, payload: &[u8; PAYLOAD_LEN]) -> bool {
        let body = dmrd::build(fields, payload);
        let datagram = match &self.hmac_key {
            Some(key) => {
                let tag = hmac_sha1(key, &body);
                let mut out = Vec::with_capacity(body.len() + tag.len());
                out.extend_from_slice(&body);
                out.extend_from_slice(&tag);
                out
            }
            None => body.to_vec(),
        };
        self.send_system(datagram).await
    }
}

/// Name -> interface map, built once every configured endpoint exists.
#[derive(Clone, Default)]
pub struct EndpointRegistry {
    handles: HashMap<String, EndpointHandle>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: EndpointHandle) {
        self.handles.insert(handle.name().to_string(), handle);
    }

    pub fn get(&self, name: &str) -> Option<&EndpointHandle> {
        self.handles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_looks_up_by_name() {
        let mut registry = EndpointRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        let tracker = TrackerHandle::Repeater(Arc::new(RwLock::new(RepeaterTracker::new())));
        registry.insert(EndpointHandle::new("A", tx, tracker));

        let handle = registry.get("A").expect("endpoint A registered");
        assert!(handle.send_system(vec![1, 2, 3]).await);
        assert_eq!(rx.recv().await, Some(vec![1, 2, 3]));
        assert!(registry.get("B").is_none());
    }
}
