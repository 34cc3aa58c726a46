// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-endpoint forwarding.
//!
//! Group-voice traffic received on one endpoint is forwarded to every other
//! active membership sharing its bridge. Forwarding to a repeater-dialect
//! target is gated by per-slot contention arbitration against that target's
//! own tracker; forwarding to an OpenBridge target only needs a cached LC for
//! the stream. Both paths rewrite the DMR payload's LC-bearing bits in place
//! and hand the result to [`EndpointHandle::send_dmrd`], which decides
//! whether the outgoing frame needs an HMAC tag.

use crate::bridge::BridgeTable;
use crate::endpoint::{EndpointHandle, EndpointRegistry, TrackerHandle};
use crate::lc::{retarget_lc, CachedLc};
use crate::tracker::{OpenBridgeTracker, RepeaterTracker, StreamEntry};
use hblink_codec::Lc;
use hblink_wire::dmrd::{self, DmrdFields, FrameType, Slot, PAYLOAD_LEN, VOICE_HEADER, VOICE_TERMINATOR};
use hblink_wire::payload;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

/// Copy `original` and splice in whichever LC-bearing bits `fields`
/// indicates this burst carries. Non-LC-bearing bursts pass through
/// untouched.
fn rewrite_payload(original: &[u8; PAYLOAD_LEN], fields: &DmrdFields, cached: &CachedLc) -> [u8; PAYLOAD_LEN] {
    let mut out = *original;
    match fields.frame_type {
        FrameType::DataSync if fields.dtype_vseq == VOICE_HEADER => {
            payload::splice_full_lc(&mut out, &cached.header);
        }
        FrameType::DataSync if fields.dtype_vseq == VOICE_TERMINATOR => {
            payload::splice_full_lc(&mut out, &cached.terminator);
        }
        _ if (1..=4).contains(&fields.dtype_vseq) => {
            payload::splice_embedded_lc(&mut out, &cached.embedded[(fields.dtype_vseq - 1) as usize]);
        }
        _ => {}
    }
    out
}

/// Cross-endpoint router. Holds the bridge table (membership/trigger state)
/// and the registry of reachable endpoints; owns neither endpoint's
/// connection state.
pub struct Router {
    bridges: BridgeTable,
    endpoints: EndpointRegistry,
    stream_timeout: Duration,
}

impl Router {
    pub fn new(bridges: BridgeTable, endpoints: EndpointRegistry, stream_timeout: Duration) -> Self {
        Self {
            bridges,
            endpoints,
            stream_timeout,
        }
    }

    pub fn bridges(&self) -> &BridgeTable {
        &self.bridges
    }

    pub fn bridges_mut(&mut self) -> &mut BridgeTable {
        &mut self.bridges
    }

    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    pub fn endpoints_mut(&mut self) -> &mut EndpointRegistry {
        &mut self.endpoints
    }

    pub fn arm_bridges(&mut self, now: Instant) {
        self.bridges.arm(now);
    }

    pub fn rule_timer_tick(&mut self, now: Instant) {
        self.bridges.rule_timer_tick(now);
    }

    pub fn on_voice_terminator(&mut self, endpoint: &str, slot: Slot, dst_id: u32, now: Instant) {
        self.bridges.on_voice_terminator(endpoint, slot, dst_id, now);
    }

    /// Forward one incoming group-voice burst to every other active
    /// membership on `src_endpoint`'s bridge(s). `rx_lc` is the LC the
    /// source endpoint's own tracker resolved for this stream (from the
    /// voice header, or synthesised for late entry).
    pub async fn route_group_voice(
        &self,
        src_endpoint: &str,
        fields: &DmrdFields,
        payload_bytes: &[u8; PAYLOAD_LEN],
        rx_lc: Lc,
        now: Instant,
    ) {
        let targets: Vec<(String, Slot, u32)> = self
            .bridges
            .targets_for(src_endpoint, fields.slot, fields.dst_id)
            .into_iter()
            .map(|(_, m)| (m.endpoint.clone(), m.slot, m.talkgroup))
            .collect();

        for (target_name, target_slot, target_tgid) in targets {
            let Some(handle) = self.endpoints.get(&target_name) else {
                continue;
            };

            match handle.tracker().clone() {
                TrackerHandle::OpenBridge(tracker) => {
                    self.forward_to_openbridge(handle, &tracker, fields, payload_bytes, rx_lc, target_tgid, now)
                        .await;
                }
                TrackerHandle::Repeater(tracker) => {
                    self.forward_to_master(
                        handle,
                        &tracker,
                        fields,
                        payload_bytes,
                        rx_lc,
                        src_endpoint,
                        target_slot,
                        target_tgid,
                        now,
                    )
                    .await;
                }
            }
        }
    }

    async fn forward_to_openbridge(
        &self,
        handle: &EndpointHandle,
        tracker: &Arc<RwLock<OpenBridgeTracker>>,
        fields: &DmrdFields,
        payload_bytes: &[u8; PAYLOAD_LEN],
        rx_lc: Lc,
        target_tgid: u32,
        now: Instant,
    ) {
        let cached = {
            let mut guard = tracker.write().await;
            let entry = guard.get_or_insert_with(fields.stream_id, || {
                let lc = retarget_lc(&rx_lc, target_tgid, fields.rf_src);
                StreamEntry {
                    start: now,
                    last_seen: now,
                    rf_src: fields.rf_src,
                    talkgroup: target_tgid,
                    cached_lc: CachedLc::derive(lc),
                }
            });
            let cached = entry.cached_lc.clone();
            guard.touch(fields.stream_id, now);
            cached
        };

        let new_fields = dmrd::rewrite_for_openbridge(fields, target_tgid);
        let new_payload = rewrite_payload(payload_bytes, fields, &cached);
        handle.send_dmrd(&new_fields, &new_payload).await;
    }

    /// Apply the target's per-slot contention rules, then forward. A target
    /// slot already carrying a different talkgroup's live RX or TX within
    /// group-hangtime rejects the new stream; a live retransmission of the
    /// same stream from a different source on the same talkgroup is also
    /// rejected. Accepted streams update the target's TX state and, on
    /// stream/source/talkgroup change, re-derive the cached LC.
    #[allow(clippy::too_many_arguments)]
    async fn forward_to_master(
        &self,
        handle: &EndpointHandle,
        tracker: &Arc<RwLock<RepeaterTracker>>,
        fields: &DmrdFields,
        payload_bytes: &[u8; PAYLOAD_LEN],
        rx_lc: Lc,
        src_endpoint: &str,
        target_slot: Slot,
        target_tgid: u32,
        now: Instant,
    ) {
        let group_hangtime = handle.group_hangtime();
        let stream_to = self.stream_timeout;

        let cached = {
            let mut guard = tracker.write().await;
            let t = guard.slot_mut(target_slot);

            let within = |time: Option<Instant>, window: Duration| {
                time.map(|t| now.duration_since(t) < window).unwrap_or(false)
            };

            let rejected = (target_tgid != t.rx.talkgroup && within(t.rx.time, group_hangtime))
                || (target_tgid != t.tx.talkgroup && within(t.tx.time, group_hangtime))
                || (target_tgid == t.rx.talkgroup && within(t.rx.time, stream_to))
                || (target_tgid == t.tx.talkgroup && fields.rf_src != t.tx.rf_src && within(t.tx.time, stream_to));

            if rejected {
                drop(guard);
                self.log_contention(src_endpoint, fields.slot, handle.name(), target_tgid).await;
                return;
            }

            let needs_new_lc =
                fields.stream_id != t.tx.stream_id || t.tx.rf_src != fields.rf_src || t.tx.talkgroup != target_tgid;

            t.tx.time = Some(now);
            t.tx.stream_id = fields.stream_id;
            t.tx.rf_src = fields.rf_src;
            t.tx.talkgroup = target_tgid;

            if needs_new_lc || t.tx.cached_lc.is_none() {
                let lc = retarget_lc(&rx_lc, target_tgid, fields.rf_src);
                t.tx.cached_lc = Some(CachedLc::derive(lc));
            }

            t.tx
                .cached_lc
                .clone()
                .expect("cached LC is always set before use")
        };

        let flip_slot = fields.slot != target_slot;
        let new_fields = dmrd::rewrite_for_target(fields, target_tgid, flip_slot);
        let new_payload = rewrite_payload(payload_bytes, fields, &cached);
        handle.send_dmrd(&new_fields, &new_payload).await;
    }

    /// Mark the source endpoint's RX slot as having logged contention, once
    /// per stream, and warn on the first occurrence.
    async fn log_contention(&self, src_endpoint: &str, src_slot: Slot, target_name: &str, target_tgid: u32) {
        let Some(src_handle) = self.endpoints.get(src_endpoint) else {
            return;
        };
        let TrackerHandle::Repeater(src_tracker) = src_handle.tracker() else {
            return;
        };

        let mut guard = src_tracker.write().await;
        let rx = &mut guard.slot_mut(src_slot).rx;
        if rx.contention_logged {
            return;
        }
        rx.contention_logged = true;
        warn!(
            source = src_endpoint,
            target = target_name,
            talkgroup = target_tgid,
            "forward suppressed by contention"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Bridge, Membership};
    use hblink_wire::dmrd::CallType;
    use tokio::sync::mpsc;

    fn fields(stream_id: u32, rf_src: u32, dst_id: u32, slot: Slot) -> DmrdFields {
        DmrdFields {
            sequence: 0,
            rf_src,
            dst_id,
            peer_id: 1,
            slot,
            call_type: CallType::Group,
            frame_type: FrameType::Voice,
            dtype_vseq: 0,
            stream_id,
        }
    }

    fn bridge_ab(slot: Slot, tgid: u32) -> BridgeTable {
        BridgeTable::new(vec![Bridge {
            name: "X".into(),
            memberships: vec![Membership::new("A", slot, tgid), Membership::new("B", slot, tgid)],
        }])
    }

    fn repeater_handle(name: &str) -> (EndpointHandle, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(8);
        let tracker = TrackerHandle::Repeater(Arc::new(RwLock::new(RepeaterTracker::new())));
        (EndpointHandle::new(name, tx, tracker), rx)
    }

    fn openbridge_handle(name: &str) -> (EndpointHandle, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(8);
        let tracker = TrackerHandle::OpenBridge(Arc::new(RwLock::new(OpenBridgeTracker::new())));
        (EndpointHandle::new(name, tx, tracker), rx)
    }

    #[tokio::test]
    async fn forwards_to_the_other_repeater_member_and_not_back_to_source() {
        let mut endpoints = EndpointRegistry::new();
        let (handle_a, mut rx_a) = repeater_handle("A");
        let (handle_b, mut rx_b) = repeater_handle("B");
        endpoints.insert(handle_a);
        endpoints.insert(handle_b);

        let router = Router::new(bridge_ab(Slot::Ts1, 3120), endpoints, Duration::from_secs(2));
        let f = fields(1, 0x00102A, 3120, Slot::Ts1);
        let lc = [0u8; 9];
        router
            .route_group_voice("A", &f, &[0u8; PAYLOAD_LEN], lc, Instant::now())
            .await;

        assert!(rx_b.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn a_different_talkgroup_within_group_hangtime_is_rejected() {
        let mut endpoints = EndpointRegistry::new();
        let (handle_a, _rx_a) = repeater_handle("A");
        let (handle_b, mut rx_b) = repeater_handle("B");
        let b_tracker = match handle_b.tracker() {
            TrackerHandle::Repeater(t) => t.clone(),
            _ => unreachable!(),
        };
        endpoints.insert(handle_a);
        endpoints.insert(handle_b);

        let router = Router::new(bridge_ab(Slot::Ts1, 3120), endpoints, Duration::from_secs(2));
        let now = Instant::now();
        {
            let mut guard = b_tracker.write().await;
            let t = guard.slot_mut(Slot::Ts1);
            t.rx.talkgroup = 9999;
            t.rx.time = Some(now);
        }

        let f = fields(1, 0x00102A, 3120, Slot::Ts1);
        router
            .route_group_voice("A", &f, &[0u8; PAYLOAD_LEN], [0u8; 9], now)
            .await;

        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn a_stale_competing_talkgroup_past_hangtime_is_forwarded() {
        let mut endpoints = EndpointRegistry::new();
        let (handle_a, _rx_a) = repeater_handle("A");
        let (handle_b, mut rx_b) = repeater_handle("B");
        let b_tracker = match handle_b.tracker() {
            TrackerHandle::Repeater(t) => t.clone(),
            _ => unreachable!(),
        };
        endpoints.insert(handle_a);
        endpoints.insert(handle_b);

        let router = Router::new(bridge_ab(Slot::Ts1, 3120), endpoints, Duration::from_secs(2));
        let now = Instant::now();
        {
            let mut guard = b_tracker.write().await;
            let t = guard.slot_mut(Slot::Ts1);
            t.rx.talkgroup = 9999;
            t.rx.time = Some(now);
        }

        let f = fields(1, 0x00102A, 3120, Slot::Ts1);
        let later = now + Duration::from_secs(10);
        router
            .route_group_voice("A", &f, &[0u8; PAYLOAD_LEN], [0u8; 9], later)
            .await;

        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn openbridge_target_gets_slot_cleared_and_talkgroup_retargeted() {
        let mut endpoints = EndpointRegistry::new();
        let (handle_a, _rx_a) = repeater_handle("A");
        let (handle_ob, mut rx_ob) = openbridge_handle("OB");
        endpoints.insert(handle_a);
        endpoints.insert(handle_ob);

        let router = Router::new(bridge_ab(Slot::Ts1, 3120), endpoints, Duration::from_secs(2));
        let f = fields(1, 0x00102A, 3120, Slot::Ts1);
        router
            .route_group_voice("A", &f, &[0xAB; PAYLOAD_LEN], [0u8; 9], Instant::now())
            .await;

        let datagram = rx_ob.try_recv().expect("OpenBridge target receives the burst");
        let (parsed, _) = dmrd::parse(&datagram).unwrap();
        assert_eq!(parsed.slot, Slot::Ts1);
        assert_eq!(parsed.dst_id, 3120);
    }

    #[tokio::test]
    async fn crossing_slots_flips_the_target_slot_bit() {
        let mut endpoints = EndpointRegistry::new();
        let (handle_a, _rx_a) = repeater_handle("A");
        let (handle_b, mut rx_b) = repeater_handle("B");
        endpoints.insert(handle_a);

        let mut bridges = BridgeTable::new(vec![Bridge {
            name: "X".into(),
            memberships: vec![
                Membership::new("A", Slot::Ts1, 3120),
                Membership::new("B", Slot::Ts2, 3120),
            ],
        }]);
        bridges.arm(Instant::now());
        endpoints.insert(handle_b);

        let router = Router::new(bridges, endpoints, Duration::from_secs(2));
        let f = fields(1, 0x00102A, 3120, Slot::Ts1);
        router
            .route_group_voice("A", &f, &[0u8; PAYLOAD_LEN], [0u8; 9], Instant::now())
            .await;

        let datagram = rx_b.try_recv().expect("B receives the forwarded burst");
        let (parsed, _) = dmrd::parse(&datagram).unwrap();
        assert_eq!(parsed.slot, Slot::Ts2);
    }
}
