// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Call-stream tracking.
//!
//! Repeater-dialect endpoints keep one [`SlotState`] per DMR time-slot.
//! OpenBridge endpoints have no time-slot concept and instead key streams
//! directly by stream-id in an [`OpenBridgeTracker`].

use crate::lc::{late_entry_lc, CachedLc};
use hblink_codec::Lc;
use hblink_wire::dmrd::{DmrdFields, FrameType, Slot, VOICE_TERMINATOR};
use std::collections::HashMap;
use std::time::{Duration, Instant};

fn slot_index(slot: Slot) -> usize {
    match slot {
        Slot::Ts1 => 0,
        Slot::Ts2 => 1,
    }
}

/// Receive-side state for one slot.
#[derive(Debug, Clone, Default)]
pub struct RxState {
    pub stream_id: u32,
    pub rf_src: u32,
    pub talkgroup: u32,
    pub last_type: u8,
    pub lc: Option<Lc>,
    pub time: Option<Instant>,
    pub start_time: Option<Instant>,
    pub contention_logged: bool,
}

/// Transmit-side state for one slot: the stream most recently forwarded
/// toward this endpoint on this slot.
#[derive(Debug, Clone, Default)]
pub struct TxState {
    pub stream_id: u32,
    pub rf_src: u32,
    pub talkgroup: u32,
    pub time: Option<Instant>,
    pub cached_lc: Option<CachedLc>,
}

#[derive(Debug, Clone, Default)]
pub struct SlotState {
    pub rx: RxState,
    pub tx: TxState,
}

/// Outcome of feeding one incoming burst to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEvent {
    /// A competing stream is already active; the packet must be dropped.
    Collision,
    /// This burst began a new stream.
    Started,
    /// This burst continues the already-active stream.
    Continuing,
}

#[derive(Debug, Clone)]
pub struct RxResult {
    pub event: RxEvent,
    /// The LC to use for routing this burst; `None` only on `Collision`.
    pub lc: Option<Lc>,
    /// `Some(duration)` when this burst is the voice-terminator transition.
    pub call_end: Option<Duration>,
}

/// Two-slot call-stream tracker for a repeater-dialect endpoint.
#[derive(Debug, Clone)]
pub struct RepeaterTracker {
    slots: [SlotState; 2],
}

impl RepeaterTracker {
    pub fn new() -> Self {
        Self {
            slots: [SlotState::default(), SlotState::default()],
        }
    }

    pub fn slot(&self, slot: Slot) -> &SlotState {
        &self.slots[slot_index(slot)]
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut SlotState {
        &mut self.slots[slot_index(slot)]
    }

    /// Feed one incoming DMRD burst. `voice_header_lc` is `Some` when the
    /// caller has already BPTC-decoded this burst's header LC (i.e. it is a
    /// `data_sync`/`voice_header` frame).
    pub fn on_rx(
        &mut self,
        slot: Slot,
        fields: &DmrdFields,
        voice_header_lc: Option<Lc>,
        now: Instant,
        stream_to: Duration,
    ) -> RxResult {
        let idx = slot_index(slot);
        let prior_last_type = self.slots[idx].rx.last_type;
        let is_new_stream =
            fields.stream_id != self.slots[idx].rx.stream_id || self.slots[idx].rx.time.is_none();

        if is_new_stream {
            let collision = prior_last_type != VOICE_TERMINATOR
                && self.slots[idx]
                    .rx
                    .time
                    .map(|t| now.duration_since(t) < stream_to)
                    .unwrap_or(false)
                && fields.rf_src != self.slots[idx].rx.rf_src;
            if collision {
                return RxResult {
                    event: RxEvent::Collision,
                    lc: None,
                    call_end: None,
                };
            }
        }

        let is_terminator_transition = fields.frame_type == FrameType::DataSync
            && fields.dtype_vseq == VOICE_TERMINATOR
            && prior_last_type != VOICE_TERMINATOR;

        let (event, lc) = if is_new_stream {
            let lc = voice_header_lc.unwrap_or_else(|| late_entry_lc(fields.dst_id, fields.rf_src));
            self.slots[idx].rx.start_time = Some(now);
            self.slots[idx].rx.lc = Some(lc);
            self.slots[idx].rx.contention_logged = false;
            (RxEvent::Started, lc)
        } else {
            let lc = self.slots[idx]
                .rx
                .lc
                .unwrap_or_else(|| late_entry_lc(fields.dst_id, fields.rf_src));
            (RxEvent::Continuing, lc)
        };

        let call_end = if is_terminator_transition {
            self.slots[idx].rx.start_time.map(|start| now.duration_since(start))
        } else {
            None
        };

        let rx = &mut self.slots[idx].rx;
        rx.stream_id = fields.stream_id;
        rx.rf_src = fields.rf_src;
        rx.talkgroup = fields.dst_id;
        rx.last_type = fields.dtype_vseq;
        rx.time = Some(now);

        RxResult {
            event,
            lc: Some(lc),
            call_end,
        }
    }
}

impl Default for RepeaterTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A tracked stream on an OpenBridge endpoint, keyed by stream-id.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub start: Instant,
    pub last_seen: Instant,
    pub rf_src: u32,
    pub talkgroup: u32,
    pub cached_lc: CachedLc,
}

/// Stream-id-keyed tracker for OpenBridge endpoints, which have no slots.
#[derive(Debug, Default)]
pub struct OpenBridgeTracker {
    streams: HashMap<u32, StreamEntry>,
}

impl OpenBridgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stream_id: u32) -> Option<&StreamEntry> {
        self.streams.get(&stream_id)
    }

    pub fn get_or_insert_with(
        &mut self,
        stream_id: u32,
        make: impl FnOnce() -> StreamEntry,
    ) -> &StreamEntry {
        self.streams.entry(stream_id).or_insert_with(make)
    }

    pub fn touch(&mut self, stream_id: u32, now: Instant) {
        if let Some(entry) = self.streams.get_mut(&stream_id) {
            entry.last_seen = now;
        }
    }

    /// Remove every stream whose last-seen time is older than `max_age`.
    pub fn trim(&mut self, now: Instant, max_age: Duration) {
        self.streams
            .retain(|_, entry| now.duration_since(entry.last_seen) < max_age);
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hblink_wire::dmrd::CallType;

    fn fields(stream_id: u32, rf_src: u32, dst_id: u32, frame_type: FrameType, dtype_vseq: u8) -> DmrdFields {
        DmrdFields {
            sequence: 0,
            rf_src,
            dst_id,
            peer_id: 1,
            slot: Slot::Ts1,
            call_type: CallType::Group,
            frame_type,
            dtype_vseq,
            stream_id,
        }
    }

    #[test]
    fn first_burst_on_a_slot_always_starts_a_stream() {
        let mut tracker = RepeaterTracker::new();
        let now = Instant::now();
        let f = fields(1, 0x2A, 3120, FrameType::Voice, 0);
        let result = tracker.on_rx(Slot::Ts1, &f, None, now, Duration::from_secs(2));
        assert_eq!(result.event, RxEvent::Started);
        assert!(result.lc.is_some());
    }

    #[test]
    fn competing_stream_within_stream_to_is_a_collision() {
        let mut tracker = RepeaterTracker::new();
        let now = Instant::now();
        let f1 = fields(1, 0x2A, 3120, FrameType::Voice, 0);
        tracker.on_rx(Slot::Ts1, &f1, None, now, Duration::from_secs(2));

        let f2 = fields(2, 0x99, 3121, FrameType::Voice, 0);
        let later = now + Duration::from_millis(500);
        let result = tracker.on_rx(Slot::Ts1, &f2, None, later, Duration::from_secs(2));
        assert_eq!(result.event, RxEvent::Collision);
    }

    #[test]
    fn same_source_retransmitting_is_not_a_collision() {
        let mut tracker = RepeaterTracker::new();
        let now = Instant::now();
        let f1 = fields(1, 0x2A, 3120, FrameType::Voice, 0);
        tracker.on_rx(Slot::Ts1, &f1, None, now, Duration::from_secs(2));

        let f2 = fields(1, 0x2A, 3120, FrameType::Voice, 1);
        let later = now + Duration::from_millis(60);
        let result = tracker.on_rx(Slot::Ts1, &f2, None, later, Duration::from_secs(2));
        assert_eq!(result.event, RxEvent::Continuing);
    }

    #[test]
    fn stream_past_timeout_is_not_a_collision() {
        let mut tracker = RepeaterTracker::new();
        let now = Instant::now();
        let f1 = fields(1, 0x2A, 3120, FrameType::Voice, 0);
        tracker.on_rx(Slot::Ts1, &f1, None, now, Duration::from_secs(2));

        let f2 = fields(2, 0x99, 3121, FrameType::Voice, 0);
        let later = now + Duration::from_secs(3);
        let result = tracker.on_rx(Slot::Ts1, &f2, None, later, Duration::from_secs(2));
        assert_eq!(result.event, RxEvent::Started);
    }

    #[test]
    fn voice_terminator_transition_reports_call_duration() {
        let mut tracker = RepeaterTracker::new();
        let now = Instant::now();
        let f1 = fields(1, 0x2A, 3120, FrameType::DataSync, 1);
        tracker.on_rx(Slot::Ts1, &f1, Some([0u8; 9]), now, Duration::from_secs(2));

        let f2 = fields(1, 0x2A, 3120, FrameType::DataSync, VOICE_TERMINATOR);
        let later = now + Duration::from_secs(4);
        let result = tracker.on_rx(Slot::Ts1, &f2, None, later, Duration::from_secs(2));
        assert_eq!(result.call_end, Some(Duration::from_secs(4)));
    }

    #[test]
    fn openbridge_tracker_trims_stale_streams() {
        let mut tracker = OpenBridgeTracker::new();
        let now = Instant::now();
        tracker.get_or_insert_with(1, || StreamEntry {
            start: now,
            last_seen: now,
            rf_src: 1,
            talkgroup: 1,
            cached_lc: CachedLc::derive([0u8; 9]),
        });
        assert_eq!(tracker.len(), 1);

        tracker.trim(now + Duration::from_secs(6), Duration::from_secs(5));
        assert!(tracker.is_empty());
    }

    #[test]
    fn openbridge_tracker_touch_keeps_a_stream_alive() {
        let mut tracker = OpenBridgeTracker::new();
        let now = Instant::now();
        tracker.get_or_insert_with(1, || StreamEntry {
            start: now,
            last_seen: now,
            rf_src: 1,
            talkgroup: 1,
            cached_lc: CachedLc::derive([0u8; 9]),
        });

        let later = now + Duration::from_secs(4);
        tracker.touch(1, later);
        tracker.trim(later + Duration::from_secs(2), Duration::from_secs(5));
        assert_eq!(tracker.len(), 1);
    }
}
