// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-endpoint network tasks. Each configured endpoint gets one task that
//! owns its UDP socket and its own handshake state machine; the call-stream
//! tracker is instead wrapped in an `Arc<RwLock<_>>` shared with the router,
//! since forwarded traffic from other endpoints has to reach the same
//! tracker the owning task reads from.

use hblink_core::endpoint::master::{MasterEndpoint, MasterEvent};
use hblink_core::endpoint::openbridge::{OpenBridgeEndpoint, OpenBridgeEvent};
use hblink_core::endpoint::peer::{PeerEndpoint, PeerEvent};
use hblink_core::endpoint::{EndpointHandle, TrackerHandle};
use hblink_core::lc::late_entry_lc;
use hblink_core::tracker::{OpenBridgeTracker, RepeaterTracker, RxEvent};
use hblink_core::{EndpointConfig, Router};
use hblink_monitor::{CallEvent, MonitorHandle};
use hblink_wire::control;
use hblink_wire::dmrd::{self, CallType, DmrdFields, FrameType, PAYLOAD_LEN, VOICE_HEADER, VOICE_TERMINATOR};
use hblink_wire::payload as wire_payload;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{info, warn};

/// Decode the voice-header LC carried by a burst, if this burst is one.
fn voice_header_lc(fields: &DmrdFields, payload: &[u8; PAYLOAD_LEN]) -> Option<hblink_codec::Lc> {
    if fields.frame_type == FrameType::DataSync && fields.dtype_vseq == VOICE_HEADER {
        let bptc = wire_payload::extract_full_lc(payload);
        Some(hblink_codec::bptc::decode_lc(&bptc))
    } else {
        None
    }
}

/// Build the tracker handle and the `Arc` the owning task will touch
/// directly for the RX side.
pub fn new_repeater_tracker() -> Arc<RwLock<RepeaterTracker>> {
    Arc::new(RwLock::new(RepeaterTracker::new()))
}

pub fn new_openbridge_tracker() -> Arc<RwLock<OpenBridgeTracker>> {
    Arc::new(RwLock::new(OpenBridgeTracker::new()))
}

/// Spawn a MASTER-role endpoint's socket task. Returns the handle to
/// register in the router and the outbound mailbox the router hands
/// router-forwarded frames to (fanned out to every currently-attached peer).
pub async fn spawn_master(
    config: EndpointConfig,
    passphrase: String,
    repeat: bool,
    acl: hblink_core::acl::Acl,
    tracker: Arc<RwLock<RepeaterTracker>>,
    router: Arc<RwLock<Router>>,
    monitor: Option<MonitorHandle>,
    ping_time: Duration,
    max_missed: u32,
    stream_timeout: Duration,
    shutdown: Arc<Notify>,
) -> Result<(EndpointHandle, tokio::task::JoinHandle<()>), crate::error::StartupError> {
    let socket = UdpSocket::bind(config.bind_address)
        .await
        .map_err(|source| crate::error::StartupError::Bind { addr: config.bind_address, source })?;
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(128);
    let handle = EndpointHandle::new(config.name.clone(), outbound_tx, TrackerHandle::Repeater(tracker.clone()))
        .with_group_hangtime(config.group_hangtime());

    let name = config.name.clone();
    let join = tokio::spawn(async move {
        let mut state = MasterEndpoint::new(name.clone(), passphrase, repeat, acl);
        let mut buf = [0u8; 2048];
        let mut ping_tick = tokio::time::interval(ping_time);

        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    let Ok((n, src)) = result else { continue };
                    match state.handle_datagram(src, &buf[..n], Instant::now()) {
                        MasterEvent::Reply(pdu) => {
                            let _ = socket.send_to(&pdu, src).await;
                        }
                        MasterEvent::Dmrd { fields, payload, repeat_to } => {
                            if repeat {
                                let datagram = dmrd::build(&fields, &payload);
                                for addr in &repeat_to {
                                    let _ = socket.send_to(&datagram, *addr).await;
                                }
                            }
                            handle_repeater_dmrd(&name, &fields, &payload, &tracker, &router, &monitor, stream_timeout).await;
                        }
                        MasterEvent::None => {}
                    }
                }
                Some(datagram) = outbound_rx.recv() => {
                    for peer in state.peers().filter(|p| p.state == hblink_core::endpoint::master::PeerState::Yes) {
                        let _ = socket.send_to(&datagram, peer.address).await;
                    }
                }
                _ = ping_tick.tick() => {
                    for radio_id in state.expire_peers(Instant::now(), ping_time, max_missed) {
                        warn!(endpoint = %name, radio_id, "peer expired, no pings received");
                    }
                }
                _ = shutdown.notified() => {
                    for peer in state.peers() {
                        let _ = socket.send_to(&control::build_mstcl(peer.radio_id), peer.address).await;
                    }
                    info!(endpoint = %name, "master endpoint stopped");
                    break;
                }
            }
        }
    });

    Ok((handle, join))
}

/// Spawn a PEER-role endpoint's socket task: dials in to `master_address`
/// and maintains the login/ping cycle itself.
#[allow(clippy::too_many_arguments)]
pub async fn spawn_peer(
    config: EndpointConfig,
    radio_id: u32,
    passphrase: String,
    master_address: SocketAddr,
    description: hblink_wire::control::RepeaterDescription,
    options: Option<Vec<u8>>,
    loose_peer_id_check: bool,
    tracker: Arc<RwLock<RepeaterTracker>>,
    router: Arc<RwLock<Router>>,
    monitor: Option<MonitorHandle>,
    ping_time: Duration,
    max_missed: u32,
    stream_timeout: Duration,
    shutdown: Arc<Notify>,
) -> Result<(EndpointHandle, tokio::task::JoinHandle<()>), crate::error::StartupError> {
    let socket = UdpSocket::bind(config.bind_address)
        .await
        .map_err(|source| crate::error::StartupError::Bind { addr: config.bind_address, source })?;
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(128);
    let handle = EndpointHandle::new(config.name.clone(), outbound_tx, TrackerHandle::Repeater(tracker.clone()))
        .with_group_hangtime(config.group_hangtime());

    let name = config.name.clone();
    let join = tokio::spawn(async move {
        let mut state = PeerEndpoint::new(name.clone(), radio_id, passphrase, description, options, loose_peer_id_check);
        let mut buf = [0u8; 2048];
        let mut tick = tokio::time::interval(ping_time);

        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    let Ok((n, src)) = result else { continue };
                    if src != master_address {
                        continue;
                    }
                    match state.handle_datagram(&buf[..n]) {
                        PeerEvent::Send(pdu) => {
                            let _ = socket.send_to(&pdu, master_address).await;
                        }
                        PeerEvent::Dmrd { fields, payload } => {
                            handle_repeater_dmrd(&name, &fields, &payload, &tracker, &router, &monitor, stream_timeout).await;
                        }
                        PeerEvent::None => {}
                    }
                }
                Some(datagram) = outbound_rx.recv() => {
                    let _ = socket.send_to(&datagram, master_address).await;
                }
                _ = tick.tick() => {
                    let pdu = state.tick(max_missed);
                    let _ = socket.send_to(&pdu, master_address).await;
                }
                _ = shutdown.notified() => {
                    let _ = socket.send_to(&control::build_rptcl(radio_id), master_address).await;
                    info!(endpoint = %name, "peer endpoint stopped");
                    break;
                }
            }
        }
    });

    Ok((handle, join))
}

/// Spawn an OPENBRIDGE-role endpoint's socket task: no handshake, a single
/// fixed peer, HMAC-authenticated both ways.
pub async fn spawn_openbridge(
    config: EndpointConfig,
    network_id: u32,
    target_address: SocketAddr,
    hmac_key: Vec<u8>,
    tracker: Arc<RwLock<OpenBridgeTracker>>,
    router: Arc<RwLock<Router>>,
    monitor: Option<MonitorHandle>,
    stream_trim_interval: Duration,
    stream_trim_age: Duration,
    shutdown: Arc<Notify>,
) -> Result<(EndpointHandle, tokio::task::JoinHandle<()>), crate::error::StartupError> {
    let socket = UdpSocket::bind(config.bind_address)
        .await
        .map_err(|source| crate::error::StartupError::Bind { addr: config.bind_address, source })?;
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(128);
    let handle = EndpointHandle::new(config.name.clone(), outbound_tx, TrackerHandle::OpenBridge(tracker.clone()))
        .with_hmac_key(hmac_key.clone())
        .with_group_hangtime(config.group_hangtime());

    let name = config.name.clone();
    let join = tokio::spawn(async move {
        let state = OpenBridgeEndpoint::new(name.clone(), network_id, target_address, hmac_key);
        let mut buf = [0u8; 2048];
        let mut trim_tick = tokio::time::interval(stream_trim_interval);
        let mut stream_start: Option<(u32, Instant)> = None;

        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    let Ok((n, src)) = result else { continue };
                    if let OpenBridgeEvent::Dmrd { fields, payload } = state.handle_datagram(src, &buf[..n]) {
                        if fields.call_type != CallType::Group {
                            continue;
                        }
                        let now = Instant::now();
                        if stream_start.map(|(id, _)| id) != Some(fields.stream_id) {
                            stream_start = Some((fields.stream_id, now));
                            publish_call_event(&monitor, &name, &fields, None).await;
                        }
                        let lc = voice_header_lc(&fields, &payload).unwrap_or_else(|| late_entry_lc(fields.dst_id, fields.rf_src));
                        router.read().await.route_group_voice(&name, &fields, &payload, lc, now).await;
                        if fields.frame_type == FrameType::DataSync && fields.dtype_vseq == VOICE_TERMINATOR {
                            router.write().await.on_voice_terminator(&name, fields.slot, fields.dst_id, now);
                            if let Some((_, start)) = stream_start.take() {
                                publish_call_event(&monitor, &name, &fields, Some(now.duration_since(start).as_secs_f64())).await;
                            }
                        }
                    }
                }
                Some(datagram) = outbound_rx.recv() => {
                    let _ = socket.send_to(&datagram, target_address).await;
                }
                _ = trim_tick.tick() => {
                    tracker.write().await.trim(Instant::now(), stream_trim_age);
                }
                _ = shutdown.notified() => {
                    info!(endpoint = %name, "openbridge endpoint stopped");
                    break;
                }
            }
        }
    });

    Ok((handle, join))
}

/// Shared RX-side handling for repeater-dialect (MASTER/PEER) endpoints:
/// feed the tracker, and on a group-voice stream invoke the router.
async fn handle_repeater_dmrd(
    name: &str,
    fields: &DmrdFields,
    payload: &[u8; PAYLOAD_LEN],
    tracker: &Arc<RwLock<RepeaterTracker>>,
    router: &Arc<RwLock<Router>>,
    monitor: &Option<MonitorHandle>,
    stream_timeout: Duration,
) {
    let now = Instant::now();
    let hdr_lc = voice_header_lc(fields, payload);
    let result = {
        let mut guard = tracker.write().await;
        guard.on_rx(fields.slot, fields, hdr_lc, now, stream_timeout)
    };

    match result.event {
        RxEvent::Collision => {}
        RxEvent::Started | RxEvent::Continuing => {
            if result.event == RxEvent::Started {
                publish_call_event(monitor, name, fields, None).await;
            }
            if fields.call_type == CallType::Group {
                let rx_lc = result.lc.expect("lc is set on Started/Continuing");
                router.read().await.route_group_voice(name, fields, payload, rx_lc, now).await;
            }
            if let Some(duration) = result.call_end {
                router.write().await.on_voice_terminator(name, fields.slot, fields.dst_id, now);
                publish_call_event(monitor, name, fields, Some(duration.as_secs_f64())).await;
            }
        }
    }
}

async fn publish_call_event(monitor: &Option<MonitorHandle>, name: &str, fields: &DmrdFields, duration_secs: Option<f64>) {
    let Some(monitor) = monitor else { return };
    let slot = match fields.slot {
        hblink_wire::dmrd::Slot::Ts1 => 0,
        hblink_wire::dmrd::Slot::Ts2 => 1,
    };
    monitor
        .publish_call_event(CallEvent {
            endpoint: name.to_string(),
            stream_id: fields.stream_id,
            peer_id: fields.peer_id,
            rf_src: fields.rf_src,
            slot,
            dst_id: fields.dst_id,
            duration_secs,
        })
        .await;
}
