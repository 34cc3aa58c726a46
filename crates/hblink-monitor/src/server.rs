// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Monitor TCP server: accepts connections, replays a config snapshot to
//! each new client, and fans out bridge snapshots and call events to every
//! connected client as they're published.

use crate::message::{BridgeSnapshot, CallEvent, ConfigSnapshot, MonitorMessage};
use crate::netstring::{self, NetstringError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("netstring framing error: {0}")]
    Netstring(#[from] NetstringError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

type ClientMap = Arc<RwLock<HashMap<SocketAddr, mpsc::Sender<MonitorMessage>>>>;

/// A cheaply-clonable publishing interface, kept by the caller after
/// handing the server's accept loop off to its own task.
#[derive(Clone)]
pub struct MonitorHandle {
    clients: ClientMap,
    config_snapshot: Arc<RwLock<ConfigSnapshot>>,
    shutdown: Arc<Notify>,
}

impl MonitorHandle {
    pub async fn publish_bridge_snapshot(&self, snapshot: BridgeSnapshot) {
        self.broadcast(MonitorMessage::BridgeSnd(snapshot)).await;
    }

    pub async fn publish_call_event(&self, event: CallEvent) {
        self.broadcast(MonitorMessage::BrdgEvent(event)).await;
    }

    pub async fn update_config_snapshot(&self, snapshot: ConfigSnapshot) {
        *self.config_snapshot.write().await = snapshot.clone();
        self.broadcast(MonitorMessage::ConfigSnd(snapshot)).await;
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    async fn broadcast(&self, msg: MonitorMessage) {
        let clients = self.clients.read().await;
        for tx in clients.values() {
            let _ = tx.send(msg.clone()).await;
        }
    }
}

pub struct MonitorServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    handle: MonitorHandle,
}

impl MonitorServer {
    pub async fn bind(addr: SocketAddr, config_snapshot: ConfigSnapshot) -> Result<Self, MonitorError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            handle: MonitorHandle {
                clients: Arc::new(RwLock::new(HashMap::new())),
                config_snapshot: Arc::new(RwLock::new(config_snapshot)),
                shutdown: Arc::new(Notify::new()),
            },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    /// Run the accept loop until `MonitorHandle::shutdown` is called.
    pub async fn run(self) -> Result<(), MonitorError> {
        info!(addr = %self.local_addr, "monitor sink listening");
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let handle = self.handle.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer_addr, handle).await {
                                    warn!(%peer_addr, error = %e, "monitor connection error");
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "monitor accept error"),
                    }
                }
                _ = self.handle.shutdown.notified() => {
                    info!("monitor sink shutting down");
                    break;
                }
            }
        }
        Ok(())
    }
}

async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, handle: MonitorHandle) -> Result<(), MonitorError> {
    let (mut read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<MonitorMessage>(32);
    handle.clients.write().await.insert(peer_addr, tx.clone());
    debug!(%peer_addr, "monitor client connected");

    let initial = handle.config_snapshot.read().await.clone();
    let _ = tx.try_send(MonitorMessage::ConfigSnd(initial));

    loop {
        tokio::select! {
            frame = netstring::read_frame(&mut read_half) => {
                match frame? {
                    Some(bytes) => {
                        if let Ok(MonitorMessage::ConfigReq) = serde_json::from_slice::<MonitorMessage>(&bytes) {
                            let snap = handle.config_snapshot.read().await.clone();
                            let _ = tx.try_send(MonitorMessage::ConfigSnd(snap));
                        }
                    }
                    None => break,
                }
            }
            Some(msg) = rx.recv() => {
                let json = serde_json::to_vec(&msg)?;
                netstring::write_frame(&mut write_half, &json).await?;
            }
            _ = handle.shutdown.notified() => break,
        }
    }

    handle.clients.write().await.remove(&peer_addr);
    debug!(%peer_addr, "monitor client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::EndpointSnapshot;

    async fn read_message(stream: &mut TcpStream) -> MonitorMessage {
        let frame = netstring::read_frame(stream).await.unwrap().unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn new_client_receives_the_current_config_snapshot() {
        let snapshot = ConfigSnapshot {
            ping_time_secs: 5,
            stream_timeout_secs: 2,
            endpoints: vec![EndpointSnapshot {
                name: "A".into(),
                role: "master".into(),
                bind_address: "0.0.0.0:62031".into(),
                group_hangtime_secs: 5,
            }],
        };
        let server = MonitorServer::bind("127.0.0.1:0".parse().unwrap(), snapshot).await.unwrap();
        let addr = server.local_addr();
        let handle = server.handle();
        tokio::spawn(server.run());

        let mut client = TcpStream::connect(addr).await.unwrap();
        match read_message(&mut client).await {
            MonitorMessage::ConfigSnd(snap) => assert_eq!(snap.endpoints[0].name, "A"),
            other => panic!("expected CONFIG_SND, got {other:?}"),
        }

        handle.shutdown();
    }

    #[tokio::test]
    async fn published_call_event_reaches_a_connected_client() {
        let server = MonitorServer::bind("127.0.0.1:0".parse().unwrap(), ConfigSnapshot::default())
            .await
            .unwrap();
        let addr = server.local_addr();
        let handle = server.handle();
        tokio::spawn(server.run());

        let mut client = TcpStream::connect(addr).await.unwrap();
        let _ = read_message(&mut client).await;

        handle
            .publish_call_event(CallEvent {
                endpoint: "A".into(),
                stream_id: 42,
                peer_id: 0x2A,
                rf_src: 0x00102A,
                slot: 0,
                dst_id: 3120,
                duration_secs: None,
            })
            .await;

        match read_message(&mut client).await {
            MonitorMessage::BrdgEvent(event) => assert_eq!(event.stream_id, 42),
            other => panic!("expected BRDG_EVENT, got {other:?}"),
        }

        handle.shutdown();
    }
}
