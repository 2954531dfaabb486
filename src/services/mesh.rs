// src/services/mesh.rs

//! Meshtastic UDP broadcaster.
//!
//! Wraps each alert in a `MeshPacket` and sends it to the mesh gateway or
//! multicast group. With `announce_event_nodes`, every event is sent from a
//! pseudo node derived from its id: node info first, then the text, then the
//! event position, so the quake shows up on mesh maps.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use prost::Message;
use sha2::{Digest, Sha256};
use tokio::net::{UdpSocket, lookup_host};

use crate::error::{AppError, Result};
use crate::models::{AlertRecord, MeshConfig, SeismicEvent};
use crate::pipeline::format::{long_name, short_name};
use crate::services::Broadcaster;
use crate::services::meshtastic::{
    BROADCAST_ADDR, Data, MAX_PAYLOAD_LEN, MeshPacket, Position, User, port,
};
use crate::utils::truncate_utf8;

/// Deepest altitude reported for an event position, in metres.
const MIN_ALTITUDE_M: f64 = -10_000.0;

pub struct MeshBroadcaster {
    socket: UdpSocket,
    destination: SocketAddr,
    config: MeshConfig,
    next_packet_id: AtomicU32,
}

impl MeshBroadcaster {
    /// Resolve the destination and open a UDP socket towards it.
    pub async fn bind(config: &MeshConfig) -> Result<Self> {
        let destination = lookup_host(config.destination.as_str())
            .await?
            .next()
            .ok_or_else(|| {
                AppError::config(format!("mesh.destination {} did not resolve", config.destination))
            })?;

        let local: SocketAddr = if destination.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        if destination.ip().is_multicast() && destination.is_ipv4() {
            socket.set_multicast_ttl_v4(config.ttl)?;
        }

        log::info!(
            "Mesh broadcaster sending to {} as !{:08x}",
            destination,
            config.node_num
        );

        Ok(Self {
            socket,
            destination,
            config: config.clone(),
            next_packet_id: AtomicU32::new(rand::random()),
        })
    }

    fn packet(&self, from: u32, portnum: i32, payload: Vec<u8>) -> MeshPacket {
        MeshPacket {
            from,
            to: BROADCAST_ADDR,
            channel: self.config.channel,
            decoded: Some(Data { portnum, payload }),
            id: self.next_packet_id.fetch_add(1, Ordering::Relaxed),
            hop_limit: self.config.hop_limit,
            want_ack: false,
            hop_start: self.config.hop_limit,
        }
    }

    async fn send_packet(&self, packet: &MeshPacket) -> Result<()> {
        let bytes = packet.encode_to_vec();
        let sent = self
            .socket
            .send_to(&bytes, self.destination)
            .await
            .map_err(|e| AppError::broadcast(self.destination.to_string(), e))?;
        if sent != bytes.len() {
            return Err(AppError::broadcast(
                self.destination.to_string(),
                format!("short send: {sent} of {} bytes", bytes.len()),
            ));
        }
        Ok(())
    }

    async fn pause(&self) {
        let delay = self.config.packet_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn node_info(&self, from: u32, event: &SeismicEvent) -> MeshPacket {
        let user = User {
            id: node_id(from),
            long_name: long_name(event),
            short_name: short_name(event),
        };
        self.packet(from, port::NODEINFO_APP, user.encode_to_vec())
    }

    fn position(&self, from: u32, event: &SeismicEvent) -> MeshPacket {
        let time = u32::try_from(event.occurred_at.timestamp()).unwrap_or(0);
        let pos = Position::from_degrees(
            event.latitude,
            event.longitude,
            depth_to_altitude(event.depth_km),
            time,
        );
        self.packet(from, port::POSITION_APP, pos.encode_to_vec())
    }
}

#[async_trait]
impl Broadcaster for MeshBroadcaster {
    async fn send(&self, alert: &AlertRecord) -> Result<()> {
        let announce = self.config.announce_event_nodes;
        let from = if announce {
            pseudo_node_num(alert.event_id())
        } else {
            self.config.node_num
        };

        if announce {
            self.send_packet(&self.node_info(from, &alert.event)).await?;
            self.pause().await;
        }

        let text = truncate_utf8(&alert.text, MAX_PAYLOAD_LEN);
        self.send_packet(&self.packet(from, port::TEXT_MESSAGE_APP, text.as_bytes().to_vec()))
            .await?;

        if announce {
            self.pause().await;
            // the text is already out, so a lost position must not cause a resend
            if let Err(e) = self.send_packet(&self.position(from, &alert.event)).await {
                log::warn!("Position for {} not sent: {}", alert.event_id(), e);
            }
        }

        Ok(())
    }

    fn destination(&self) -> String {
        self.destination.to_string()
    }
}

/// Node number for an event's pseudo node: first four bytes of SHA-256(id).
pub fn pseudo_node_num(event_id: &str) -> u32 {
    let digest = Sha256::digest(event_id.as_bytes());
    let num = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    match num {
        0 => 1,
        BROADCAST_ADDR => BROADCAST_ADDR - 1,
        n => n,
    }
}

/// Meshtastic user id for a node number, e.g. `!0a1b2c3d`.
pub fn node_id(node_num: u32) -> String {
    format!("!{}", hex::encode(node_num.to_be_bytes()))
}

/// Negative depth in metres, clamped to [-10 km, 0].
fn depth_to_altitude(depth_km: f64) -> i32 {
    (-(depth_km * 1000.0)).clamp(MIN_ALTITUDE_M, 0.0) as i32
}
