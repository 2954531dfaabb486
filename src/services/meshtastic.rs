// src/services/meshtastic.rs

//! Subset of the Meshtastic protobuf schema needed to put text, node info
//! and positions on the mesh.
//!
//! Field numbers follow `meshtastic/mesh.proto`. Only unencrypted
//! (`decoded`) packets are produced.

use prost::Message;

/// Destination node number meaning "everyone".
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

/// Application port numbers (`portnums.proto`).
pub mod port {
    pub const TEXT_MESSAGE_APP: i32 = 1;
    pub const POSITION_APP: i32 = 3;
    pub const NODEINFO_APP: i32 = 4;
}

/// Largest `Data.payload` a mesh packet can carry.
pub const MAX_PAYLOAD_LEN: usize = 228;

#[derive(Clone, PartialEq, Message)]
pub struct MeshPacket {
    #[prost(fixed32, tag = "1")]
    pub from: u32,
    #[prost(fixed32, tag = "2")]
    pub to: u32,
    #[prost(uint32, tag = "3")]
    pub channel: u32,
    #[prost(message, optional, tag = "4")]
    pub decoded: Option<Data>,
    #[prost(fixed32, tag = "6")]
    pub id: u32,
    #[prost(uint32, tag = "9")]
    pub hop_limit: u32,
    #[prost(bool, tag = "10")]
    pub want_ack: bool,
    #[prost(uint32, tag = "15")]
    pub hop_start: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Data {
    #[prost(int32, tag = "1")]
    pub portnum: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
}

/// Node identity broadcast on `NODEINFO_APP`.
#[derive(Clone, PartialEq, Message)]
pub struct User {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub long_name: String,
    #[prost(string, tag = "3")]
    pub short_name: String,
}

/// Location broadcast on `POSITION_APP`. Coordinates are degrees * 1e7.
#[derive(Clone, PartialEq, Message)]
pub struct Position {
    #[prost(sfixed32, optional, tag = "1")]
    pub latitude_i: Option<i32>,
    #[prost(sfixed32, optional, tag = "2")]
    pub longitude_i: Option<i32>,
    /// Metres above sea level
    #[prost(int32, optional, tag = "3")]
    pub altitude: Option<i32>,
    /// Seconds since the Unix epoch
    #[prost(fixed32, tag = "4")]
    pub time: u32,
}

impl Position {
    /// Build from degrees, rounding to the 1e-7 degree grid.
    pub fn from_degrees(latitude: f64, longitude: f64, altitude: i32, time: u32) -> Self {
        Self {
            latitude_i: Some((latitude * 1e7).round() as i32),
            longitude_i: Some((longitude * 1e7).round() as i32),
            altitude: Some(altitude),
            time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_packet_decodes_back() {
        let packet = MeshPacket {
            from: 0x7571_6b65,
            to: BROADCAST_ADDR,
            id: 42,
            hop_limit: 3,
            hop_start: 3,
            decoded: Some(Data {
                portnum: port::TEXT_MESSAGE_APP,
                payload: "M4.2 quake".as_bytes().to_vec(),
            }),
            ..MeshPacket::default()
        };

        let bytes = packet.encode_to_vec();
        let decoded = MeshPacket::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn from_is_fixed32_on_the_wire() {
        let packet = MeshPacket {
            from: 1,
            ..MeshPacket::default()
        };
        // field 1, wire type 5 (fixed32), then four little-endian bytes
        assert_eq!(packet.encode_to_vec(), vec![0x0d, 1, 0, 0, 0]);
    }

    #[test]
    fn position_uses_fixed_point_degrees() {
        let pos = Position::from_degrees(35.7, -117.6, -7500, 1_714_566_896);
        assert_eq!(pos.latitude_i, Some(357_000_000));
        assert_eq!(pos.longitude_i, Some(-1_176_000_000));
    }
}
