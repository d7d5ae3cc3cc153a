use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

pub const SYN_FLOOD_LABEL: &str = "SYN Flood / Port Scan";
pub const HTTP_FLOOD_LABEL: &str = "DoS / HTTP Flood";

#[allow(clippy::upper_case_acronyms)]
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    TCP,
    UDP,
    ICMP,
}

impl From<String> for Protocol {
    fn from(s: String) -> Protocol {
        match s.to_uppercase().as_str() {
            "TCP" => Protocol::TCP,
            "UDP" => Protocol::UDP,
            "ICMP" => Protocol::ICMP,
            other => panic!("Unknown protocol: {other}"),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::TCP => write!(f, "TCP"),
            Protocol::UDP => write!(f, "UDP"),
            Protocol::ICMP => write!(f, "ICMP"),
        }
    }
}

impl Protocol {
    pub fn iter() -> [Protocol; 3] {
        [Protocol::TCP, Protocol::UDP, Protocol::ICMP]
    }

    pub fn get_protocol_number(&self) -> u8 {
        match &self {
            Protocol::TCP => 6,
            Protocol::UDP => 17,
            Protocol::ICMP => 1,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Normal,
    Attack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Forward,  // client to server
    Backward, // server to client
}

impl PacketDirection {
    pub fn into_reverse(self) -> PacketDirection {
        match self {
            PacketDirection::Forward => PacketDirection::Backward,
            PacketDirection::Backward => PacketDirection::Forward,
        }
    }
}

/// Parsed header summary of a synthesized packet. Kept alongside the raw
/// bytes so flow-level invariants can be checked without re-parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketMeta {
    pub protocol: Protocol,
    pub direction: PacketDirection,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    /// Raw TCP flag byte; zero for UDP and ICMP
    pub flags: u8,
    pub seq: Option<u32>,
    pub ack: Option<u32>,
    pub icmp_id: Option<u16>,
    pub icmp_seq: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub timestamp: Duration,
    pub data: Vec<u8>,
    pub meta: PacketMeta,
}

impl Packet {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Used for packet ordering before pcap export
impl Ord for Packet {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.timestamp == other.timestamp {
            self.data.cmp(&other.data) // use data in case both timestamps are equal
        } else {
            self.timestamp.cmp(&other.timestamp)
        }
    }
}

impl PartialOrd for Packet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One logical bidirectional exchange: an ordered packet sequence plus its
/// protocol and kind tags.
#[derive(Debug, Clone)]
pub struct Flow {
    pub protocol: Protocol,
    pub kind: FlowKind,
    pub packets: Vec<Packet>,
}

impl Flow {
    pub fn total_size(&self) -> usize {
        self.packets.iter().map(Packet::len).sum()
    }
}

/// Derived statistics for one completed flow, independent of its raw bytes.
/// Serialized as-is onto the feature event stream.
#[derive(Serialize, Debug, Clone)]
pub struct FeatureSummary {
    pub timestamp: DateTime<Utc>,
    pub source_ip: Ipv4Addr,
    pub dest_ip: Ipv4Addr,
    pub protocol: Protocol,
    pub source_port: Option<u16>,
    pub dest_port: Option<u16>,
    pub packet_count: usize,
    pub total_size: usize,
    pub flow_kind: FlowKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_type: Option<String>,
}

/// Metadata about one persisted batch of packets.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub path: PathBuf,
    pub filename: String,
    pub packet_count: usize,
    pub index: u32,
}

/// Snapshot of the buffer, readable while generation proceeds.
#[derive(Serialize, Debug, Clone)]
pub struct BufferStatus {
    pub buffer_size: usize,
    pub packets_per_file: usize,
    pub files_saved: u32,
    pub save_enabled: bool,
    pub output_dir: PathBuf,
}
