//! Byte-correct packet construction on top of `pnet_packet`. Every builder
//! returns an immutable [`Packet`] with its header summary, or an
//! [`EncodingError`]; a malformed packet is never produced.

use crate::error::EncodingError;
use crate::structs::*;

use pnet::util::MacAddr;
use pnet_packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet_packet::icmp::echo_reply::MutableEchoReplyPacket;
use pnet_packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet_packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes};
use pnet_packet::ip::IpNextHeaderProtocol;
use pnet_packet::ipv4::{self, MutableIpv4Packet};
use pnet_packet::tcp::{self, MutableTcpPacket};
use pnet_packet::udp::MutableUdpPacket;
use rand_core::RngCore;
use std::net::Ipv4Addr;
use std::time::Duration;

const IPV4_MAX_TOTAL_LENGTH: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy)]
pub enum EchoKind {
    Request,
    Reply,
}

/// Addressing shared by every packet of one flow. `src`/`dst` are the
/// endpoints in the direction the packet travels; callers swap them for
/// backward packets.
#[derive(Debug, Clone, Copy)]
pub struct Addressing {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
}

impl Addressing {
    pub fn reversed(&self) -> Addressing {
        Addressing {
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_mac: self.dst_mac,
            dst_mac: self.src_mac,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpFields<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub flags: u8,
    pub seq: u32,
    pub ack: u32,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy)]
pub struct UdpFields<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy)]
pub struct IcmpEchoFields<'a> {
    pub kind: EchoKind,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: &'a [u8],
}

/// Stateless builder for link/network/transport headers.
#[derive(Debug, Clone)]
pub struct PacketCodec {
    ttl: u8,
}

impl Default for PacketCodec {
    fn default() -> Self {
        PacketCodec { ttl: 64 }
    }
}

impl PacketCodec {
    /// Configures the Ethernet frame by setting the source, destination MAC
    /// addresses, and setting the EtherType to IPv4.
    fn setup_ethernet_frame(
        &self,
        packet: &mut [u8],
        addr: &Addressing,
    ) -> Result<(), EncodingError> {
        let mut eth_packet =
            MutableEthernetPacket::new(packet).ok_or(EncodingError::BufferTooSmall("ethernet"))?;
        eth_packet.set_ethertype(EtherTypes::Ipv4);
        eth_packet.set_source(addr.src_mac);
        eth_packet.set_destination(addr.dst_mac);
        Ok(())
    }

    /// Sets up the IPv4 header inside a given buffer: version, header length,
    /// total length, protocol, random identification, fixed TTL, addresses,
    /// and the header checksum.
    fn setup_ip_packet(
        &self,
        rng: &mut impl RngCore,
        packet: &mut [u8],
        protocol: Protocol,
        addr: &Addressing,
    ) -> Result<(), EncodingError> {
        let len = packet.len();
        if len > IPV4_MAX_TOTAL_LENGTH {
            return Err(EncodingError::PayloadTooLarge {
                len,
                max: IPV4_MAX_TOTAL_LENGTH,
            });
        }
        let mut ipv4_packet =
            MutableIpv4Packet::new(packet).ok_or(EncodingError::BufferTooSmall("ipv4"))?;

        ipv4_packet.set_version(4);
        ipv4_packet.set_header_length(5);
        ipv4_packet.set_total_length(len as u16);
        ipv4_packet.set_next_level_protocol(IpNextHeaderProtocol::new(
            protocol.get_protocol_number(),
        ));
        ipv4_packet.set_identification(rng.next_u32() as u16);
        ipv4_packet.set_ttl(self.ttl);
        ipv4_packet.set_source(addr.src_ip);
        ipv4_packet.set_destination(addr.dst_ip);
        ipv4_packet.set_checksum(ipv4::checksum(&ipv4_packet.to_immutable()));
        Ok(())
    }

    /// Builds a TCP segment with the given flags, sequence/ack numbers and
    /// payload.
    pub fn tcp(
        &self,
        rng: &mut impl RngCore,
        ts: Duration,
        direction: PacketDirection,
        addr: &Addressing,
        fields: &TcpFields,
    ) -> Result<Packet, EncodingError> {
        let ip_start = MutableEthernetPacket::minimum_packet_size();
        let tcp_start = ip_start + MutableIpv4Packet::minimum_packet_size();
        let packet_size =
            tcp_start + MutableTcpPacket::minimum_packet_size() + fields.payload.len();
        self.check_payload(fields.payload.len(), MutableTcpPacket::minimum_packet_size())?;

        let mut packet = vec![0u8; packet_size];
        self.setup_ethernet_frame(&mut packet, addr)?;
        self.setup_ip_packet(rng, &mut packet[ip_start..], Protocol::TCP, addr)?;

        let mut tcp_packet = MutableTcpPacket::new(&mut packet[tcp_start..])
            .ok_or(EncodingError::BufferTooSmall("tcp"))?;
        tcp_packet.set_source(fields.src_port);
        tcp_packet.set_destination(fields.dst_port);
        tcp_packet.set_sequence(fields.seq);
        tcp_packet.set_acknowledgement(fields.ack);
        tcp_packet.set_flags(fields.flags);
        tcp_packet.set_window(65535);
        tcp_packet.set_data_offset(5);
        tcp_packet.set_payload(fields.payload);
        tcp_packet.set_checksum(tcp::ipv4_checksum(
            &tcp_packet.to_immutable(),
            &addr.src_ip,
            &addr.dst_ip,
        ));

        Ok(Packet {
            timestamp: ts,
            meta: PacketMeta {
                protocol: Protocol::TCP,
                direction,
                src_ip: addr.src_ip,
                dst_ip: addr.dst_ip,
                src_port: Some(fields.src_port),
                dst_port: Some(fields.dst_port),
                flags: fields.flags,
                seq: Some(fields.seq),
                ack: Some(fields.ack),
                icmp_id: None,
                icmp_seq: None,
            },
            data: packet,
        })
    }

    /// Builds a UDP datagram with an arbitrary payload.
    pub fn udp(
        &self,
        rng: &mut impl RngCore,
        ts: Duration,
        direction: PacketDirection,
        addr: &Addressing,
        fields: &UdpFields,
    ) -> Result<Packet, EncodingError> {
        let ip_start = MutableEthernetPacket::minimum_packet_size();
        let udp_start = ip_start + MutableIpv4Packet::minimum_packet_size();
        let packet_size =
            udp_start + MutableUdpPacket::minimum_packet_size() + fields.payload.len();
        self.check_payload(fields.payload.len(), MutableUdpPacket::minimum_packet_size())?;

        let mut packet = vec![0u8; packet_size];
        self.setup_ethernet_frame(&mut packet, addr)?;
        self.setup_ip_packet(rng, &mut packet[ip_start..], Protocol::UDP, addr)?;

        let mut udp_packet = MutableUdpPacket::new(&mut packet[udp_start..])
            .ok_or(EncodingError::BufferTooSmall("udp"))?;
        udp_packet.set_source(fields.src_port);
        udp_packet.set_destination(fields.dst_port);
        udp_packet.set_length((fields.payload.len() + MutableUdpPacket::minimum_packet_size()) as u16);
        udp_packet.set_payload(fields.payload);
        udp_packet.set_checksum(pnet_packet::udp::ipv4_checksum(
            &udp_packet.to_immutable(),
            &addr.src_ip,
            &addr.dst_ip,
        ));

        Ok(Packet {
            timestamp: ts,
            meta: PacketMeta {
                protocol: Protocol::UDP,
                direction,
                src_ip: addr.src_ip,
                dst_ip: addr.dst_ip,
                src_port: Some(fields.src_port),
                dst_port: Some(fields.dst_port),
                flags: 0,
                seq: None,
                ack: None,
                icmp_id: None,
                icmp_seq: None,
            },
            data: packet,
        })
    }

    /// Builds an ICMP echo request or reply sharing the caller-supplied
    /// identifier, sequence number and payload.
    pub fn icmp_echo(
        &self,
        rng: &mut impl RngCore,
        ts: Duration,
        direction: PacketDirection,
        addr: &Addressing,
        fields: &IcmpEchoFields,
    ) -> Result<Packet, EncodingError> {
        let ip_start = MutableEthernetPacket::minimum_packet_size();
        let icmp_start = ip_start + MutableIpv4Packet::minimum_packet_size();
        let packet_size =
            icmp_start + MutableEchoRequestPacket::minimum_packet_size() + fields.payload.len();
        self.check_payload(
            fields.payload.len(),
            MutableEchoRequestPacket::minimum_packet_size(),
        )?;

        let mut packet = vec![0u8; packet_size];
        self.setup_ethernet_frame(&mut packet, addr)?;
        self.setup_ip_packet(rng, &mut packet[ip_start..], Protocol::ICMP, addr)?;

        match fields.kind {
            EchoKind::Request => {
                let mut echo = MutableEchoRequestPacket::new(&mut packet[icmp_start..])
                    .ok_or(EncodingError::BufferTooSmall("icmp"))?;
                echo.set_icmp_type(IcmpTypes::EchoRequest);
                echo.set_icmp_code(IcmpCode::new(0));
                echo.set_identifier(fields.identifier);
                echo.set_sequence_number(fields.sequence);
                echo.set_payload(fields.payload);
            }
            EchoKind::Reply => {
                let mut echo = MutableEchoReplyPacket::new(&mut packet[icmp_start..])
                    .ok_or(EncodingError::BufferTooSmall("icmp"))?;
                echo.set_icmp_type(IcmpTypes::EchoReply);
                echo.set_icmp_code(IcmpCode::new(0));
                echo.set_identifier(fields.identifier);
                echo.set_sequence_number(fields.sequence);
                echo.set_payload(fields.payload);
            }
        }
        let checksum = {
            let icmp_packet = IcmpPacket::new(&packet[icmp_start..])
                .ok_or(EncodingError::BufferTooSmall("icmp"))?;
            pnet_packet::icmp::checksum(&icmp_packet)
        };
        // Checksum covers the whole ICMP message, so it is set last
        packet[icmp_start + 2..icmp_start + 4].copy_from_slice(&checksum.to_be_bytes());

        Ok(Packet {
            timestamp: ts,
            meta: PacketMeta {
                protocol: Protocol::ICMP,
                direction,
                src_ip: addr.src_ip,
                dst_ip: addr.dst_ip,
                src_port: None,
                dst_port: None,
                flags: 0,
                seq: None,
                ack: None,
                icmp_id: Some(fields.identifier),
                icmp_seq: Some(fields.sequence),
            },
            data: packet,
        })
    }

    fn check_payload(
        &self,
        payload_len: usize,
        transport_header: usize,
    ) -> Result<(), EncodingError> {
        // The IPv4 total length field must hold everything after the
        // Ethernet header
        let max =
            IPV4_MAX_TOTAL_LENGTH - MutableIpv4Packet::minimum_packet_size() - transport_header;
        if payload_len > max {
            return Err(EncodingError::PayloadTooLarge {
                len: payload_len,
                max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet_packet::ethernet::EthernetPacket;
    use pnet_packet::icmp::echo_request::EchoRequestPacket;
    use pnet_packet::ipv4::Ipv4Packet;
    use pnet_packet::tcp::{TcpFlags, TcpPacket};
    use pnet_packet::udp::UdpPacket;
    use pnet_packet::Packet as _;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn addressing() -> Addressing {
        Addressing {
            src_ip: Ipv4Addr::new(10, 0, 0, 1),
            dst_ip: Ipv4Addr::new(10, 0, 0, 2),
            src_mac: MacAddr::new(2, 0, 0, 0, 0, 1),
            dst_mac: MacAddr::new(2, 0, 0, 0, 0, 2),
        }
    }

    #[test]
    fn test_tcp_segment_layout() {
        let codec = PacketCodec::default();
        let mut rng = Pcg32::seed_from_u64(0);
        let payload = b"hello";
        let packet = codec
            .tcp(
                &mut rng,
                Duration::ZERO,
                PacketDirection::Forward,
                &addressing(),
                &TcpFields {
                    src_port: 40000,
                    dst_port: 80,
                    flags: TcpFlags::PSH | TcpFlags::ACK,
                    seq: 1000,
                    ack: 2000,
                    payload,
                },
            )
            .unwrap();

        assert_eq!(packet.data.len(), 14 + 20 + 20 + payload.len());
        let eth = EthernetPacket::new(&packet.data).unwrap();
        assert_eq!(eth.get_ethertype(), EtherTypes::Ipv4);
        let ip = Ipv4Packet::new(eth.payload()).unwrap();
        assert_eq!(ip.get_ttl(), 64);
        assert_eq!(ip.get_total_length() as usize, 40 + payload.len());
        assert_eq!(ip.get_source(), Ipv4Addr::new(10, 0, 0, 1));
        let tcp = TcpPacket::new(ip.payload()).unwrap();
        assert_eq!(tcp.get_sequence(), 1000);
        assert_eq!(tcp.get_acknowledgement(), 2000);
        assert_eq!(tcp.get_flags(), TcpFlags::PSH | TcpFlags::ACK);
        assert_eq!(tcp.payload(), payload);
        assert_eq!(
            tcp.get_checksum(),
            tcp::ipv4_checksum(&tcp, &ip.get_source(), &ip.get_destination())
        );
    }

    #[test]
    fn test_udp_length_field() {
        let codec = PacketCodec::default();
        let mut rng = Pcg32::seed_from_u64(0);
        let payload = vec![0xab; 37];
        let packet = codec
            .udp(
                &mut rng,
                Duration::ZERO,
                PacketDirection::Forward,
                &addressing(),
                &UdpFields {
                    src_port: 5353,
                    dst_port: 53,
                    payload: &payload,
                },
            )
            .unwrap();
        let eth = EthernetPacket::new(&packet.data).unwrap();
        let ip = Ipv4Packet::new(eth.payload()).unwrap();
        let udp = UdpPacket::new(ip.payload()).unwrap();
        assert_eq!(udp.get_length() as usize, 8 + payload.len());
        assert_eq!(udp.payload(), &payload[..]);
    }

    #[test]
    fn test_icmp_echo_fields() {
        let codec = PacketCodec::default();
        let mut rng = Pcg32::seed_from_u64(0);
        let payload = vec![7u8; 56];
        let packet = codec
            .icmp_echo(
                &mut rng,
                Duration::ZERO,
                PacketDirection::Forward,
                &addressing(),
                &IcmpEchoFields {
                    kind: EchoKind::Request,
                    identifier: 42,
                    sequence: 7,
                    payload: &payload,
                },
            )
            .unwrap();
        let eth = EthernetPacket::new(&packet.data).unwrap();
        let ip = Ipv4Packet::new(eth.payload()).unwrap();
        assert_eq!(ip.get_next_level_protocol().0, 1);
        let echo = EchoRequestPacket::new(ip.payload()).unwrap();
        assert_eq!(echo.get_icmp_type(), IcmpTypes::EchoRequest);
        assert_eq!(echo.get_identifier(), 42);
        assert_eq!(echo.get_sequence_number(), 7);
        assert_eq!(echo.payload(), &payload[..]);
    }

    #[test]
    fn test_oversized_payload_is_refused() {
        let codec = PacketCodec::default();
        let mut rng = Pcg32::seed_from_u64(0);
        let payload = vec![0u8; 70_000];
        let res = codec.udp(
            &mut rng,
            Duration::ZERO,
            PacketDirection::Forward,
            &addressing(),
            &UdpFields {
                src_port: 1,
                dst_port: 2,
                payload: &payload,
            },
        );
        assert!(matches!(res, Err(EncodingError::PayloadTooLarge { .. })));
    }
}
