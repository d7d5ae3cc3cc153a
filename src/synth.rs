//! Flow synthesis: per-protocol state machines that emit one packet per
//! transition, with sequence/ack arithmetic and pacing timestamps good
//! enough for downstream feature extraction to treat the output as captured
//! traffic.

use crate::codec::*;
use crate::error::SynthesisError;
use crate::payload;
use crate::structs::*;

use chrono::Utc;
use pnet::util::MacAddr;
use pnet_packet::tcp::TcpFlags;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_core::RngCore;
use rand_pcg::Pcg32;
use std::net::Ipv4Addr;
use std::num::Wrapping;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DNS_PORT: u16 = 53;
const ICMP_PAYLOAD_LEN: usize = 56; // standard ping payload

#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub common_ports: Vec<u16>,
    /// Bounds for the randomized inter-packet delay, in milliseconds. The
    /// delays become packet timestamps, they are never slept on.
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    /// Whether TCP flows carry a request/response exchange
    pub with_data: bool,
}

impl Default for SynthOptions {
    fn default() -> Self {
        SynthOptions {
            common_ports: vec![80, 443, 22, 21, 25, 53, 8080, 3306, 5432],
            pacing_min_ms: 1,
            pacing_max_ms: 50,
            with_data: true,
        }
    }
}

/// TCP connection lifecycle; every transition out of a state emits exactly
/// one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TcpState {
    Closed,
    SynSent,
    SynRcvd,
    Established,
    DataSent,
    DataAcked,
    RespSent,
    RespAcked,
    FinWait,
    LastAck,
}

struct TcpContext {
    addr: Addressing,
    src_port: u16,
    dst_port: u16,
    client_seq: Wrapping<u32>,
    server_seq: Wrapping<u32>,
    clock: Duration,
}

pub struct FlowSynthesizer {
    codec: PacketCodec,
    rng: Pcg32,
    opts: SynthOptions,
}

impl FlowSynthesizer {
    pub fn new(seed: u64, opts: SynthOptions) -> Self {
        FlowSynthesizer {
            codec: PacketCodec::default(),
            rng: Pcg32::seed_from_u64(seed),
            opts,
        }
    }

    /// Synthesizes one complete bidirectional flow. A random protocol is
    /// picked when none is requested. On failure the partial packet list is
    /// discarded.
    pub fn synthesize(
        &mut self,
        protocol: Option<Protocol>,
    ) -> Result<(Flow, FeatureSummary), SynthesisError> {
        let protocol =
            protocol.unwrap_or_else(|| *Protocol::iter().choose(&mut self.rng).unwrap_or(&Protocol::TCP));
        let addr = self.random_addressing();
        let src_port = self.rng.gen_range(1024..=65535);
        let dst_port = *self.opts.common_ports.choose(&mut self.rng).unwrap_or(&80);

        let packets = match protocol {
            Protocol::TCP => self.tcp_flow(&addr, src_port, dst_port)?,
            Protocol::UDP => self.udp_flow(&addr, src_port, dst_port)?,
            Protocol::ICMP => self.icmp_flow(&addr)?,
        };

        let (src_port, dst_port) = match protocol {
            Protocol::ICMP => (None, None),
            _ => (Some(src_port), Some(dst_port)),
        };
        let flow = Flow {
            protocol,
            kind: FlowKind::Normal,
            packets,
        };
        let summary = FeatureSummary {
            timestamp: Utc::now(),
            source_ip: addr.src_ip,
            dest_ip: addr.dst_ip,
            protocol,
            source_port: src_port,
            dest_port: dst_port,
            packet_count: flow.packets.len(),
            total_size: flow.total_size(),
            flow_kind: FlowKind::Normal,
            attack_type: None,
        };
        Ok((flow, summary))
    }

    fn tcp_flow(
        &mut self,
        addr: &Addressing,
        src_port: u16,
        dst_port: u16,
    ) -> Result<Vec<Packet>, SynthesisError> {
        let mut ctx = TcpContext {
            addr: *addr,
            src_port,
            dst_port,
            client_seq: Wrapping(self.rng.next_u32()),
            server_seq: Wrapping(self.rng.next_u32()),
            clock: unix_now(),
        };
        let mut packets = Vec::with_capacity(10);
        let mut state = TcpState::Closed;
        loop {
            let (packet, next) = self.tcp_transition(state, &mut ctx)?;
            packets.push(packet);
            state = next;
            if state == TcpState::Closed || (state == TcpState::Established && !self.opts.with_data)
            {
                break;
            }
        }
        Ok(packets)
    }

    /// Walks one edge of the TCP transition graph, returning the emitted
    /// packet and the next state.
    fn tcp_transition(
        &mut self,
        state: TcpState,
        ctx: &mut TcpContext,
    ) -> Result<(Packet, TcpState), SynthesisError> {
        ctx.clock += self.delay();
        let forward = ctx.addr;
        let backward = ctx.addr.reversed();
        let step = match state {
            TcpState::Closed => {
                // client SYN
                let p = self.tcp_packet(
                    &forward,
                    PacketDirection::Forward,
                    ctx,
                    TcpFlags::SYN,
                    ctx.client_seq.0,
                    0,
                    &[],
                )?;
                (p, TcpState::SynSent)
            }
            TcpState::SynSent => {
                // server SYN+ACK
                let p = self.tcp_packet(
                    &backward,
                    PacketDirection::Backward,
                    ctx,
                    TcpFlags::SYN | TcpFlags::ACK,
                    ctx.server_seq.0,
                    (ctx.client_seq + Wrapping(1)).0,
                    &[],
                )?;
                (p, TcpState::SynRcvd)
            }
            TcpState::SynRcvd => {
                // client ACK completes the handshake
                ctx.client_seq += 1;
                let p = self.tcp_packet(
                    &forward,
                    PacketDirection::Forward,
                    ctx,
                    TcpFlags::ACK,
                    ctx.client_seq.0,
                    (ctx.server_seq + Wrapping(1)).0,
                    &[],
                )?;
                ctx.server_seq += 1;
                (p, TcpState::Established)
            }
            TcpState::Established => {
                // client request
                let data = self.request_payload(ctx.dst_port);
                let p = self.tcp_packet(
                    &forward,
                    PacketDirection::Forward,
                    ctx,
                    TcpFlags::PSH | TcpFlags::ACK,
                    ctx.client_seq.0,
                    ctx.server_seq.0,
                    &data,
                )?;
                ctx.client_seq += data.len() as u32;
                (p, TcpState::DataSent)
            }
            TcpState::DataSent => {
                // server acknowledges the request
                let p = self.tcp_packet(
                    &backward,
                    PacketDirection::Backward,
                    ctx,
                    TcpFlags::ACK,
                    ctx.server_seq.0,
                    ctx.client_seq.0,
                    &[],
                )?;
                (p, TcpState::DataAcked)
            }
            TcpState::DataAcked => {
                // server response
                let data = self.response_payload(ctx.dst_port);
                let p = self.tcp_packet(
                    &backward,
                    PacketDirection::Backward,
                    ctx,
                    TcpFlags::PSH | TcpFlags::ACK,
                    ctx.server_seq.0,
                    ctx.client_seq.0,
                    &data,
                )?;
                ctx.server_seq += data.len() as u32;
                (p, TcpState::RespSent)
            }
            TcpState::RespSent => {
                // client acknowledges the response
                let p = self.tcp_packet(
                    &forward,
                    PacketDirection::Forward,
                    ctx,
                    TcpFlags::ACK,
                    ctx.client_seq.0,
                    ctx.server_seq.0,
                    &[],
                )?;
                (p, TcpState::RespAcked)
            }
            TcpState::RespAcked => {
                // client starts the teardown
                let p = self.tcp_packet(
                    &forward,
                    PacketDirection::Forward,
                    ctx,
                    TcpFlags::FIN | TcpFlags::ACK,
                    ctx.client_seq.0,
                    ctx.server_seq.0,
                    &[],
                )?;
                (p, TcpState::FinWait)
            }
            TcpState::FinWait => {
                let p = self.tcp_packet(
                    &backward,
                    PacketDirection::Backward,
                    ctx,
                    TcpFlags::FIN | TcpFlags::ACK,
                    ctx.server_seq.0,
                    (ctx.client_seq + Wrapping(1)).0,
                    &[],
                )?;
                (p, TcpState::LastAck)
            }
            TcpState::LastAck => {
                // client final ACK
                let p = self.tcp_packet(
                    &forward,
                    PacketDirection::Forward,
                    ctx,
                    TcpFlags::ACK,
                    (ctx.client_seq + Wrapping(1)).0,
                    (ctx.server_seq + Wrapping(1)).0,
                    &[],
                )?;
                (p, TcpState::Closed)
            }
        };
        Ok(step)
    }

    #[allow(clippy::too_many_arguments)]
    fn tcp_packet(
        &mut self,
        addr: &Addressing,
        direction: PacketDirection,
        ctx: &TcpContext,
        flags: u8,
        seq: u32,
        ack: u32,
        data: &[u8],
    ) -> Result<Packet, SynthesisError> {
        let (src_port, dst_port) = match direction {
            PacketDirection::Forward => (ctx.src_port, ctx.dst_port),
            PacketDirection::Backward => (ctx.dst_port, ctx.src_port),
        };
        Ok(self.codec.tcp(
            &mut self.rng,
            ctx.clock,
            direction,
            addr,
            &TcpFields {
                src_port,
                dst_port,
                flags,
                seq,
                ack,
                payload: data,
            },
        )?)
    }

    fn udp_flow(
        &mut self,
        addr: &Addressing,
        src_port: u16,
        dst_port: u16,
    ) -> Result<Vec<Packet>, SynthesisError> {
        let mut clock = unix_now();
        let backward = addr.reversed();

        let (request, response) = if dst_port == DNS_PORT {
            let domain = payload::random_domain(&mut self.rng);
            let query = payload::dns_query(&mut self.rng, &domain)?;
            let answer = payload::dns_response(&mut self.rng, &query);
            (query, answer)
        } else {
            let req_len = self.rng.gen_range(20..=100);
            let resp_len = self.rng.gen_range(20..=200);
            (
                payload::printable_bytes(&mut self.rng, req_len),
                payload::printable_bytes(&mut self.rng, resp_len),
            )
        };

        clock += self.delay();
        let request = self.codec.udp(
            &mut self.rng,
            clock,
            PacketDirection::Forward,
            addr,
            &UdpFields {
                src_port,
                dst_port,
                payload: &request,
            },
        )?;
        clock += self.delay();
        let response = self.codec.udp(
            &mut self.rng,
            clock,
            PacketDirection::Backward,
            &backward,
            &UdpFields {
                src_port: dst_port,
                dst_port: src_port,
                payload: &response,
            },
        )?;
        Ok(vec![request, response])
    }

    fn icmp_flow(&mut self, addr: &Addressing) -> Result<Vec<Packet>, SynthesisError> {
        let mut clock = unix_now();
        let identifier = self.rng.gen_range(1..=65535);
        let sequence = self.rng.gen_range(1..=100);
        let mut data = vec![0u8; ICMP_PAYLOAD_LEN];
        self.rng.fill_bytes(&mut data);

        clock += self.delay();
        let request = self.codec.icmp_echo(
            &mut self.rng,
            clock,
            PacketDirection::Forward,
            addr,
            &IcmpEchoFields {
                kind: EchoKind::Request,
                identifier,
                sequence,
                payload: &data,
            },
        )?;
        clock += self.delay();
        let reply = self.codec.icmp_echo(
            &mut self.rng,
            clock,
            PacketDirection::Backward,
            &addr.reversed(),
            &IcmpEchoFields {
                kind: EchoKind::Reply,
                identifier,
                sequence,
                payload: &data,
            },
        )?;
        Ok(vec![request, reply])
    }

    fn request_payload(&mut self, dst_port: u16) -> Vec<u8> {
        if dst_port == 80 || dst_port == 8080 {
            payload::http_request(&mut self.rng)
        } else {
            let len = self.rng.gen_range(50..=200);
            payload::printable_bytes(&mut self.rng, len)
        }
    }

    fn response_payload(&mut self, dst_port: u16) -> Vec<u8> {
        if dst_port == 80 || dst_port == 8080 {
            payload::http_response(&mut self.rng)
        } else {
            let len = self.rng.gen_range(100..=500);
            payload::printable_bytes(&mut self.rng, len)
        }
    }

    fn delay(&mut self) -> Duration {
        Duration::from_millis(
            self.rng
                .gen_range(self.opts.pacing_min_ms..=self.opts.pacing_max_ms.max(self.opts.pacing_min_ms)),
        )
    }

    fn random_addressing(&mut self) -> Addressing {
        Addressing {
            src_ip: random_ipv4(&mut self.rng),
            dst_ip: random_ipv4(&mut self.rng),
            src_mac: random_mac(&mut self.rng),
            dst_mac: random_mac(&mut self.rng),
        }
    }
}

pub fn random_ipv4(rng: &mut impl Rng) -> Ipv4Addr {
    Ipv4Addr::new(
        rng.gen_range(1..=223), // stay out of multicast/reserved space
        rng.gen_range(0..=254),
        rng.gen_range(0..=254),
        rng.gen_range(1..=254),
    )
}

pub fn random_mac(rng: &mut impl Rng) -> MacAddr {
    // locally administered unicast
    MacAddr::new(
        (rng.gen::<u8>() & 0xfe) | 0x02,
        rng.gen(),
        rng.gen(),
        rng.gen(),
        rng.gen(),
        rng.gen(),
    )
}

fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}
