//! Adversarial traffic: single-packet "flows" that deliberately break the
//! connection lifecycle. Both scenarios call the codec directly and never
//! synthesize a response.

use crate::codec::{Addressing, PacketCodec, TcpFields};
use crate::error::SynthesisError;
use crate::structs::*;
use crate::synth::{random_ipv4, random_mac};

use chrono::Utc;
use pnet::util::MacAddr;
use pnet_packet::tcp::TcpFlags;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_core::RngCore;
use rand_pcg::Pcg32;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

const DOS_PAYLOAD_LEN: usize = 1400;

struct ScanTarget {
    ip: Ipv4Addr,
    port: u16,
    mac: MacAddr,
    seen_sources: HashSet<Ipv4Addr>,
}

struct DosOrigin {
    attacker_ip: Ipv4Addr,
    attacker_mac: MacAddr,
    target_ip: Ipv4Addr,
    target_mac: MacAddr,
}

pub struct AttackScenarioGenerator {
    codec: PacketCodec,
    rng: Pcg32,
    common_ports: Vec<u16>,
    scan: Option<ScanTarget>,
    dos: Option<DosOrigin>,
}

impl AttackScenarioGenerator {
    pub fn new(seed: u64, common_ports: Vec<u16>) -> Self {
        AttackScenarioGenerator {
            codec: PacketCodec::default(),
            rng: Pcg32::seed_from_u64(seed),
            common_ports,
            scan: None,
            dos: None,
        }
    }

    /// One flood-scan iteration: a SYN-only packet from a fresh, distinct
    /// spoofed source towards the fixed target.
    pub fn flood_scan(&mut self) -> Result<(Flow, FeatureSummary), SynthesisError> {
        if self.scan.is_none() {
            self.scan = Some(ScanTarget {
                ip: random_ipv4(&mut self.rng),
                port: *self.common_ports.choose(&mut self.rng).unwrap_or(&80),
                mac: random_mac(&mut self.rng),
                seen_sources: HashSet::new(),
            });
        }

        let (src_ip, src_mac, src_port) = {
            let scan = self.scan.as_mut().expect("target just initialized");
            let mut src_ip = random_ipv4(&mut self.rng);
            while !scan.seen_sources.insert(src_ip) {
                src_ip = random_ipv4(&mut self.rng);
            }
            (src_ip, random_mac(&mut self.rng), self.rng.gen_range(1024..=65535))
        };
        let scan = self.scan.as_ref().expect("target just initialized");
        let addr = Addressing {
            src_ip,
            dst_ip: scan.ip,
            src_mac,
            dst_mac: scan.mac,
        };
        let seq = self.rng.next_u32();
        let packet = self.codec.tcp(
            &mut self.rng,
            unix_now(),
            PacketDirection::Forward,
            &addr,
            &TcpFields {
                src_port,
                dst_port: scan.port,
                flags: TcpFlags::SYN,
                seq,
                ack: 0,
                payload: &[],
            },
        )?;
        Ok(self.wrap(packet, SYN_FLOOD_LABEL))
    }

    /// One saturation-flood iteration: a PSH+ACK segment with a large
    /// payload and a fresh random sequence number, no handshake behind it.
    pub fn saturation_flood(&mut self) -> Result<(Flow, FeatureSummary), SynthesisError> {
        if self.dos.is_none() {
            self.dos = Some(DosOrigin {
                attacker_ip: random_ipv4(&mut self.rng),
                attacker_mac: random_mac(&mut self.rng),
                target_ip: random_ipv4(&mut self.rng),
                target_mac: random_mac(&mut self.rng),
            });
        }
        let dos = self.dos.as_ref().expect("origin just initialized");
        let addr = Addressing {
            src_ip: dos.attacker_ip,
            dst_ip: dos.target_ip,
            src_mac: dos.attacker_mac,
            dst_mac: dos.target_mac,
        };
        let src_port = self.rng.gen_range(1024..=65535);
        let seq = self.rng.next_u32();
        let mut data = vec![0u8; DOS_PAYLOAD_LEN];
        for byte in data.iter_mut() {
            *byte = self.rng.gen_range(32..=126);
        }
        let packet = self.codec.tcp(
            &mut self.rng,
            unix_now(),
            PacketDirection::Forward,
            &addr,
            &TcpFields {
                src_port,
                dst_port: 80,
                flags: TcpFlags::PSH | TcpFlags::ACK,
                seq,
                ack: 0,
                payload: &data,
            },
        )?;
        Ok(self.wrap(packet, HTTP_FLOOD_LABEL))
    }

    fn wrap(&self, packet: Packet, label: &str) -> (Flow, FeatureSummary) {
        let meta = packet.meta;
        let size = packet.len();
        let flow = Flow {
            protocol: Protocol::TCP,
            kind: FlowKind::Attack,
            packets: vec![packet],
        };
        let summary = FeatureSummary {
            timestamp: Utc::now(),
            source_ip: meta.src_ip,
            dest_ip: meta.dst_ip,
            protocol: Protocol::TCP,
            source_port: meta.src_port,
            dest_port: meta.dst_port,
            packet_count: 1,
            total_size: size,
            flow_kind: FlowKind::Attack,
            attack_type: Some(label.to_string()),
        };
        (flow, summary)
    }
}

fn unix_now() -> std::time::Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}
