use flowsmith::buffer::FlowBuffer;
use flowsmith::stream::{LogNotifier, Scenario, StreamController, StreamSpec};
use flowsmith::structs::Protocol;
use flowsmith::synth::SynthOptions;

use pcap_file::pcap::PcapReader;
use pnet_packet::ethernet::{EtherTypes, EthernetPacket};
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::Packet as _;
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn generated_batches_are_valid_pcap() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let buffer = Arc::new(FlowBuffer::new(dir.path(), 6, true));
    let controller = StreamController::new(Arc::clone(&buffer), Arc::new(LogNotifier));

    let events: Vec<_> = controller
        .stream(StreamSpec {
            scenario: Scenario::Normal {
                protocol: Some(Protocol::TCP),
            },
            count: Some(3),
            interval: Some(Duration::ZERO),
            seed: 0,
            synth: SynthOptions::default(),
        })
        .collect();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.summary.packet_count == 10));

    // every batch file must be a readable capture of Ethernet/IPv4 frames
    let mut total_packets = 0;
    let mut batches = 0;
    for entry in std::fs::read_dir(dir.path())? {
        let path = entry?.path();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("traffic_"));
        let mut reader = PcapReader::new(File::open(&path)?)?;
        while let Some(packet) = reader.next_packet() {
            let packet = packet?;
            let eth = EthernetPacket::new(&packet.data).expect("ethernet frame");
            assert_eq!(eth.get_ethertype(), EtherTypes::Ipv4);
            let ip = Ipv4Packet::new(eth.payload()).expect("ipv4 packet");
            assert_eq!(ip.get_version(), 4);
            assert_eq!(ip.get_total_length() as usize, packet.data.len() - 14);
            total_packets += 1;
        }
        batches += 1;
    }
    assert_eq!(total_packets, 30);
    assert!(batches >= 1);
    assert_eq!(buffer.status().buffer_size, 0);
    Ok(())
}

#[test]
fn seeded_generation_is_deterministic() {
    let run = || {
        let dir = tempdir().unwrap();
        let buffer = Arc::new(FlowBuffer::new(dir.path(), 1000, false));
        let controller = StreamController::new(buffer, Arc::new(LogNotifier));
        let events: Vec<_> = controller
            .stream(StreamSpec {
                scenario: Scenario::Normal {
                    protocol: Some(Protocol::UDP),
                },
                count: Some(5),
                interval: Some(Duration::ZERO),
                seed: 1234,
                synth: SynthOptions::default(),
            })
            .collect();
        events
            .into_iter()
            .map(|e| (e.summary.source_ip, e.summary.dest_port, e.summary.total_size))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
