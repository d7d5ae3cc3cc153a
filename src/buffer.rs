//! Concurrency-safe packet accumulator with size-triggered batch
//! persistence. One mutex guards the pending list and the batch counter;
//! the buffer is cleared only after a batch has been fully written, so a
//! failed flush can be retried without losing packets.

use crate::error::PersistenceError;
use crate::structs::*;

use chrono::Utc;
use pcap_file::pcap::{PcapPacket, PcapWriter};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

pub const DEFAULT_BATCH_SIZE: usize = 50;

struct BufferState {
    pending: Vec<Packet>,
    batch_index: u32,
    save_enabled: bool,
}

pub struct FlowBuffer {
    output_dir: PathBuf,
    packets_per_file: usize,
    state: Mutex<BufferState>,
}

impl FlowBuffer {
    pub fn new(output_dir: impl Into<PathBuf>, packets_per_file: usize, save_enabled: bool) -> Self {
        FlowBuffer {
            output_dir: output_dir.into(),
            packets_per_file: packets_per_file.max(1),
            state: Mutex::new(BufferState {
                pending: Vec::new(),
                batch_index: 0,
                save_enabled,
            }),
        }
    }

    /// Appends packets and flushes automatically once the buffer reaches the
    /// configured threshold. Returns the persisted batch, if any.
    pub fn append(&self, packets: Vec<Packet>) -> Result<Option<BatchFile>, PersistenceError> {
        let mut state = self.state.lock().expect("buffer mutex poisoned");
        state.pending.extend(packets);
        if state.save_enabled && state.pending.len() >= self.packets_per_file {
            self.flush_locked(&mut state)
        } else {
            Ok(None)
        }
    }

    /// Flushes regardless of the threshold. A no-op on an empty buffer or
    /// when persistence is disabled.
    pub fn force_flush(&self) -> Result<Option<BatchFile>, PersistenceError> {
        let mut state = self.state.lock().expect("buffer mutex poisoned");
        if !state.save_enabled {
            return Ok(None);
        }
        self.flush_locked(&mut state)
    }

    pub fn set_save_enabled(&self, enabled: bool) {
        self.state.lock().expect("buffer mutex poisoned").save_enabled = enabled;
    }

    pub fn status(&self) -> BufferStatus {
        let state = self.state.lock().expect("buffer mutex poisoned");
        BufferStatus {
            buffer_size: state.pending.len(),
            packets_per_file: self.packets_per_file,
            files_saved: state.batch_index,
            save_enabled: state.save_enabled,
            output_dir: self.output_dir.clone(),
        }
    }

    fn flush_locked(
        &self,
        state: &mut BufferState,
    ) -> Result<Option<BatchFile>, PersistenceError> {
        if state.pending.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(&self.output_dir)?;
        let filename = format!(
            "traffic_{}_{}.pcap",
            Utc::now().format("%Y%m%d_%H%M%S"),
            state.batch_index
        );
        let path = self.output_dir.join(&filename);

        let file_out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let mut pcap_writer = PcapWriter::new(BufWriter::new(file_out))?;
        // flows are buffered FIFO but their pacing clocks interleave, so the
        // capture is ordered by timestamp before writing
        let mut ordered: Vec<&Packet> = state.pending.iter().collect();
        ordered.sort_unstable();
        for packet in ordered {
            pcap_writer.write_packet(&PcapPacket::new(
                packet.timestamp,
                packet.data.len() as u32,
                &packet.data,
            ))?;
        }
        pcap_writer.into_writer().flush()?;

        // The write went through: only now is the in-memory state advanced
        let packet_count = state.pending.len();
        state.pending.clear();
        let index = state.batch_index;
        state.batch_index += 1;
        log::debug!("persisted batch {index} ({packet_count} packets) to {}", path.display());

        Ok(Some(BatchFile {
            path,
            filename,
            packet_count,
            index,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{FlowSynthesizer, SynthOptions};
    use tempfile::tempdir;

    fn some_packets(n: usize) -> Vec<Packet> {
        let mut synth = FlowSynthesizer::new(0, SynthOptions::default());
        let mut packets = Vec::new();
        while packets.len() < n {
            let (flow, _) = synth.synthesize(Some(Protocol::ICMP)).unwrap();
            packets.extend(flow.packets);
        }
        packets.truncate(n);
        packets
    }

    #[test]
    fn test_threshold_triggers_exactly_one_flush() {
        let dir = tempdir().unwrap();
        let buffer = FlowBuffer::new(dir.path(), 10, true);
        let batch = buffer.append(some_packets(10)).unwrap();
        let batch = batch.expect("threshold reached, flush expected");
        assert_eq!(batch.packet_count, 10);
        assert_eq!(batch.index, 0);
        assert!(batch.path.exists());
        assert_eq!(buffer.status().buffer_size, 0);
        assert_eq!(buffer.status().files_saved, 1);
    }

    #[test]
    fn test_below_threshold_then_forced_flush() {
        let dir = tempdir().unwrap();
        let buffer = FlowBuffer::new(dir.path(), 10, true);
        assert!(buffer.append(some_packets(9)).unwrap().is_none());
        let batch = buffer.force_flush().unwrap().expect("forced flush");
        assert_eq!(batch.packet_count, 9);
    }

    #[test]
    fn test_force_flush_is_idempotent() {
        let dir = tempdir().unwrap();
        let buffer = FlowBuffer::new(dir.path(), 10, true);
        buffer.append(some_packets(3)).unwrap();
        assert!(buffer.force_flush().unwrap().is_some());
        assert!(buffer.force_flush().unwrap().is_none());
    }

    #[test]
    fn test_batch_index_increases() {
        let dir = tempdir().unwrap();
        let buffer = FlowBuffer::new(dir.path(), 5, true);
        let first = buffer.append(some_packets(5)).unwrap().unwrap();
        let second = buffer.append(some_packets(5)).unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_ne!(first.filename, second.filename);
    }

    #[test]
    fn test_disabled_persistence_accumulates_without_writing() {
        let dir = tempdir().unwrap();
        let buffer = FlowBuffer::new(dir.path(), 5, false);
        assert!(buffer.append(some_packets(12)).unwrap().is_none());
        assert!(buffer.force_flush().unwrap().is_none());
        assert_eq!(buffer.status().buffer_size, 12);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        // re-enabling makes the accumulated packets flushable again
        buffer.set_save_enabled(true);
        let batch = buffer.force_flush().unwrap().unwrap();
        assert_eq!(batch.packet_count, 12);
    }

    #[test]
    fn test_failed_flush_preserves_buffer() {
        let dir = tempdir().unwrap();
        let blocking = dir.path().join("out");
        fs::write(&blocking, b"not a directory").unwrap();
        let buffer = FlowBuffer::new(&blocking, 5, true);
        assert!(buffer.append(some_packets(5)).is_err());
        assert_eq!(buffer.status().buffer_size, 5);
        assert_eq!(buffer.status().files_saved, 0);
    }
}
