//! The generation loop: a lazy, cancellable stream of flow events. One
//! iteration synthesizes one flow, buffers its packets, and reports any
//! batch that got persisted along the way. The stop signal is only checked
//! between flows; a flow already being emitted is never truncated.

use crate::attack::AttackScenarioGenerator;
use crate::buffer::FlowBuffer;
use crate::error::NotificationError;
use crate::structs::*;
use crate::synth::{FlowSynthesizer, SynthOptions};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// External collaborator informed of every persisted batch. Delivery is
/// best-effort: failures are logged by the stream, never propagated.
pub trait BatchNotifier: Send + Sync {
    fn notify(&self, batch: &BatchFile) -> Result<(), NotificationError>;
}

/// Default collaborator: announces batches on the log as structured JSON.
pub struct LogNotifier;

impl BatchNotifier for LogNotifier {
    fn notify(&self, batch: &BatchFile) -> Result<(), NotificationError> {
        let record = serde_json::to_string(batch)?;
        log::info!("batch ready: {record}");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Normal { protocol: Option<Protocol> },
    FloodScan,
    SaturationFlood,
}

impl Scenario {
    /// Attack scenarios default to a much higher intensity than normal
    /// traffic.
    pub fn default_interval(&self) -> Duration {
        match self {
            Scenario::Normal { .. } => Duration::from_secs(1),
            Scenario::FloodScan => Duration::from_millis(100),
            Scenario::SaturationFlood => Duration::from_millis(10),
        }
    }

    pub fn default_count(&self) -> Option<u64> {
        match self {
            Scenario::Normal { .. } => None,
            Scenario::FloodScan => Some(10),
            Scenario::SaturationFlood => Some(50),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub scenario: Scenario,
    /// Number of flows to generate; `None` runs until cancelled
    pub count: Option<u64>,
    /// Pause between flows; `None` uses the scenario default
    pub interval: Option<Duration>,
    pub seed: u64,
    pub synth: SynthOptions,
}

#[derive(Debug, Clone)]
pub struct FlowEvent {
    pub summary: FeatureSummary,
    pub batch: Option<BatchFile>,
}

pub struct StreamController {
    buffer: Arc<FlowBuffer>,
    notifier: Arc<dyn BatchNotifier>,
    running: Arc<AtomicBool>,
}

impl StreamController {
    pub fn new(buffer: Arc<FlowBuffer>, notifier: Arc<dyn BatchNotifier>) -> Self {
        StreamController {
            buffer,
            notifier,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared flag polled between flows; clearing it cancels the stream.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn buffer(&self) -> &Arc<FlowBuffer> {
        &self.buffer
    }

    /// Cancels the stream and flushes whatever is still buffered so no
    /// packets are silently lost.
    pub fn stop(&self) -> Option<BatchFile> {
        self.running.store(false, Ordering::Relaxed);
        flush_and_notify(&self.buffer, self.notifier.as_ref())
    }

    /// Builds a restartable lazy stream of flow events.
    pub fn stream(&self, spec: StreamSpec) -> TrafficStream {
        let count = spec.count.or_else(|| spec.scenario.default_count());
        let interval = spec
            .interval
            .unwrap_or_else(|| spec.scenario.default_interval());
        let common_ports = spec.synth.common_ports.clone();
        TrafficStream {
            buffer: Arc::clone(&self.buffer),
            notifier: Arc::clone(&self.notifier),
            running: Arc::clone(&self.running),
            synth: FlowSynthesizer::new(spec.seed, spec.synth),
            attack: AttackScenarioGenerator::new(spec.seed.wrapping_add(1), common_ports),
            scenario: spec.scenario,
            remaining: count,
            interval,
            started: false,
            finished: false,
            flows: 0,
            packets: 0,
        }
    }
}

pub struct TrafficStream {
    buffer: Arc<FlowBuffer>,
    notifier: Arc<dyn BatchNotifier>,
    running: Arc<AtomicBool>,
    synth: FlowSynthesizer,
    attack: AttackScenarioGenerator,
    scenario: Scenario,
    remaining: Option<u64>,
    interval: Duration,
    started: bool,
    finished: bool,
    flows: u64,
    packets: u64,
}

impl TrafficStream {
    fn finalize(&mut self) {
        self.finished = true;
        flush_and_notify(&self.buffer, self.notifier.as_ref());
        log::info!(
            "stream done: {} flows, {} packets generated",
            self.flows,
            self.packets
        );
    }

    /// Sleeps the configured interval in small slices so cancellation is
    /// observed promptly, without ever interrupting a flow mid-emission.
    fn pace(&self) {
        let mut left = self.interval;
        while !left.is_zero() && self.running.load(Ordering::Relaxed) {
            let slice = left.min(SLEEP_SLICE);
            thread::sleep(slice);
            left -= slice;
        }
    }
}

impl Iterator for TrafficStream {
    type Item = FlowEvent;

    fn next(&mut self) -> Option<FlowEvent> {
        if self.finished {
            return None;
        }
        loop {
            if !self.running.load(Ordering::Relaxed) || self.remaining == Some(0) {
                self.finalize();
                return None;
            }
            if self.started {
                self.pace();
                if !self.running.load(Ordering::Relaxed) {
                    self.finalize();
                    return None;
                }
            }
            self.started = true;
            if let Some(n) = self.remaining.as_mut() {
                *n -= 1;
            }

            let result = match self.scenario {
                Scenario::Normal { protocol } => self.synth.synthesize(protocol),
                Scenario::FloodScan => self.attack.flood_scan(),
                Scenario::SaturationFlood => self.attack.saturation_flood(),
            };
            let (flow, summary) = match result {
                Ok(output) => output,
                Err(e) => {
                    // abort this flow only, the loop moves on
                    log::warn!("flow synthesis failed: {e}");
                    continue;
                }
            };
            self.flows += 1;
            self.packets += flow.packets.len() as u64;

            let batch = match self.buffer.append(flow.packets) {
                Ok(batch) => batch,
                Err(e) => {
                    // buffered packets are preserved for a later retry
                    log::error!("batch persistence failed: {e}");
                    None
                }
            };
            if let Some(ref batch) = batch {
                notify(self.notifier.as_ref(), batch);
            }
            return Some(FlowEvent { summary, batch });
        }
    }
}

fn notify(notifier: &dyn BatchNotifier, batch: &BatchFile) {
    if let Err(e) = notifier.notify(batch) {
        log::warn!("batch notification failed: {e}");
    }
}

fn flush_and_notify(buffer: &FlowBuffer, notifier: &dyn BatchNotifier) -> Option<BatchFile> {
    match buffer.force_flush() {
        Ok(Some(batch)) => {
            notify(notifier, &batch);
            Some(batch)
        }
        Ok(None) => None,
        Err(e) => {
            log::error!("final flush failed: {e}");
            None
        }
    }
}
