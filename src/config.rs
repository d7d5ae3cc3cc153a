use crate::buffer::DEFAULT_BATCH_SIZE;
use crate::synth::SynthOptions;
use serde::Deserialize;
use std::path::PathBuf;

/// Runtime configuration, loadable from a TOML file. Every field has a
/// default so a partial file is enough.
#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Directory receiving the batch capture files
    pub output_dir: PathBuf,
    /// Buffer threshold that triggers an automatic flush
    pub packets_per_file: usize,
    pub save_to_pcap: bool,
    /// Destination port pool for normal flows
    pub common_ports: Vec<u16>,
    /// Inter-packet delay bounds, in milliseconds
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    /// Whether TCP flows carry a request/response exchange
    pub tcp_with_data: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            output_dir: PathBuf::from("pcap_files"),
            packets_per_file: DEFAULT_BATCH_SIZE,
            save_to_pcap: true,
            common_ports: vec![80, 443, 22, 21, 25, 53, 8080, 3306, 5432],
            pacing_min_ms: 1,
            pacing_max_ms: 50,
            tcp_with_data: true,
        }
    }
}

impl GeneratorConfig {
    pub fn synth_options(&self) -> SynthOptions {
        SynthOptions {
            common_ports: self.common_ports.clone(),
            pacing_min_ms: self.pacing_min_ms,
            pacing_max_ms: self.pacing_max_ms,
            with_data: self.tcp_with_data,
        }
    }
}

pub fn import_config(config: &str) -> GeneratorConfig {
    toml::from_str(config).expect("Ill-formed configuration file")
}
