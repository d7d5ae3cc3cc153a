use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    #[arg(short, long, global=true, help="Seed for random number generation")]
    pub seed: Option<u64>,
    #[arg(short, long, global=true, help="Path to a TOML configuration file")]
    pub config: Option<String>,
    #[arg(short, long, global=true, help="Output directory for the capture files (overrides the configuration)")]
    pub output_dir: Option<String>,
    #[arg(long, global=true, default_value_t=false, help="Accumulate packets without writing capture files")]
    pub no_save: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Generate normal bidirectional flows (TCP/UDP/ICMP)
    Normal {
        #[arg(short='n', long, help="Number of flows to generate. Unbounded when omitted.")]
        count: Option<u64>,
        #[arg(short, long, default_value_t=1000, help="Pause between flows, in milliseconds")]
        interval_ms: u64,
        #[arg(short, long, help="Restrict generation to one protocol (TCP, UDP or ICMP)")]
        protocol: Option<String>,
    },
    /// Simulate a SYN flood / port scan: many spoofed sources, one target
    FloodScan {
        #[arg(short='n', long, default_value_t=10, help="Number of attack packets")]
        count: u64,
        #[arg(short, long, default_value_t=100, help="Pause between packets, in milliseconds")]
        interval_ms: u64,
    },
    /// Simulate an HTTP flood: one attacker saturating one target
    Dos {
        #[arg(short='n', long, default_value_t=50, help="Number of attack packets")]
        count: u64,
        #[arg(short, long, default_value_t=10, help="Pause between packets, in milliseconds")]
        interval_ms: u64,
    },
}
