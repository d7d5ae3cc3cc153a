use flowsmith::buffer::FlowBuffer;
use flowsmith::config;
use flowsmith::stream::{FlowEvent, LogNotifier, Scenario, StreamController, StreamSpec};
use flowsmith::structs::Protocol;
mod cmd;

use clap::Parser;
use crossbeam_channel::bounded;
use std::fs;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const CHANNEL_SIZE: usize = 500;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = cmd::Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let config_str =
                &fs::read_to_string(path).expect("Cannot access the configuration file.");
            config::import_config(config_str)
        }
        None => config::GeneratorConfig::default(),
    };
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.into();
    }
    if args.no_save {
        config.save_to_pcap = false;
    }
    log::debug!("Configuration: {:?}", config);

    let seed = args.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64
    });
    if args.seed.is_some() {
        log::info!("Generating with seed {seed}");
    }

    let (scenario, count, interval_ms) = match args.command {
        cmd::Command::Normal {
            count,
            interval_ms,
            protocol,
        } => (
            Scenario::Normal {
                protocol: protocol.map(Protocol::from),
            },
            count,
            interval_ms,
        ),
        cmd::Command::FloodScan { count, interval_ms } => {
            (Scenario::FloodScan, Some(count), interval_ms)
        }
        cmd::Command::Dos { count, interval_ms } => {
            (Scenario::SaturationFlood, Some(count), interval_ms)
        }
    };

    let buffer = Arc::new(FlowBuffer::new(
        config.output_dir.clone(),
        config.packets_per_file,
        config.save_to_pcap,
    ));
    let controller = StreamController::new(Arc::clone(&buffer), Arc::new(LogNotifier));

    // Handle ctrl+C: stop cleanly first, abort on the second one
    let running = controller.stop_handle();
    ctrlc::set_handler(move || {
        if running.load(Ordering::Relaxed) {
            log::warn!("Ending the generation, please wait a few seconds");
            running.store(false, Ordering::Relaxed);
        } else {
            log::warn!("Ending immediately");
            process::abort();
        }
    })
    .expect("Error setting Ctrl-C handler");

    let spec = StreamSpec {
        scenario,
        count,
        interval: Some(Duration::from_millis(interval_ms)),
        seed,
        synth: config.synth_options(),
    };

    // The generation loop runs on its own thread; completed flows arrive
    // here as a live event stream and are echoed as JSON lines.
    let (tx_events, rx_events) = bounded::<FlowEvent>(CHANNEL_SIZE);
    let stream = controller.stream(spec);
    let builder = thread::Builder::new().name("Generation".into());
    let generation = builder
        .spawn(move || {
            for event in stream {
                if tx_events.send(event).is_err() {
                    break;
                }
            }
        })
        .unwrap();

    for event in rx_events {
        match serde_json::to_string(&event.summary) {
            Ok(line) => println!("{line}"),
            Err(e) => log::warn!("cannot serialize feature summary: {e}"),
        }
    }
    generation.join().unwrap();

    let status = buffer.status();
    log::info!(
        "{} capture files written to {}",
        status.files_saved,
        status.output_dir.display()
    );
}
